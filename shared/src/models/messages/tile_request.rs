use serde::{Deserialize, Serialize};

use super::message::Message;
use crate::models::tile::Tile;

/// Master to worker: render this tile with the scene sent at handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileRequest {
    pub tile: Tile,
}

impl Message for TileRequest {
    fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        let wrapped = serde_json::json!({ "TileRequest": self });
        serde_json::to_value(wrapped)
    }

    fn from_json(message: &str) -> Result<Self, serde_json::Error> {
        let v: serde_json::Value = serde_json::from_str(message)?;
        serde_json::from_value(v["TileRequest"].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tile::Region;

    #[test]
    fn request_round_trips_exactly() {
        let request = TileRequest {
            tile: Tile {
                id: 7,
                region: Region {
                    x: 64,
                    y: 128,
                    width: 64,
                    height: 48,
                },
            },
        };
        let json = serde_json::to_string(&request.to_json().unwrap()).unwrap();
        let decoded = TileRequest::from_json(&json).unwrap();
        assert_eq!(decoded.tile, request.tile);
    }
}
