use serde::{Deserialize, Serialize};

use super::message::Message;

/// Outcome of a tile assignment. Workers only ever send `Success` or
/// `Failed`; `ConnectionLost` is what the master records when the channel
/// dies instead of producing a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileStatus {
    Success,
    Failed,
    ConnectionLost,
}

/// Worker to master. The rendered pixels travel as the binary payload of
/// the same frame, present iff `status` is `Success`; `width`/`height`
/// describe that payload so the master can validate it against the tile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileResponse {
    pub id: u32,
    pub status: TileStatus,
    pub width: u32,
    pub height: u32,
}

impl TileResponse {
    pub fn success(id: u32, width: u32, height: u32) -> Self {
        Self {
            id,
            status: TileStatus::Success,
            width,
            height,
        }
    }

    pub fn failed(id: u32) -> Self {
        Self {
            id,
            status: TileStatus::Failed,
            width: 0,
            height: 0,
        }
    }
}

impl Message for TileResponse {
    fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        let wrapped = serde_json::json!({ "TileResponse": self });
        serde_json::to_value(wrapped)
    }

    fn from_json(message: &str) -> Result<Self, serde_json::Error> {
        let v: serde_json::Value = serde_json::from_str(message)?;
        serde_json::from_value(v["TileResponse"].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_round_trips_exactly() {
        let response = TileResponse::success(42, 64, 48);
        let json = serde_json::to_string(&response.to_json().unwrap()).unwrap();
        let decoded = TileResponse::from_json(&json).unwrap();
        assert_eq!(decoded.id, 42);
        assert_eq!(decoded.status, TileStatus::Success);
        assert_eq!(decoded.width, 64);
        assert_eq!(decoded.height, 48);
    }

    #[test]
    fn failed_response_carries_no_dimensions() {
        let response = TileResponse::failed(3);
        let json = serde_json::to_string(&response.to_json().unwrap()).unwrap();
        let decoded = TileResponse::from_json(&json).unwrap();
        assert_eq!(decoded.status, TileStatus::Failed);
        assert_eq!(decoded.width, 0);
        assert_eq!(decoded.height, 0);
    }
}
