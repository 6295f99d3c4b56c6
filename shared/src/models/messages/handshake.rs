use serde::{Deserialize, Serialize};

use super::message::Message;

/// First message of a session, master to worker. The scene blob travels as
/// the binary payload of the same frame and is sent exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Handshake {
    pub protocol_version: u32,
}

impl Message for Handshake {
    fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        let wrapped = serde_json::json!({ "Handshake": self });
        serde_json::to_value(wrapped)
    }

    fn from_json(message: &str) -> Result<Self, serde_json::Error> {
        let v: serde_json::Value = serde_json::from_str(message)?;
        serde_json::from_value(v["Handshake"].clone())
    }
}

/// Worker's reply once the scene is deserialized and its acceleration
/// structure is built; receiving it moves the connection to `Ready`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeAck {
    pub protocol_version: u32,
    pub worker_name: String,
}

impl Message for HandshakeAck {
    fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        let wrapped = serde_json::json!({ "HandshakeAck": self });
        serde_json::to_value(wrapped)
    }

    fn from_json(message: &str) -> Result<Self, serde_json::Error> {
        let v: serde_json::Value = serde_json::from_str(message)?;
        serde_json::from_value(v["HandshakeAck"].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_round_trips() {
        let handshake = Handshake {
            protocol_version: 1,
        };
        let json = serde_json::to_string(&handshake.to_json().unwrap()).unwrap();
        let decoded = Handshake::from_json(&json).unwrap();
        assert_eq!(decoded.protocol_version, 1);
    }

    #[test]
    fn ack_round_trips() {
        let ack = HandshakeAck {
            protocol_version: 1,
            worker_name: "worker-a".to_string(),
        };
        let json = serde_json::to_string(&ack.to_json().unwrap()).unwrap();
        let decoded = HandshakeAck::from_json(&json).unwrap();
        assert_eq!(decoded.worker_name, "worker-a");
    }
}
