/// JSON envelope shared by every wire message: the payload is wrapped under
/// a key carrying the message type, e.g. `{"TileRequest": {...}}`.
pub trait Message: Sized {
    fn to_json(&self) -> Result<serde_json::Value, serde_json::Error>;
    fn from_json(message: &str) -> Result<Self, serde_json::Error>;
}
