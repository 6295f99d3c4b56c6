use std::fmt;

#[derive(Debug)]
pub enum NetworkingError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    HandshakeTimeout,
    ProtocolMismatch { expected: u32, received: u32 },
    InvalidPayload(String),
}

impl fmt::Display for NetworkingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkingError::Io(e) => write!(f, "I/O error: {}", e),
            NetworkingError::Serialization(e) => write!(f, "serialization error: {}", e),
            NetworkingError::HandshakeTimeout => write!(f, "handshake timed out"),
            NetworkingError::ProtocolMismatch { expected, received } => write!(
                f,
                "protocol version mismatch: expected {}, received {}",
                expected, received
            ),
            NetworkingError::InvalidPayload(reason) => {
                write!(f, "invalid message payload: {}", reason)
            }
        }
    }
}

impl std::error::Error for NetworkingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NetworkingError::Io(e) => Some(e),
            NetworkingError::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for NetworkingError {
    fn from(e: std::io::Error) -> Self {
        NetworkingError::Io(e)
    }
}

impl From<serde_json::Error> for NetworkingError {
    fn from(e: serde_json::Error) -> Self {
        NetworkingError::Serialization(e)
    }
}
