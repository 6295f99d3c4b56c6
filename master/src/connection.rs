//! Master-side connection to one remote worker.
//!
//! Lifecycle: `Connecting → Handshake → Ready ⇄ Busy → (Ready |
//! Disconnected)`. The scene blob is transmitted exactly once, during the
//! handshake; a connection that never acknowledges within the timeout is
//! dropped without ever being assigned a tile.

use std::time::Duration;

use log::{debug, error, info, warn};
use shared::models::messages::handshake::{Handshake, HandshakeAck};
use shared::models::messages::message::Message;
use shared::models::messages::tile_request::TileRequest;
use shared::models::messages::tile_response::{TileResponse, TileStatus};
use shared::models::pixel::PixelBuffer;
use shared::models::tile::Tile;
use shared::networking::error::NetworkingError;
use shared::networking::result::NetworkingResult;
use shared::networking::{read_message_raw, send_message, PROTOCOL_VERSION};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::executor::{TileExecutor, TileOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Handshake,
    Ready,
    Busy,
    Disconnected,
}

pub struct RemoteExecutor {
    id: String,
    addr: String,
    stream: TcpStream,
    state: ConnectionState,
    tile_timeout: Duration,
}

impl RemoteExecutor {
    /// Dials a worker and completes the handshake. On success the
    /// connection is `Ready`; any failure here means no tile was ever
    /// assigned to it.
    pub async fn connect(
        addr: &str,
        scene_blob: &[u8],
        handshake_timeout: Duration,
        tile_timeout: Duration,
    ) -> NetworkingResult<Self> {
        debug!("Connecting to worker at {}", addr);
        let mut stream = TcpStream::connect(addr).await?;

        let handshake = Handshake {
            protocol_version: PROTOCOL_VERSION,
        };
        let envelope = serde_json::to_string(&handshake.to_json()?)?;
        send_message(&mut stream, envelope.as_bytes(), Some(scene_blob)).await?;

        let raw = match timeout(handshake_timeout, read_message_raw(&mut stream)).await {
            Ok(read) => read?,
            Err(_) => return Err(NetworkingError::HandshakeTimeout),
        };
        let ack = HandshakeAck::from_json(&raw.json_message)?;
        if ack.protocol_version != PROTOCOL_VERSION {
            return Err(NetworkingError::ProtocolMismatch {
                expected: PROTOCOL_VERSION,
                received: ack.protocol_version,
            });
        }

        info!("Worker {} at {} is ready", ack.worker_name, addr);
        Ok(Self {
            id: ack.worker_name,
            addr: addr.to_string(),
            stream,
            state: ConnectionState::Ready,
            tile_timeout,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn lost(&mut self) -> TileOutcome {
        self.state = ConnectionState::Disconnected;
        TileOutcome::ConnectionLost
    }
}

impl TileExecutor for RemoteExecutor {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run_tile(&mut self, tile: &Tile) -> TileOutcome {
        self.state = ConnectionState::Busy;

        let request = TileRequest { tile: *tile };
        let envelope = match request.to_json().and_then(|v| serde_json::to_string(&v)) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!("Failed to serialize request for tile {}: {}", tile.id, e);
                self.state = ConnectionState::Ready;
                return TileOutcome::Failed;
            }
        };
        if let Err(e) = send_message(&mut self.stream, envelope.as_bytes(), None).await {
            error!("{}: failed to send tile {}: {}", self.id, tile.id, e);
            return self.lost();
        }

        let raw = match timeout(self.tile_timeout, read_message_raw(&mut self.stream)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                error!("{}: channel error while waiting for tile {}: {}", self.id, tile.id, e);
                return self.lost();
            }
            Err(_) => {
                // No response within the bound: treated exactly like a
                // lost connection.
                warn!(
                    "{}: no response for tile {} within {:?}",
                    self.id, tile.id, self.tile_timeout
                );
                return self.lost();
            }
        };

        let response = match TileResponse::from_json(&raw.json_message) {
            Ok(response) => response,
            Err(e) => {
                warn!("{}: malformed response for tile {}: {}", self.id, tile.id, e);
                self.state = ConnectionState::Ready;
                return TileOutcome::Failed;
            }
        };
        if response.id != tile.id {
            warn!(
                "{}: response for tile {} while tile {} was in flight",
                self.id, response.id, tile.id
            );
            self.state = ConnectionState::Ready;
            return TileOutcome::Failed;
        }

        self.state = ConnectionState::Ready;
        match response.status {
            TileStatus::Success => {
                match PixelBuffer::from_raw(response.width, response.height, raw.data) {
                    Some(buffer) if buffer.matches(&tile.region) => TileOutcome::Success(buffer),
                    _ => {
                        warn!(
                            "{}: size mismatch for tile {}: got {}x{}",
                            self.id, tile.id, response.width, response.height
                        );
                        TileOutcome::Failed
                    }
                }
            }
            TileStatus::Failed | TileStatus::ConnectionLost => {
                debug!("{}: worker reported failure for tile {}", self.id, tile.id);
                TileOutcome::Failed
            }
        }
    }
}
