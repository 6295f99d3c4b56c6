//! The worker server: accepts one master connection per rendering session,
//! receives the scene once, then serves tile requests until the channel
//! closes or a shutdown signal arrives.

use std::sync::Arc;

use log::{debug, error, info};
use scene::render::render_tile;
use scene::Scene;
use shared::models::messages::handshake::{Handshake, HandshakeAck};
use shared::models::messages::message::Message;
use shared::models::messages::tile_request::TileRequest;
use shared::models::messages::tile_response::TileResponse;
use shared::networking::error::NetworkingError;
use shared::networking::result::NetworkingResult;
use shared::networking::worker::WorkerConfig;
use shared::networking::{read_message_raw, send_message, PROTOCOL_VERSION};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Notify;

pub async fn run_worker(config: WorkerConfig) {
    shared::env::init();
    shared::logger::init();

    match run(&config).await {
        Ok(()) => info!("Worker shutdown gracefully"),
        Err(e) => error!("Worker error: {}", e),
    }
}

async fn run(config: &WorkerConfig) -> NetworkingResult<()> {
    let addr = format!("{}:{}", config.address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Worker {} listening on {}", config.name, addr);

    let shutdown = Arc::new(Notify::new());
    {
        let shutdown = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || shutdown.notify_waiters()) {
            error!("Failed to install shutdown handler: {}", e);
        }
    }

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                info!("Shutdown requested");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (mut socket, peer) = match accepted {
                    Ok(connection) => connection,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                };
                info!("Master connected from {}", peer);
                // One master session at a time; the next master waits in
                // the listener backlog until this one ends.
                tokio::select! {
                    _ = shutdown.notified() => {
                        info!("Shutdown requested, closing session");
                        _ = socket.shutdown().await;
                        return Ok(());
                    }
                    result = handle_session(&mut socket, &config.name) => {
                        match result {
                            Ok(()) => info!("Master session ended"),
                            Err(e) => error!("Session error: {}", e),
                        }
                    }
                }
                // The channel is closed on exit however the session ended.
                _ = socket.shutdown().await;
            }
        }
    }
}

/// One full rendering session over an established channel: handshake,
/// scene receipt, then the tile-serving loop. The scene's acceleration
/// structure is torn down when the session ends, clean or not.
pub async fn handle_session<S>(stream: &mut S, worker_name: &str) -> NetworkingResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let raw = read_message_raw(stream).await?;
    let handshake = Handshake::from_json(&raw.json_message)?;
    if handshake.protocol_version != PROTOCOL_VERSION {
        return Err(NetworkingError::ProtocolMismatch {
            expected: PROTOCOL_VERSION,
            received: handshake.protocol_version,
        });
    }

    let scene = Scene::from_blob(&raw.data)
        .map_err(|e| NetworkingError::InvalidPayload(e.to_string()))?;
    info!(
        "Scene received ({} bytes), acceleration structure built",
        raw.data.len()
    );
    let scene = Arc::new(scene);

    let ack = HandshakeAck {
        protocol_version: PROTOCOL_VERSION,
        worker_name: worker_name.to_string(),
    };
    let envelope = serde_json::to_string(&ack.to_json()?)?;
    send_message(stream, envelope.as_bytes(), None).await?;

    let result = serve_tiles(stream, &scene).await;
    scene.teardown();
    result
}

async fn serve_tiles<S>(stream: &mut S, scene: &Arc<Scene>) -> NetworkingResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let raw = match read_message_raw(stream).await {
            Ok(raw) => raw,
            Err(NetworkingError::Io(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                info!("Master closed the channel");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let request = TileRequest::from_json(&raw.json_message)?;
        let tile = request.tile;
        debug!("Tile {} assigned: {:?}", tile.id, tile.region);

        let render_scene = scene.clone();
        let region = tile.region;
        let rendered =
            tokio::task::spawn_blocking(move || render_tile(&render_scene, &region)).await;

        let (response, payload) = match rendered {
            Ok(Ok(buffer)) => (
                TileResponse::success(tile.id, buffer.width, buffer.height),
                Some(buffer.data),
            ),
            Ok(Err(e)) => {
                error!("Render failed for tile {}: {}", tile.id, e);
                (TileResponse::failed(tile.id), None)
            }
            Err(e) => {
                error!("Render task for tile {} panicked: {}", tile.id, e);
                (TileResponse::failed(tile.id), None)
            }
        };

        let envelope = serde_json::to_string(&response.to_json()?)?;
        send_message(stream, envelope.as_bytes(), payload.as_deref()).await?;
        info!("Tile {} sent", tile.id);
    }
}
