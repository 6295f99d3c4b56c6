//! Worker session over an in-memory channel: handshake, tile serving,
//! clean termination on channel close.

use scene::Scene;
use shared::models::messages::handshake::{Handshake, HandshakeAck};
use shared::models::messages::message::Message;
use shared::models::messages::tile_request::TileRequest;
use shared::models::messages::tile_response::{TileResponse, TileStatus};
use shared::models::pixel::PixelBuffer;
use shared::models::tile::{Region, Tile};
use shared::networking::{read_message_raw, send_message, PROTOCOL_VERSION};
use worker::handle_session;

async fn send_handshake(
    stream: &mut tokio::io::DuplexStream,
    version: u32,
    blob: &[u8],
) {
    let handshake = Handshake {
        protocol_version: version,
    };
    let envelope = serde_json::to_string(&handshake.to_json().unwrap()).unwrap();
    send_message(stream, envelope.as_bytes(), Some(blob))
        .await
        .unwrap();
}

#[tokio::test]
async fn session_serves_tiles_until_channel_close() {
    let (mut master_side, mut worker_side) = tokio::io::duplex(1 << 20);
    let session =
        tokio::spawn(async move { handle_session(&mut worker_side, "worker-test").await });

    let blob = Scene::demo(64, 64).to_blob().unwrap();
    send_handshake(&mut master_side, PROTOCOL_VERSION, &blob).await;

    let raw = read_message_raw(&mut master_side).await.unwrap();
    let ack = HandshakeAck::from_json(&raw.json_message).unwrap();
    assert_eq!(ack.protocol_version, PROTOCOL_VERSION);
    assert_eq!(ack.worker_name, "worker-test");

    let tile = Tile {
        id: 3,
        region: Region {
            x: 16,
            y: 0,
            width: 16,
            height: 16,
        },
    };
    let request = TileRequest { tile };
    let envelope = serde_json::to_string(&request.to_json().unwrap()).unwrap();
    send_message(&mut master_side, envelope.as_bytes(), None)
        .await
        .unwrap();

    let raw = read_message_raw(&mut master_side).await.unwrap();
    let response = TileResponse::from_json(&raw.json_message).unwrap();
    assert_eq!(response.id, 3);
    assert_eq!(response.status, TileStatus::Success);
    let buffer = PixelBuffer::from_raw(response.width, response.height, raw.data)
        .expect("payload does not match advertised dimensions");
    assert!(buffer.matches(&tile.region));

    // Master goes away; the session ends cleanly.
    drop(master_side);
    let result = session.await.unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn session_rejects_protocol_mismatch() {
    let (mut master_side, mut worker_side) = tokio::io::duplex(1 << 16);
    let session =
        tokio::spawn(async move { handle_session(&mut worker_side, "worker-test").await });

    send_handshake(&mut master_side, PROTOCOL_VERSION + 1, &[]).await;

    let result = session.await.unwrap();
    assert!(result.is_err());
}

#[tokio::test]
async fn session_handles_degenerate_regions() {
    let (mut master_side, mut worker_side) = tokio::io::duplex(1 << 20);
    let session =
        tokio::spawn(async move { handle_session(&mut worker_side, "worker-test").await });

    let blob = Scene::demo(64, 64).to_blob().unwrap();
    send_handshake(&mut master_side, PROTOCOL_VERSION, &blob).await;
    let raw = read_message_raw(&mut master_side).await.unwrap();
    HandshakeAck::from_json(&raw.json_message).unwrap();

    // Zero-area region: well-formed on the wire, empty result.
    let tile = Tile {
        id: 0,
        region: Region {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
        },
    };
    let request = TileRequest { tile };
    let envelope = serde_json::to_string(&request.to_json().unwrap()).unwrap();
    send_message(&mut master_side, envelope.as_bytes(), None)
        .await
        .unwrap();

    let raw = read_message_raw(&mut master_side).await.unwrap();
    let response = TileResponse::from_json(&raw.json_message).unwrap();
    assert_eq!(response.id, 0);
    // A degenerate region renders successfully to an empty buffer.
    assert_eq!(response.status, TileStatus::Success);
    assert!(raw.data.is_empty());

    drop(master_side);
    assert!(session.await.unwrap().is_ok());
}
