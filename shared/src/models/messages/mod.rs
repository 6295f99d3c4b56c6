pub mod handshake;
pub mod message;
pub mod tile_request;
pub mod tile_response;
