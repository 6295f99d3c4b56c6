use serde::{Deserialize, Serialize};

/// Everything the master process needs to drive one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterConfig {
    /// Worker addresses (`host:port`) dialed at startup and re-dialed by the
    /// discovery sweep while the frame is incomplete.
    pub workers: Vec<String>,
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    /// Local render threads; zero means remote workers only.
    pub threads: usize,
    pub scene_path: Option<String>,
    pub output_path: String,
    pub tile_timeout_secs: u64,
    pub handshake_timeout_secs: u64,
}

impl MasterConfig {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        workers: Vec<String>,
        width: u32,
        height: u32,
        tile_size: u32,
        threads: usize,
        scene_path: Option<String>,
        output_path: String,
        tile_timeout_secs: u64,
        handshake_timeout_secs: u64,
    ) -> Self {
        Self {
            workers,
            width,
            height,
            tile_size,
            threads,
            scene_path,
            output_path,
            tile_timeout_secs,
            handshake_timeout_secs,
        }
    }
}
