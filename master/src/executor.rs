//! Work executors: anything that can turn a tile assignment into pixels.
//!
//! Local render threads and remote worker connections implement the same
//! interface, so the scheduler drives both with one policy. The local
//! variant is the always-ready "self" pseudo-connection.

use std::sync::Arc;

use log::error;
use scene::render::render_tile;
use scene::Scene;
use shared::models::pixel::PixelBuffer;
use shared::models::tile::Tile;

/// The uniform event an executor reports for each tile it was handed.
#[derive(Debug)]
pub enum TileOutcome {
    Success(PixelBuffer),
    Failed,
    ConnectionLost,
}

#[allow(async_fn_in_trait)]
pub trait TileExecutor {
    fn id(&self) -> &str;

    /// Runs one tile to an outcome. `ConnectionLost` means the executor is
    /// spent and must not be assigned further work.
    async fn run_tile(&mut self, tile: &Tile) -> TileOutcome;
}

/// In-process executor backed by the render-tile service on the blocking
/// thread pool. It can fail a tile but never loses a connection.
pub struct LocalExecutor {
    id: String,
    scene: Arc<Scene>,
}

impl LocalExecutor {
    pub fn new(index: usize, scene: Arc<Scene>) -> Self {
        Self {
            id: format!("local-{}", index),
            scene,
        }
    }
}

impl TileExecutor for LocalExecutor {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run_tile(&mut self, tile: &Tile) -> TileOutcome {
        let scene = self.scene.clone();
        let region = tile.region;
        match tokio::task::spawn_blocking(move || render_tile(&scene, &region)).await {
            Ok(Ok(buffer)) => TileOutcome::Success(buffer),
            Ok(Err(e)) => {
                error!("{}: render failed for tile {}: {}", self.id, tile.id, e);
                TileOutcome::Failed
            }
            Err(e) => {
                error!("{}: render task for tile {} panicked: {}", self.id, tile.id, e);
                TileOutcome::Failed
            }
        }
    }
}
