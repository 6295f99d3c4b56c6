pub mod connection;
pub mod error;
pub mod executor;
pub mod queue;
pub mod scheduler;

use std::sync::Arc;

use log::{error, info, warn};
use scene::Scene;
use shared::models::pixel::PixelBuffer;
use shared::networking::master::MasterConfig;

use error::MasterError;
use scheduler::{run_frame, FrameJob};

pub async fn run_master(config: MasterConfig) {
    shared::env::init();
    shared::logger::init();

    match run(&config).await {
        Ok(()) => info!("Master shutdown gracefully"),
        Err(e) => error!("Master error: {}", e),
    }
}

async fn run(config: &MasterConfig) -> Result<(), MasterError> {
    let scene = Arc::new(load_scene(config)?);
    info!(
        "Rendering {}x{} frame with {} local threads and {} configured workers",
        scene.width(),
        scene.height(),
        config.threads,
        config.workers.len()
    );
    let scene_blob = Arc::new(scene.to_blob()?);
    let job = FrameJob::new(scene.clone(), config.tile_size);

    {
        let job = job.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            warn!("Abort requested, closing worker connections");
            job.abort();
        }) {
            warn!("Failed to install abort handler: {}", e);
        }
    }

    let result = run_frame(job.clone(), config, scene_blob).await;
    // Frame teardown takes the acceleration structure's exclusive lock
    // before the scene storage goes away.
    scene.teardown();
    result?;

    save_framebuffer(&job.framebuffer_snapshot(), &config.output_path)?;
    info!("Wrote {}", config.output_path);
    Ok(())
}

fn load_scene(config: &MasterConfig) -> Result<Scene, MasterError> {
    match &config.scene_path {
        Some(path) => {
            let blob = std::fs::read(path)?;
            info!("Loaded scene from {}", path);
            Ok(Scene::from_blob(&blob)?)
        }
        None => Ok(Scene::demo(config.width, config.height)),
    }
}

fn save_framebuffer(framebuffer: &PixelBuffer, path: &str) -> Result<(), MasterError> {
    let image = image::RgbaImage::from_raw(
        framebuffer.width,
        framebuffer.height,
        framebuffer.data.clone(),
    )
    .ok_or(MasterError::Framebuffer)?;
    Ok(image.save(path)?)
}
