//! The master scheduler: owns the tile queue and the framebuffer, drives
//! every executor, and recovers from per-tile and per-connection failures
//! by requeueing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use scene::Scene;
use shared::models::pixel::PixelBuffer;
use shared::models::tile::Tile;
use shared::networking::master::MasterConfig;
use tokio::sync::Notify;
use tokio::time::{sleep, timeout};

use crate::connection::RemoteExecutor;
use crate::error::MasterError;
use crate::executor::{LocalExecutor, TileExecutor, TileOutcome};
use crate::queue::{CompleteError, TileQueue};

const TICK_INTERVAL: Duration = Duration::from_millis(500);
const IDLE_POLL: Duration = Duration::from_millis(50);

/// A worker address is considered gone once this many consecutive dials
/// fail; the sweep keeps dialing it anyway in case it comes back.
const MAX_DIAL_FAILURES: u32 = 3;

/// Everything shared between the scheduler loop and its executors for the
/// duration of one frame.
pub struct FrameJob {
    pub queue: TileQueue,
    scene: Arc<Scene>,
    framebuffer: Mutex<PixelBuffer>,
    work_available: Notify,
    finished: Notify,
    abort_notify: Notify,
    aborted: AtomicBool,
    completion_reported: AtomicBool,
}

impl FrameJob {
    pub fn new(scene: Arc<Scene>, tile_size: u32) -> Arc<Self> {
        let tiles = Tile::grid(scene.width(), scene.height(), tile_size);
        let framebuffer = PixelBuffer::new(scene.width(), scene.height());
        info!(
            "Frame partitioned into {} tiles of up to {}x{} pixels",
            tiles.len(),
            tile_size,
            tile_size
        );
        Arc::new(Self {
            queue: TileQueue::new(tiles),
            scene,
            framebuffer: Mutex::new(framebuffer),
            work_available: Notify::new(),
            finished: Notify::new(),
            abort_notify: Notify::new(),
            aborted: AtomicBool::new(false),
            completion_reported: AtomicBool::new(false),
        })
    }

    pub fn scene(&self) -> Arc<Scene> {
        self.scene.clone()
    }

    /// Stops the frame: executors drop their channels, the scheduler loop
    /// exits without waiting for in-flight tiles.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        self.abort_notify.notify_waiters();
        self.finished.notify_waiters();
        self.work_available.notify_waiters();
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub async fn aborted_wait(&self) {
        if self.is_aborted() {
            return;
        }
        self.abort_notify.notified().await;
    }

    /// Resolves once the frame is complete or aborted. Callers re-check
    /// state afterwards; a notification may race a late registration.
    pub async fn finished_wait(&self) {
        if self.queue.is_frame_complete() || self.is_aborted() {
            return;
        }
        self.finished.notified().await;
    }

    async fn wait_for_work(&self) {
        tokio::select! {
            _ = self.work_available.notified() => {}
            _ = self.finished.notified() => {}
            _ = sleep(IDLE_POLL) => {}
        }
    }

    /// The uniform `(tile, outcome)` event every executor reports through.
    pub fn report(&self, executor_id: &str, tile: &Tile, outcome: TileOutcome) {
        match outcome {
            TileOutcome::Success(buffer) => match self.queue.complete(tile.id, &buffer) {
                Ok(()) => {
                    {
                        let mut framebuffer = self
                            .framebuffer
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner());
                        framebuffer.blit(tile.region.x, tile.region.y, &buffer);
                    }
                    let (done, total) = self.queue.progress();
                    debug!("Tile {} done by {} ({}/{})", tile.id, executor_id, done, total);
                    if done == total && !self.completion_reported.swap(true, Ordering::SeqCst) {
                        info!("Frame complete: {} tiles rendered", total);
                        self.finished.notify_waiters();
                    }
                }
                Err(CompleteError::AlreadyDone(id)) => {
                    debug!("Stale result for tile {} from {} ignored", id, executor_id);
                }
                Err(e) => {
                    warn!("Rejected result from {}: {}", executor_id, e);
                    self.queue.requeue(tile.id);
                    self.work_available.notify_waiters();
                }
            },
            TileOutcome::Failed => {
                warn!("{} failed tile {}, requeueing", executor_id, tile.id);
                self.queue.requeue(tile.id);
                self.work_available.notify_waiters();
            }
            TileOutcome::ConnectionLost => {
                warn!(
                    "Connection to {} lost with tile {} in flight, requeueing",
                    executor_id, tile.id
                );
                self.queue.requeue(tile.id);
                self.work_available.notify_waiters();
            }
        }
    }

    pub fn framebuffer_snapshot(&self) -> PixelBuffer {
        self.framebuffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Assignment loop shared by every executor kind: take the next pending
/// tile, run it, report the outcome. Exits when the frame is complete or
/// aborted, or when the executor loses its connection.
pub async fn drive_executor<E: TileExecutor>(job: Arc<FrameJob>, mut executor: E) {
    loop {
        if job.is_aborted() || job.queue.is_frame_complete() {
            break;
        }
        let tile = match job.queue.take_next(executor.id()) {
            Some(tile) => tile,
            None => {
                // Nothing pending right now; assigned tiles elsewhere may
                // still come back through requeue.
                job.wait_for_work().await;
                continue;
            }
        };

        let outcome = tokio::select! {
            outcome = executor.run_tile(&tile) => outcome,
            _ = job.aborted_wait() => {
                job.queue.requeue(tile.id);
                break;
            }
        };
        let lost = matches!(outcome, TileOutcome::ConnectionLost);
        job.report(executor.id(), &tile, outcome);
        if lost {
            break;
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct AddrState {
    connected: bool,
    dialing: bool,
    failures: u32,
}

/// Tracks configured worker addresses across discovery sweeps.
struct Discovery {
    state: Mutex<HashMap<String, AddrState>>,
}

impl Discovery {
    fn new(addrs: &[String]) -> Arc<Self> {
        let state = addrs
            .iter()
            .map(|addr| (addr.clone(), AddrState::default()))
            .collect();
        Arc::new(Self {
            state: Mutex::new(state),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, AddrState>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn live(&self) -> usize {
        self.lock().values().filter(|s| s.connected).count()
    }

    fn dialing(&self) -> usize {
        self.lock().values().filter(|s| s.dialing).count()
    }

    /// True once every address has failed enough consecutive dials to be
    /// presumed gone. Vacuously true with no addresses configured.
    fn exhausted(&self) -> bool {
        self.lock()
            .values()
            .all(|s| !s.connected && !s.dialing && s.failures >= MAX_DIAL_FAILURES)
    }

    fn begin_dial(&self, addr: &str) -> bool {
        let mut state = self.lock();
        let Some(entry) = state.get_mut(addr) else {
            return false;
        };
        if entry.connected || entry.dialing {
            return false;
        }
        entry.dialing = true;
        true
    }

    fn dial_failed(&self, addr: &str) {
        let mut state = self.lock();
        if let Some(entry) = state.get_mut(addr) {
            entry.dialing = false;
            entry.failures += 1;
        }
    }

    fn mark_connected(&self, addr: &str) {
        let mut state = self.lock();
        if let Some(entry) = state.get_mut(addr) {
            entry.dialing = false;
            entry.connected = true;
            entry.failures = 0;
        }
    }

    fn mark_disconnected(&self, addr: &str) {
        let mut state = self.lock();
        if let Some(entry) = state.get_mut(addr) {
            entry.connected = false;
        }
    }
}

/// Re-dials every configured worker address that has no live connection.
/// This is how workers join mid-frame, and how a restarted worker rejoins
/// as a brand-new connection.
fn sweep(
    job: &Arc<FrameJob>,
    config: &MasterConfig,
    scene_blob: &Arc<Vec<u8>>,
    discovery: &Arc<Discovery>,
) {
    for addr in &config.workers {
        if !discovery.begin_dial(addr) {
            continue;
        }
        let job = job.clone();
        let addr = addr.clone();
        let scene_blob = scene_blob.clone();
        let discovery = discovery.clone();
        let handshake_timeout = Duration::from_secs(config.handshake_timeout_secs);
        let tile_timeout = Duration::from_secs(config.tile_timeout_secs);
        tokio::spawn(async move {
            let dial = RemoteExecutor::connect(
                &addr,
                &scene_blob,
                handshake_timeout,
                tile_timeout,
            );
            // The dial itself is bounded too, so a black-holed address
            // cannot pin the sweep's in-flight count forever.
            match timeout(handshake_timeout.saturating_mul(2), dial).await {
                Ok(Ok(executor)) => {
                    discovery.mark_connected(&addr);
                    info!("Worker {} joined the pool from {}", executor.id(), addr);
                    drive_executor(job, executor).await;
                    discovery.mark_disconnected(&addr);
                    debug!("Worker connection to {} closed", addr);
                }
                Ok(Err(e)) => {
                    warn!("Failed to reach worker at {}: {}", addr, e);
                    discovery.dial_failed(&addr);
                }
                Err(_) => {
                    warn!("Worker at {} did not answer the handshake in time", addr);
                    discovery.dial_failed(&addr);
                }
            }
        });
    }
}

/// Drives one frame to completion, abort, or fatal incompleteness.
pub async fn run_frame(
    job: Arc<FrameJob>,
    config: &MasterConfig,
    scene_blob: Arc<Vec<u8>>,
) -> Result<(), MasterError> {
    for index in 0..config.threads {
        let executor = LocalExecutor::new(index, job.scene());
        tokio::spawn(drive_executor(job.clone(), executor));
    }

    let discovery = Discovery::new(&config.workers);
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    loop {
        if job.is_aborted() {
            return Err(MasterError::Aborted);
        }
        if job.queue.is_frame_complete() {
            return Ok(());
        }
        tokio::select! {
            _ = job.finished_wait() => {}
            _ = ticker.tick() => {
                let (done, total) = job.queue.progress();
                info!("Progress: {}/{} tiles", done, total);
                // Fatal only when the queue cannot drain: no local
                // fallback, nothing connected or connecting, and every
                // known address presumed gone.
                if config.threads == 0
                    && discovery.live() == 0
                    && discovery.dialing() == 0
                    && discovery.exhausted()
                {
                    return Err(MasterError::AllWorkersLost);
                }
                sweep(&job, config, &scene_blob, &discovery);
            }
        }
    }
}
