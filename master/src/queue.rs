//! The tile queue: single source of truth for what remains to be done.
//!
//! Every operation takes one short-lived mutex; callers never hold it
//! across network I/O or any other await point.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Mutex;

use log::warn;
use shared::models::pixel::PixelBuffer;
use shared::models::tile::Tile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState {
    Pending,
    Assigned,
    Done,
    Failed,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CompleteError {
    SizeMismatch {
        id: u32,
        expected: (u32, u32),
        received: (u32, u32),
    },
    AlreadyDone(u32),
    UnknownTile(u32),
}

impl fmt::Display for CompleteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompleteError::SizeMismatch {
                id,
                expected,
                received,
            } => write!(
                f,
                "tile {} result is {}x{}, expected {}x{}",
                id, received.0, received.1, expected.0, expected.1
            ),
            CompleteError::AlreadyDone(id) => write!(f, "tile {} is already done", id),
            CompleteError::UnknownTile(id) => write!(f, "tile {} does not exist", id),
        }
    }
}

#[derive(Debug)]
struct TileEntry {
    tile: Tile,
    state: TileState,
    assigned_to: Option<String>,
    attempts: u32,
}

#[derive(Debug)]
struct QueueInner {
    entries: Vec<TileEntry>,
    /// Pending ids ordered ascending, so `take_next` is lowest-id-first.
    pending: BTreeSet<u32>,
    done: usize,
}

#[derive(Debug)]
pub struct TileQueue {
    inner: Mutex<QueueInner>,
}

impl TileQueue {
    /// Tiles must carry contiguous ids starting at zero, as produced by
    /// [`Tile::grid`].
    pub fn new(tiles: Vec<Tile>) -> Self {
        let pending = tiles.iter().map(|tile| tile.id).collect();
        let entries = tiles
            .into_iter()
            .map(|tile| TileEntry {
                tile,
                state: TileState::Pending,
                assigned_to: None,
                attempts: 0,
            })
            .collect();
        Self {
            inner: Mutex::new(QueueInner {
                entries,
                pending,
                done: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Atomically takes the lowest-id pending tile and marks it assigned
    /// to `who`. Returns `None` when nothing is pending.
    pub fn take_next(&self, who: &str) -> Option<Tile> {
        let mut inner = self.lock();
        let id = inner.pending.pop_first()?;
        let entry = &mut inner.entries[id as usize];
        entry.state = TileState::Assigned;
        entry.assigned_to = Some(who.to_string());
        entry.attempts += 1;
        Some(entry.tile)
    }

    /// Puts a tile back into the pending pool, whoever held it. Idempotent:
    /// requeueing a pending tile changes nothing, and a done tile stays
    /// done.
    pub fn requeue(&self, id: u32) {
        let mut inner = self.lock();
        let Some(entry) = inner.entries.get_mut(id as usize) else {
            warn!("Requeue of unknown tile {}", id);
            return;
        };
        if entry.state == TileState::Done {
            warn!("Ignoring requeue of completed tile {}", id);
            return;
        }
        entry.state = TileState::Pending;
        entry.assigned_to = None;
        inner.pending.insert(id);
    }

    /// Marks a tile done. Rejects buffers whose dimensions do not match
    /// the tile region, leaving the tile `Failed` for the caller to
    /// requeue, and rejects second completions of the same tile.
    pub fn complete(&self, id: u32, buffer: &PixelBuffer) -> Result<(), CompleteError> {
        let mut inner = self.lock();
        let Some(entry) = inner.entries.get_mut(id as usize) else {
            return Err(CompleteError::UnknownTile(id));
        };
        if entry.state == TileState::Done {
            return Err(CompleteError::AlreadyDone(id));
        }
        let region = entry.tile.region;
        if !buffer.matches(&region) {
            entry.state = TileState::Failed;
            entry.assigned_to = None;
            return Err(CompleteError::SizeMismatch {
                id,
                expected: (region.width, region.height),
                received: (buffer.width, buffer.height),
            });
        }
        entry.state = TileState::Done;
        entry.assigned_to = None;
        inner.pending.remove(&id);
        inner.done += 1;
        Ok(())
    }

    pub fn is_frame_complete(&self) -> bool {
        let inner = self.lock();
        inner.done == inner.entries.len()
    }

    /// `(done, total)` tile counts.
    pub fn progress(&self) -> (usize, usize) {
        let inner = self.lock();
        (inner.done, inner.entries.len())
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn state_of(&self, id: u32) -> Option<TileState> {
        self.lock().entries.get(id as usize).map(|entry| entry.state)
    }

    pub fn attempts(&self, id: u32) -> Option<u32> {
        self.lock().entries.get(id as usize).map(|entry| entry.attempts)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use shared::models::tile::Tile;

    fn queue(tile_count: u32) -> TileQueue {
        TileQueue::new(Tile::grid(16 * tile_count, 16, 16))
    }

    fn buffer_for(queue: &TileQueue, id: u32) -> PixelBuffer {
        let state = queue.lock();
        let region = state.entries[id as usize].tile.region;
        PixelBuffer::new(region.width, region.height)
    }

    #[test]
    fn take_next_is_lowest_id_first() {
        let queue = queue(4);
        assert_eq!(queue.take_next("a").map(|t| t.id), Some(0));
        assert_eq!(queue.take_next("a").map(|t| t.id), Some(1));
        queue.requeue(0);
        assert_eq!(queue.take_next("b").map(|t| t.id), Some(0));
        assert_eq!(queue.take_next("b").map(|t| t.id), Some(2));
    }

    #[test]
    fn requeue_is_idempotent() {
        let queue = queue(3);
        let tile = queue.take_next("a").unwrap();
        assert_eq!(queue.pending_count(), 2);
        queue.requeue(tile.id);
        queue.requeue(tile.id);
        assert_eq!(queue.pending_count(), 3);
        assert_eq!(queue.state_of(tile.id), Some(TileState::Pending));
        // The tile comes back exactly once.
        let mut seen = Vec::new();
        while let Some(t) = queue.take_next("a") {
            seen.push(t.id);
        }
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn requeue_never_resurrects_a_done_tile() {
        let queue = queue(2);
        let tile = queue.take_next("a").unwrap();
        let buffer = buffer_for(&queue, tile.id);
        queue.complete(tile.id, &buffer).unwrap();
        queue.requeue(tile.id);
        assert_eq!(queue.state_of(tile.id), Some(TileState::Done));
        assert_eq!(queue.pending_count(), 1);
    }

    #[test]
    fn complete_rejects_wrong_dimensions() {
        let queue = queue(2);
        let tile = queue.take_next("a").unwrap();
        let bad = PixelBuffer::new(tile.region.width + 1, tile.region.height);
        let err = queue.complete(tile.id, &bad).unwrap_err();
        assert!(matches!(err, CompleteError::SizeMismatch { id: 0, .. }));
        assert_eq!(queue.state_of(tile.id), Some(TileState::Failed));
        // Requeue recovers it.
        queue.requeue(tile.id);
        assert_eq!(queue.take_next("b").map(|t| t.id), Some(tile.id));
    }

    #[test]
    fn complete_rejects_double_completion() {
        let queue = queue(2);
        let tile = queue.take_next("a").unwrap();
        let buffer = buffer_for(&queue, tile.id);
        queue.complete(tile.id, &buffer).unwrap();
        assert_eq!(
            queue.complete(tile.id, &buffer),
            Err(CompleteError::AlreadyDone(tile.id))
        );
        let (done, _) = queue.progress();
        assert_eq!(done, 1);
    }

    #[test]
    fn frame_completes_when_every_tile_is_done() {
        let queue = queue(3);
        while let Some(tile) = queue.take_next("a") {
            assert!(!queue.is_frame_complete());
            let buffer = buffer_for(&queue, tile.id);
            queue.complete(tile.id, &buffer).unwrap();
        }
        assert!(queue.is_frame_complete());
        assert_eq!(queue.progress(), (3, 3));
    }

    #[test]
    fn concurrent_takers_never_share_a_tile() {
        let queue = Arc::new(TileQueue::new(Tile::grid(256, 256, 16)));
        let mut handles = Vec::new();
        for worker in 0..8 {
            let queue = queue.clone();
            handles.push(std::thread::spawn(move || {
                let who = format!("worker-{}", worker);
                let mut taken = Vec::new();
                while let Some(tile) = queue.take_next(&who) {
                    taken.push(tile.id);
                    let buffer = PixelBuffer::new(tile.region.width, tile.region.height);
                    queue.complete(tile.id, &buffer).unwrap();
                }
                taken
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.join().unwrap());
        }
        let unique: HashSet<u32> = all.iter().copied().collect();
        assert_eq!(all.len(), 256, "each tile taken exactly once");
        assert_eq!(unique.len(), 256);
        assert!(queue.is_frame_complete());
    }
}
