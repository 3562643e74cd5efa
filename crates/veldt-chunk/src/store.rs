use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use hashbrown::HashMap;
use veldt_world::ChunkCoord;

use crate::chunk::{Chunk, ChunkState};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub unrequested: usize,
    pub loading: usize,
    pub ready: usize,
    pub loaded: usize,
    pub failed: usize,
}

impl StateCounts {
    pub fn total(&self) -> usize {
        self.unrequested + self.loading + self.ready + self.loaded + self.failed
    }
}

/// Every chunk ever touched, keyed by grid coordinate. Entries are never evicted.
#[derive(Default)]
pub struct ChunkStore {
    chunks: RwLock<HashMap<ChunkCoord, Arc<Chunk>>>,
    hits: AtomicU64,
    created: AtomicU64,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        self.chunks.read().unwrap().get(&coord).cloned()
    }

    /// Existing chunk for `coord`, or a fresh `Unrequested` one. Concurrent
    /// callers for the same key all receive the same `Arc`.
    pub fn get_or_create(&self, coord: ChunkCoord) -> Arc<Chunk> {
        if let Some(existing) = self.get(coord) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return existing;
        }
        let mut chunks = self.chunks.write().unwrap();
        // Another thread may have inserted between the read and write locks.
        let chunk = chunks.entry(coord).or_insert_with(|| {
            self.created.fetch_add(1, Ordering::Relaxed);
            Arc::new(Chunk::new(coord))
        });
        Arc::clone(chunk)
    }

    pub fn len(&self) -> usize {
        self.chunks.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of placeholders created so far; equals `len()` without eviction.
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn state_counts(&self) -> StateCounts {
        let chunks = self.chunks.read().unwrap();
        let mut out = StateCounts::default();
        for chunk in chunks.values() {
            match chunk.state() {
                ChunkState::Unrequested => out.unrequested += 1,
                ChunkState::Loading => out.loading += 1,
                ChunkState::ReadyForUpload => out.ready += 1,
                ChunkState::Loaded => out.loaded += 1,
                ChunkState::Failed => out.failed += 1,
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_lazy_and_stable() {
        let store = ChunkStore::new();
        assert!(store.get(ChunkCoord::new(3, 4)).is_none());
        let a = store.get_or_create(ChunkCoord::new(3, 4));
        let b = store.get_or_create(ChunkCoord::new(3, 4));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.state(), ChunkState::Unrequested);
        assert_eq!(store.len(), 1);
        assert_eq!(store.created(), 1);
        assert_eq!(store.hits(), 1);
    }

    #[test]
    fn state_counts_track_transitions() {
        let store = ChunkStore::new();
        for i in 0..4 {
            store.get_or_create(ChunkCoord::new(i, 0));
        }
        assert!(store.get_or_create(ChunkCoord::new(0, 0)).try_begin_loading());
        let failed = store.get_or_create(ChunkCoord::new(1, 0));
        failed.try_begin_loading();
        failed.fail("nan");
        let counts = store.state_counts();
        assert_eq!(counts.unrequested, 2);
        assert_eq!(counts.loading, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.total(), 4);
    }
}
