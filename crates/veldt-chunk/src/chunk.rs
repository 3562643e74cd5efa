use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};

use veldt_mesh_cpu::ChunkBuild;
use veldt_world::ChunkCoord;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChunkState {
    Unrequested = 0,
    Loading = 1,
    ReadyForUpload = 2,
    Loaded = 3,
    Failed = 4,
}

impl ChunkState {
    #[inline]
    fn from_u8(v: u8) -> ChunkState {
        match v {
            0 => ChunkState::Unrequested,
            1 => ChunkState::Loading,
            2 => ChunkState::ReadyForUpload,
            3 => ChunkState::Loaded,
            _ => ChunkState::Failed,
        }
    }
}

/// One grid cell of terrain. Build output is written once by a worker and
/// becomes visible to readers only after the state moves to `ReadyForUpload`.
#[derive(Debug)]
pub struct Chunk {
    coord: ChunkCoord,
    state: AtomicU8,
    data: OnceLock<ChunkBuild>,
    archetypes: OnceLock<Vec<usize>>,
    failure: OnceLock<String>,
}

impl Chunk {
    pub fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            state: AtomicU8::new(ChunkState::Unrequested as u8),
            data: OnceLock::new(),
            archetypes: OnceLock::new(),
            failure: OnceLock::new(),
        }
    }

    #[inline]
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    #[inline]
    pub fn state(&self) -> ChunkState {
        ChunkState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, from: ChunkState, to: ChunkState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// `Unrequested -> Loading`. Only one caller ever wins, which is the
    /// enqueue guard.
    #[inline]
    pub fn try_begin_loading(&self) -> bool {
        self.transition(ChunkState::Unrequested, ChunkState::Loading)
    }

    /// `Loading -> Unrequested` when the job never reached a worker.
    #[inline]
    pub fn defer(&self) -> bool {
        self.transition(ChunkState::Loading, ChunkState::Unrequested)
    }

    /// Store the worker's output and flag the chunk ready. Returns false if
    /// the chunk was not loading or already had data.
    pub fn publish(&self, build: ChunkBuild) -> bool {
        if self.state() != ChunkState::Loading || self.data.set(build).is_err() {
            return false;
        }
        self.transition(ChunkState::Loading, ChunkState::ReadyForUpload)
    }

    /// `Loading -> Failed`. Failed chunks are never requested again.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        if !self.transition(ChunkState::Loading, ChunkState::Failed) {
            return false;
        }
        let _ = self.failure.set(reason.into());
        true
    }

    /// `ReadyForUpload -> Loaded`, after the owning thread has uploaded buffers.
    #[inline]
    pub fn mark_loaded(&self) -> bool {
        self.transition(ChunkState::ReadyForUpload, ChunkState::Loaded)
    }

    /// Build output, once published.
    pub fn data(&self) -> Option<&ChunkBuild> {
        match self.state() {
            ChunkState::ReadyForUpload | ChunkState::Loaded => self.data.get(),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.get().map(String::as_str)
    }

    /// Archetype index per tree candidate, chosen by `roll` on first use and
    /// replayed afterwards. `None` until build output is published.
    pub fn archetypes_or_init(
        &self,
        roll: impl FnOnce(usize) -> Vec<usize>,
    ) -> Option<&[usize]> {
        let trees = self.data()?.vegetation.trees.len();
        Some(self.archetypes.get_or_init(|| roll(trees)).as_slice())
    }

    pub fn archetypes(&self) -> Option<&[usize]> {
        self.archetypes.get().map(Vec::as_slice)
    }

    /// Placed tree plus grass candidates.
    pub fn vegetation_count(&self) -> usize {
        self.data().map(|d| d.vegetation.len()).unwrap_or(0)
    }
}
