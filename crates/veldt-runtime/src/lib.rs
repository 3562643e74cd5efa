//! Chunk streaming: worker pool, scheduler, and the per-viewer terrain session.
#![forbid(unsafe_code)]

mod scheduler;
mod session;
mod worker;

use thiserror::Error;
use veldt_mesh_cpu::BackendError;
use veldt_world::ConfigError;

pub use scheduler::{StreamStats, StreamUpdate, StreamingScheduler, spherical_chunk_coords};
pub use session::{FrameReport, TerrainSession};
pub use worker::{BuildJob, JobOut, QueueCounters, WorkerPool};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("build queue has no workers left")]
    Disconnected,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
}
