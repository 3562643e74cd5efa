//! Chunk lifecycle and the coordinate-keyed chunk store.
#![forbid(unsafe_code)]

mod chunk;
mod store;

pub use chunk::{Chunk, ChunkState};
pub use store::{ChunkStore, StateCounts};
