//! World sizing, chunk coordinates, terrain configuration, and the noise field.
#![forbid(unsafe_code)]

pub mod config;
pub mod noise;

mod chunk_coord;

pub use chunk_coord::{ChunkCoord, chunk_to_world, world_to_chunk};
pub use config::{
    ConfigError, MAX_CHUNK_VERTICES, QueueFullPolicy, TerrainConfig, load_config_from_path,
};
pub use noise::{HeightSource, NoiseField, NoiseGraph, StageId, TerrainSample};
