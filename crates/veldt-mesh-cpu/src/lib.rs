//! CPU side of chunk meshing: heightmap triangulation, surface bands, the sky dome, and the backend seam.
#![forbid(unsafe_code)]

mod backend;
mod generator;
mod mesh_build;
mod palette;
mod sky;

pub use backend::{BackendError, GraphicsBackend, RecordedCall, RecordingBackend};
pub use generator::{ChunkBuild, ChunkGenerator, GenerationError, VegetationCandidates};
pub use mesh_build::MeshBuild;
pub use palette::{SurfaceBand, TextureId, TexturePalette};
pub use sky::{DOME_FLATTEN, SkySample, build_dome, dome_point};
