//! Terrain height as a small graph of noise stages.
//!
//! The standard field blends ridged mountains with billowy plains through a
//! low-frequency terrain-type selector, then cuts rivers where a ridged
//! control crosses its lower bound.

mod fractal;
mod graph;

pub use fractal::{FractalKind, FractalSource};
pub use graph::{CompiledGraph, MAX_STAGES, NoiseGraph, StageId};

use crate::config::{ConfigError, NoiseConfig};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TerrainSample {
    pub height: f64,
    /// 0 on dry land, 1 fully inside a river bed.
    pub river: f64,
}

/// Anything that can answer "how high is the ground here". Chunk builds only
/// depend on this, so tests can plug in flat or analytic surfaces.
pub trait HeightSource: Send + Sync {
    fn height(&self, x: f64, z: f64) -> f64;

    fn sample(&self, x: f64, z: f64) -> TerrainSample {
        TerrainSample {
            height: self.height(x, z),
            river: 0.0,
        }
    }
}

pub struct NoiseField {
    graph: CompiledGraph,
    seed: i32,
}

impl NoiseField {
    pub fn from_graph(graph: CompiledGraph, seed: i32) -> Self {
        Self { graph, seed }
    }

    /// The mountain/plain/river graph parameterised by `cfg`.
    pub fn standard(cfg: &NoiseConfig) -> Result<Self, ConfigError> {
        let seed = cfg.seed;
        let mut g = NoiseGraph::new();

        let mountain_base = g.fractal("mountain", FractalKind::Ridged, seed, &cfg.mountain);
        let mountain = g.scale_bias(
            "mountain_scaled",
            mountain_base,
            cfg.mountain.scale,
            cfg.mountain.bias,
        );

        let plain_base = g.fractal("plain", FractalKind::Billow, seed ^ 0x51A7, &cfg.plain);
        let plain = g.scale_bias("plain_scaled", plain_base, cfg.plain.scale, cfg.plain.bias);

        let selector_base = g.fractal(
            "terrain_type",
            FractalKind::Fbm,
            seed ^ 0x7E4A_11,
            &cfg.terrain_type,
        );
        let selector = g.scale_bias(
            "terrain_type_scaled",
            selector_base,
            cfg.terrain_type.scale,
            cfg.terrain_type.bias,
        );
        let land = g.select("land", plain, mountain, selector, &cfg.blend);

        let river_base = g.fractal("river", FractalKind::Ridged, seed ^ 0x0B1E_55, &cfg.river);
        let river = g.scale_bias("river_scaled", river_base, cfg.river.scale, cfg.river.bias);

        let bed_base = g.fractal("river_bed", FractalKind::Billow, seed ^ 0x3D, &cfg.river_bed);
        let bed = g.scale_bias(
            "river_bed_scaled",
            bed_base,
            cfg.river_bed.scale,
            cfg.river_bed.bias,
        );

        let out = g.select("final", land, bed, river, &cfg.river_select);
        Ok(Self::from_graph(g.build(out)?, seed))
    }

    #[inline]
    pub fn seed(&self) -> i32 {
        self.seed
    }

    /// Height at world `(x, z)`. Pure; safe to call from any thread.
    #[inline]
    pub fn evaluate(&self, x: f64, z: f64) -> f64 {
        self.graph.evaluate(x, z).0
    }
}

impl HeightSource for NoiseField {
    #[inline]
    fn height(&self, x: f64, z: f64) -> f64 {
        self.evaluate(x, z)
    }

    fn sample(&self, x: f64, z: f64) -> TerrainSample {
        let (height, river) = self.graph.evaluate(x, z);
        TerrainSample { height, river }
    }
}
