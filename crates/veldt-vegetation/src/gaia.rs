use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use veldt_chunk::Chunk;
use veldt_geom::Mat4;
use veldt_mesh_cpu::{BackendError, ChunkBuild, GraphicsBackend, TexturePalette};
use veldt_world::ChunkCoord;
use veldt_world::config::Vegetation;

use crate::archetype::{TreeArchetype, grass_blade};
use crate::bucket::InstanceBucket;
use crate::lsystem::TREE_RULES;

/// LQ trees are the same silhouette drawn this much larger.
pub const LQ_SCALE: f32 = 5.0;

/// Owns every vegetation instance bucket: one per tree archetype and LOD,
/// plus one for grass.
pub struct Gaia<H> {
    hq: Vec<InstanceBucket<H>>,
    lq: Vec<InstanceBucket<H>>,
    grass: InstanceBucket<H>,
    rng: ChaCha8Rng,
    wind_amplitude_deg: f32,
    wind_speed: f32,
}

impl<H: Copy> Gaia<H> {
    /// Grows the archetypes from `cfg.seed`; `grid_step` sizes the grass blade.
    pub fn new(cfg: &Vegetation, grid_step: f32, palette: &TexturePalette) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
        let bark = palette.id("branches");
        let leaf = palette.id("leaves");
        let lq_tree = TreeArchetype::low_quality(&mut rng);
        let lq_branches = Arc::new(lq_tree.branches);
        let lq_leaves = Arc::new(lq_tree.leaves);

        let mut hq = Vec::with_capacity(TREE_RULES.len());
        let mut lq = Vec::with_capacity(TREE_RULES.len());
        for (i, rule) in TREE_RULES.into_iter().enumerate() {
            let tree = TreeArchetype::from_rule(rule, &mut rng);
            log::info!(
                "tree archetype {} rule={} angle={:.1} tris={}",
                i,
                tree.rule,
                tree.angle_deg,
                tree.triangle_count()
            );
            hq.push(InstanceBucket::new(
                format!("tree{i}_hq"),
                vec![
                    (Arc::new(tree.branches), bark),
                    (Arc::new(tree.leaves), leaf),
                ],
                Mat4::IDENTITY,
                true,
            ));
            lq.push(InstanceBucket::new(
                format!("tree{i}_lq"),
                vec![(Arc::clone(&lq_branches), bark), (Arc::clone(&lq_leaves), leaf)],
                Mat4::scale(LQ_SCALE),
                true,
            ));
        }
        let grass = InstanceBucket::new(
            "grass",
            vec![(Arc::new(grass_blade(grid_step)), palette.id("grass"))],
            Mat4::IDENTITY,
            false,
        );
        Self {
            hq,
            lq,
            grass,
            rng,
            wind_amplitude_deg: cfg.wind_amplitude_deg,
            wind_speed: cfg.wind_speed,
        }
    }

    #[inline]
    pub fn archetype_count(&self) -> usize {
        self.hq.len()
    }

    /// Viewer's chunk and its eight neighbours get full detail.
    #[inline]
    pub fn is_high_quality(chunk: ChunkCoord, viewer: ChunkCoord) -> bool {
        chunk.chebyshev(viewer) <= 1
    }

    /// Instances a chunk contributes when seen from `viewer`: all trees, and
    /// grass only at full detail.
    pub fn placed_count(chunk: &Chunk, viewer: ChunkCoord) -> usize {
        match chunk.data() {
            Some(d) if Self::is_high_quality(chunk.coord(), viewer) => d.vegetation.len(),
            Some(d) => d.vegetation.trees.len(),
            None => 0,
        }
    }

    /// First placement of a newly loaded chunk. Rolls archetype indices once
    /// and stores them on the chunk; later calls replay the stored choice.
    pub fn create_chunk_vegetation(&mut self, chunk: &Chunk, viewer: ChunkCoord) -> usize {
        let count = self.hq.len();
        let rng = &mut self.rng;
        let Some(ids) =
            chunk.archetypes_or_init(|trees| (0..trees).map(|_| rng.random_range(0..count)).collect())
        else {
            return 0;
        };
        let Some(data) = chunk.data() else {
            return 0;
        };
        let hq = Self::is_high_quality(chunk.coord(), viewer);
        self.place(data, ids, hq)
    }

    fn place(&mut self, data: &ChunkBuild, ids: &[usize], hq: bool) -> usize {
        let buckets = if hq { &mut self.hq } else { &mut self.lq };
        for (transform, &id) in data.vegetation.trees.iter().zip(ids) {
            buckets[id].extend([*transform]);
        }
        let mut placed = data.vegetation.trees.len().min(ids.len());
        if hq {
            self.grass.extend(data.vegetation.grass.iter().copied());
            placed += data.vegetation.grass.len();
        }
        placed
    }

    pub fn reset_instance_transforms(&mut self) {
        for b in self.hq.iter_mut().chain(self.lq.iter_mut()) {
            b.clear();
        }
        self.grass.clear();
    }

    /// Rebuild every bucket from the chunks' stored placements and archetype
    /// choices, reclassifying LOD around `viewer`. Chunks that never had
    /// vegetation created are skipped.
    pub fn redraw_all_chunks(&mut self, chunks: &[Arc<Chunk>], viewer: ChunkCoord) -> usize {
        self.reset_instance_transforms();
        let mut placed = 0;
        for chunk in chunks {
            let (Some(data), Some(ids)) = (chunk.data(), chunk.archetypes()) else {
                continue;
            };
            placed += self.place(data, ids, Self::is_high_quality(chunk.coord(), viewer));
        }
        log::debug!(
            "vegetation redraw chunks={} instances={} grass={}",
            chunks.len(),
            placed,
            self.grass.len()
        );
        placed
    }

    pub fn total_instances(&self) -> usize {
        self.hq.iter().chain(self.lq.iter()).map(InstanceBucket::len).sum::<usize>() + self.grass.len()
    }

    pub fn hq_counts(&self) -> Vec<usize> {
        self.hq.iter().map(InstanceBucket::len).collect()
    }

    pub fn lq_counts(&self) -> Vec<usize> {
        self.lq.iter().map(InstanceBucket::len).collect()
    }

    pub fn grass_count(&self) -> usize {
        self.grass.len()
    }

    /// Re-upload every bucket whose list changed. Returns the number re-uploaded.
    pub fn upload_dirty<B>(&mut self, backend: &mut B) -> Result<usize, BackendError>
    where
        B: GraphicsBackend<Handle = H>,
    {
        let mut uploaded = 0;
        for b in self
            .hq
            .iter_mut()
            .chain(self.lq.iter_mut())
            .chain(std::iter::once(&mut self.grass))
        {
            if b.upload(backend)? {
                uploaded += 1;
            }
        }
        Ok(uploaded)
    }

    /// Sway angle in degrees at `elapsed_secs`.
    #[inline]
    pub fn wind_angle(&self, elapsed_secs: f64) -> f32 {
        self.wind_amplitude_deg * (f64::from(self.wind_speed) * elapsed_secs).cos() as f32
    }

    pub fn draw<B>(&self, backend: &mut B, elapsed_secs: f64)
    where
        B: GraphicsBackend<Handle = H>,
    {
        let sway = Mat4::rotation_x(self.wind_angle(elapsed_secs).to_radians());
        for b in self.hq.iter().chain(self.lq.iter()).chain(std::iter::once(&self.grass)) {
            b.draw(backend, &sway);
        }
    }
}
