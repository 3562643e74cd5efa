use std::time::Instant;

use thiserror::Error;
use veldt_geom::{Aabb, Mat4, Vec3};
use veldt_world::config::{Bands, ChunkShape, TerrainConfig, Vegetation};
use veldt_world::{ChunkCoord, HeightSource, chunk_to_world};

use crate::mesh_build::MeshBuild;
use crate::palette::{SurfaceBand, TextureId, TexturePalette};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("height field returned {value} at world ({x}, {z})")]
    NonFiniteHeight { value: f64, x: f64, z: f64 },
    #[error("palette has no texture named `{0}`")]
    MissingTexture(&'static str),
    #[error("chunk grid needs at least one cell per side")]
    EmptyGrid,
}

/// World-space placements for one chunk, before any archetype is chosen.
#[derive(Clone, Debug, Default)]
pub struct VegetationCandidates {
    pub trees: Vec<Mat4>,
    pub grass: Vec<Mat4>,
}

impl VegetationCandidates {
    #[inline]
    pub fn len(&self) -> usize {
        self.trees.len() + self.grass.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty() && self.grass.is_empty()
    }
}

/// Everything a worker produces for one chunk.
#[derive(Clone, Debug)]
pub struct ChunkBuild {
    pub coord: ChunkCoord,
    pub points_per_side: u32,
    pub world_size: f64,
    /// Raw field heights, `(N+1)^2` samples indexed `x + (N+1) * z`.
    pub height_map: Vec<f32>,
    /// Chunk-local mesh; draw it translated to `origin`.
    pub mesh: MeshBuild,
    pub origin: Vec3,
    pub bounds: Aabb,
    pub vegetation: VegetationCandidates,
    pub build_ms: u32,
}

impl ChunkBuild {
    #[inline]
    pub fn height_at(&self, x: u32, z: u32) -> f32 {
        let side = self.points_per_side as usize + 1;
        self.height_map[x as usize + side * z as usize]
    }

    #[inline]
    pub fn model_transform(&self) -> Mat4 {
        Mat4::translation(self.origin)
    }
}

/// Salts for the placement hashes so trees and grass do not share yaw.
const TREE_SALT: u32 = 0x7A3E_E001;
const GRASS_SALT: u32 = 0x6A55_0002;

#[derive(Clone, Debug)]
pub struct ChunkGenerator {
    shape: ChunkShape,
    bands: Bands,
    vegetation: Vegetation,
}

impl ChunkGenerator {
    pub fn new(cfg: &TerrainConfig) -> Self {
        Self {
            shape: cfg.chunk.clone(),
            bands: cfg.bands.clone(),
            vegetation: cfg.vegetation.clone(),
        }
    }

    #[inline]
    pub fn shape(&self) -> &ChunkShape {
        &self.shape
    }

    pub fn build(
        &self,
        coord: ChunkCoord,
        field: &dyn HeightSource,
        palette: &TexturePalette,
    ) -> Result<ChunkBuild, GenerationError> {
        let t0 = Instant::now();
        let n = self.shape.points_per_side as usize;
        if n == 0 {
            return Err(GenerationError::EmptyGrid);
        }
        let side = n + 1;
        let step = self.shape.step();
        let (ox, oz) = chunk_to_world(coord, self.shape.world_size);
        let vs = f64::from(self.shape.vertical_scale);

        let mut band_tex = [TextureId::default(); 6];
        for band in SurfaceBand::DESCENDING {
            let name = band.texture_name();
            band_tex[band as usize] = palette
                .id(name)
                .ok_or(GenerationError::MissingTexture(name))?;
        }

        let sample = |gx: isize, gz: isize| -> Result<(f64, f64), GenerationError> {
            let x = ox + gx as f64 * step;
            let z = oz + gz as f64 * step;
            let s = field.sample(x, z);
            if !s.height.is_finite() {
                return Err(GenerationError::NonFiniteHeight {
                    value: s.height,
                    x,
                    z,
                });
            }
            Ok((s.height, s.river))
        };

        // 1. Heights over the (N+1)^2 grid, z-outer so index = x + side * z.
        let mut heights = Vec::with_capacity(side * side);
        let mut river = Vec::with_capacity(side * side);
        for z in 0..side {
            for x in 0..side {
                let (h, r) = sample(x as isize, z as isize)?;
                heights.push(h);
                river.push(r);
            }
        }

        // Neighbours off the grid come from the field, never from other chunks.
        let h_at = |gx: isize, gz: isize| -> Result<f64, GenerationError> {
            if (0..side as isize).contains(&gx) && (0..side as isize).contains(&gz) {
                Ok(heights[gx as usize + side * gz as usize])
            } else {
                sample(gx, gz).map(|(h, _)| h)
            }
        };

        // 2-3. Vertices with central-difference normals, band texture and blend.
        let mut mesh = MeshBuild::with_capacity(side * side, n * n * 6);
        let repeat = self.shape.texture_repeat;
        for z in 0..side {
            for x in 0..side {
                let (gx, gz) = (x as isize, z as isize);
                let h = heights[x + side * z];
                let hl = h_at(gx - 1, gz)?;
                let hr = h_at(gx + 1, gz)?;
                let hd = h_at(gx, gz - 1)?;
                let hu = h_at(gx, gz + 1)?;
                let normal = Vec3::new(
                    ((hl - hr) * vs) as f32,
                    (2.0 * step) as f32,
                    ((hd - hu) * vs) as f32,
                )
                .normalized();

                let band = SurfaceBand::classify(h, &self.bands);
                let alpha = band.alpha(h, river[x + side * z], &self.bands);
                let [r, g, b] = band.tint();
                let p = Vec3::new(
                    (x as f64 * step) as f32,
                    (h * vs) as f32,
                    (z as f64 * step) as f32,
                );
                let uv = (
                    x as f32 / n as f32 * repeat,
                    z as f32 / n as f32 * repeat,
                );
                mesh.push_vertex(
                    p,
                    normal,
                    uv,
                    band_tex[band as usize],
                    alpha,
                    [r, g, b, (alpha * 255.0).round() as u8],
                );
            }
        }

        // 4. Two triangles per cell.
        let s = side as u32;
        for z in 0..n as u32 {
            for x in 0..n as u32 {
                let i = x + s * z;
                mesh.push_triangle(i, i + 1, i + s);
                mesh.push_triangle(i + 1, i + s + 1, i + s);
            }
        }

        // 5. Vegetation on coarser strides.
        let origin = Vec3::new(ox as f32, 0.0, oz as f32);
        let vegetation = self.place_vegetation(coord, &heights, side, step, vs, origin);

        let bounds = mesh.bounds();
        let height_map = heights.iter().map(|&h| h as f32).collect();
        let build_ms = t0.elapsed().as_millis() as u32;
        log::debug!(
            target: "perf",
            "ms={} chunk_build cx={} cz={} verts={} trees={} grass={}",
            build_ms,
            coord.cx,
            coord.cz,
            mesh.vertex_count(),
            vegetation.trees.len(),
            vegetation.grass.len()
        );
        Ok(ChunkBuild {
            coord,
            points_per_side: self.shape.points_per_side,
            world_size: self.shape.world_size,
            height_map,
            mesh,
            origin,
            bounds,
            vegetation,
            build_ms,
        })
    }

    fn place_vegetation(
        &self,
        coord: ChunkCoord,
        heights: &[f64],
        side: usize,
        step: f64,
        vs: f64,
        origin: Vec3,
    ) -> VegetationCandidates {
        let n = side - 1;
        let seed = self.vegetation.seed as u32 ^ (self.vegetation.seed >> 32) as u32;
        let mut out = VegetationCandidates::default();
        let layers = [
            (self.vegetation.tree_band, self.vegetation.tree_stride, TREE_SALT, &mut out.trees),
            (self.vegetation.grass_band, self.vegetation.grass_stride, GRASS_SALT, &mut out.grass),
        ];
        for ([lo, hi], stride, salt, list) in layers {
            // The far edge belongs to the neighbouring chunk.
            for z in (0..n).step_by(stride.max(1) as usize) {
                for x in (0..n).step_by(stride.max(1) as usize) {
                    let h = heights[x + side * z];
                    if !(h > lo && h < hi) {
                        continue;
                    }
                    let gx = coord.cx.wrapping_mul(n as i32).wrapping_add(x as i32);
                    let gz = coord.cz.wrapping_mul(n as i32).wrapping_add(z as i32);
                    let yaw = rand01(hash2(gx, gz, seed ^ salt)) * std::f32::consts::TAU;
                    let p = origin
                        + Vec3::new(
                            (x as f64 * step) as f32,
                            (h * vs) as f32,
                            (z as f64 * step) as f32,
                        );
                    list.push(Mat4::translation(p) * Mat4::rotation_y(yaw));
                }
            }
        }
        out
    }
}

fn hash2(ix: i32, iz: i32, seed: u32) -> u32 {
    let mut h = (ix as u32).wrapping_mul(0x85eb_ca6b)
        ^ (iz as u32).wrapping_mul(0xc2b2_ae35)
        ^ seed.wrapping_mul(0x27d4_eb2d);
    h ^= h >> 16;
    h = h.wrapping_mul(0x7feb_352d);
    h ^= h >> 15;
    h = h.wrapping_mul(0x846c_a68b);
    h ^= h >> 16;
    h
}

#[inline]
fn rand01(h: u32) -> f32 {
    ((h & 0x00FF_FFFF) as f32) / 16_777_216.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use veldt_world::config::Palette;

    struct Plane {
        slope_x: f64,
    }

    impl HeightSource for Plane {
        fn height(&self, x: f64, _z: f64) -> f64 {
            self.slope_x * x
        }
    }

    struct Hole;

    impl HeightSource for Hole {
        fn height(&self, x: f64, z: f64) -> f64 {
            if x > 4.0 && z > 4.0 { f64::NAN } else { 0.0 }
        }
    }

    fn small_cfg(points: u32) -> TerrainConfig {
        let mut cfg = TerrainConfig::default();
        cfg.chunk.points_per_side = points;
        cfg.chunk.world_size = 8.0;
        cfg.chunk.vertical_scale = 1.0;
        cfg
    }

    #[test]
    fn flat_field_has_up_normals_and_no_skew() {
        let cfg = small_cfg(4);
        let g = ChunkGenerator::new(&cfg);
        let palette = TexturePalette::from_config(&Palette::default());
        let out = g
            .build(ChunkCoord::new(2, -1), &Plane { slope_x: 0.0 }, &palette)
            .unwrap();
        assert_eq!(out.height_map.len(), 25);
        for n in out.mesh.norm.chunks_exact(3) {
            assert!((n[1] - 1.0).abs() < 1e-6);
        }
        assert_eq!(out.origin, Vec3::new(16.0, 0.0, -8.0));
    }

    #[test]
    fn edge_normals_use_field_beyond_the_grid() {
        // On a uniform slope the edge normal must equal the interior normal.
        let cfg = small_cfg(4);
        let g = ChunkGenerator::new(&cfg);
        let palette = TexturePalette::from_config(&Palette::default());
        let out = g
            .build(ChunkCoord::new(0, 0), &Plane { slope_x: 0.5 }, &palette)
            .unwrap();
        let norm = |i: usize| &out.mesh.norm[i * 3..i * 3 + 3];
        let interior = norm(2 + 5 * 2).to_vec();
        for edge in [0usize, 4, 20, 24] {
            for (a, b) in norm(edge).iter().zip(&interior) {
                assert!((a - b).abs() < 1e-5, "edge {edge}");
            }
        }
        assert!(interior[0] < 0.0, "normal leans away from the rising side");
    }

    #[test]
    fn non_finite_height_fails_the_build() {
        let cfg = small_cfg(4);
        let g = ChunkGenerator::new(&cfg);
        let palette = TexturePalette::from_config(&Palette::default());
        let err = g.build(ChunkCoord::new(0, 0), &Hole, &palette).unwrap_err();
        assert!(matches!(err, GenerationError::NonFiniteHeight { .. }));
    }

    #[test]
    fn missing_band_texture_is_reported() {
        let cfg = small_cfg(2);
        let g = ChunkGenerator::new(&cfg);
        let err = g
            .build(ChunkCoord::new(0, 0), &Plane { slope_x: 0.0 }, &TexturePalette::default())
            .unwrap_err();
        assert!(matches!(err, GenerationError::MissingTexture(_)));
    }

    #[test]
    fn vegetation_only_inside_open_bands() {
        let mut cfg = small_cfg(40);
        cfg.vegetation.tree_stride = 4;
        cfg.vegetation.grass_stride = 2;
        let g = ChunkGenerator::new(&cfg);
        let palette = TexturePalette::from_config(&Palette::default());
        // Height rises from 0 to 0.4 across the chunk.
        let out = g
            .build(ChunkCoord::new(0, 0), &Plane { slope_x: 0.05 }, &palette)
            .unwrap();
        assert!(!out.vegetation.trees.is_empty());
        assert!(!out.vegetation.grass.is_empty());
        let [tlo, thi] = cfg.vegetation.tree_band;
        for t in &out.vegetation.trees {
            let h = f64::from(t.translation_part().y);
            assert!(h > tlo && h < thi, "tree at height {h}");
        }
        let [glo, ghi] = cfg.vegetation.grass_band;
        for t in &out.vegetation.grass {
            let h = f64::from(t.translation_part().y);
            assert!(h > glo - 1e-6 && h < ghi + 1e-6, "grass at height {h}");
        }
    }

    #[test]
    fn hash_is_stable() {
        assert_eq!(hash2(3, -7, 11), hash2(3, -7, 11));
        assert_ne!(hash2(3, -7, 11), hash2(-7, 3, 11));
        assert!((0.0..1.0).contains(&rand01(u32::MAX)));
    }
}
