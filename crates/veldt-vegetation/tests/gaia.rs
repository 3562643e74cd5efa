use std::sync::Arc;

use veldt_chunk::{Chunk, ChunkStore};
use veldt_mesh_cpu::{ChunkGenerator, RecordedCall, RecordingBackend, TexturePalette};
use veldt_vegetation::{Gaia, TREE_RULES};
use veldt_world::config::Palette;
use veldt_world::{ChunkCoord, HeightSource, TerrainConfig};

/// Tree band on the west half of every chunk, grass band on the east half.
struct Meadow {
    world_size: f64,
}

impl HeightSource for Meadow {
    fn height(&self, x: f64, _z: f64) -> f64 {
        if x.rem_euclid(self.world_size) < self.world_size * 0.5 {
            0.05
        } else {
            0.25
        }
    }
}

fn config() -> TerrainConfig {
    let mut cfg = TerrainConfig::default();
    cfg.chunk.points_per_side = 16;
    cfg.chunk.world_size = 16.0;
    cfg.chunk.vertical_scale = 1.0;
    cfg.vegetation.tree_stride = 4;
    cfg.vegetation.grass_stride = 2;
    cfg
}

fn loaded_chunks(cfg: &TerrainConfig, coords: &[ChunkCoord]) -> (ChunkStore, Vec<Arc<Chunk>>) {
    let store = ChunkStore::new();
    let generator = ChunkGenerator::new(cfg);
    let palette = TexturePalette::from_config(&Palette::default());
    let field = Meadow {
        world_size: cfg.chunk.world_size,
    };
    let chunks = coords
        .iter()
        .map(|&c| {
            let chunk = store.get_or_create(c);
            assert!(chunk.try_begin_loading());
            let out = generator.build(c, &field, &palette).unwrap();
            assert!(chunk.publish(out));
            assert!(chunk.mark_loaded());
            chunk
        })
        .collect();
    (store, chunks)
}

fn gaia(cfg: &TerrainConfig) -> Gaia<u32> {
    Gaia::new(
        &cfg.vegetation,
        cfg.chunk.step() as f32,
        &TexturePalette::from_config(&Palette::default()),
    )
}

fn ring(radius: i32) -> Vec<ChunkCoord> {
    let mut out = Vec::new();
    for cz in -radius..=radius {
        for cx in -radius..=radius {
            out.push(ChunkCoord::new(cx, cz));
        }
    }
    out
}

#[test]
fn grass_only_near_viewer_and_trees_everywhere() {
    let cfg = config();
    let (_store, chunks) = loaded_chunks(&cfg, &ring(2));
    let mut g = gaia(&cfg);
    let viewer = ChunkCoord::new(0, 0);
    for c in &chunks {
        g.create_chunk_vegetation(c, viewer);
    }
    let per_chunk = chunks[0].data().unwrap().vegetation.clone();
    assert!(!per_chunk.trees.is_empty());
    assert!(!per_chunk.grass.is_empty());
    // 9 HQ chunks carry grass; all 25 carry trees.
    assert_eq!(g.grass_count(), 9 * per_chunk.grass.len());
    assert_eq!(g.hq_counts().iter().sum::<usize>(), 9 * per_chunk.trees.len());
    assert_eq!(g.lq_counts().iter().sum::<usize>(), 16 * per_chunk.trees.len());
    assert_eq!(g.archetype_count(), TREE_RULES.len());
}

#[test]
fn redraw_conserves_instance_count() {
    let cfg = config();
    let (_store, chunks) = loaded_chunks(&cfg, &ring(3));
    let mut g = gaia(&cfg);
    let start = ChunkCoord::new(0, 0);
    for c in &chunks {
        g.create_chunk_vegetation(c, start);
    }
    for viewer in [ChunkCoord::new(1, 0), ChunkCoord::new(3, -3), ChunkCoord::new(-9, 4)] {
        let placed = g.redraw_all_chunks(&chunks, viewer);
        // Near chunks carry trees and grass, far chunks trees only.
        let expect: usize = chunks
            .iter()
            .map(|c| {
                let candidates = &c.data().unwrap().vegetation;
                if c.coord().chebyshev(viewer) <= 1 {
                    candidates.trees.len() + candidates.grass.len()
                } else {
                    candidates.trees.len()
                }
            })
            .sum();
        assert!(expect > 0);
        assert_eq!(placed, expect);
        assert_eq!(g.total_instances(), expect);
    }
}

#[test]
fn redraw_replays_archetype_choice() {
    let cfg = config();
    let (_store, chunks) = loaded_chunks(&cfg, &ring(1));
    let mut g = gaia(&cfg);
    let viewer = ChunkCoord::new(0, 0);
    for c in &chunks {
        g.create_chunk_vegetation(c, viewer);
    }
    let before: Vec<Vec<usize>> = chunks.iter().map(|c| c.archetypes().unwrap().to_vec()).collect();
    let hq_before = g.hq_counts();
    g.redraw_all_chunks(&chunks, viewer);
    g.redraw_all_chunks(&chunks, ChunkCoord::new(5, 5));
    g.redraw_all_chunks(&chunks, viewer);
    let after: Vec<Vec<usize>> = chunks.iter().map(|c| c.archetypes().unwrap().to_vec()).collect();
    assert_eq!(before, after);
    assert_eq!(g.hq_counts(), hq_before);
}

#[test]
fn chunks_without_vegetation_are_skipped() {
    let cfg = config();
    let (_store, chunks) = loaded_chunks(&cfg, &ring(1));
    let mut g = gaia(&cfg);
    let viewer = ChunkCoord::new(0, 0);
    g.create_chunk_vegetation(&chunks[0], viewer);
    let placed = g.redraw_all_chunks(&chunks, viewer);
    assert_eq!(placed, Gaia::<u32>::placed_count(&chunks[0], viewer));
}

#[test]
fn only_changed_buckets_are_uploaded() {
    let cfg = config();
    let (_store, chunks) = loaded_chunks(&cfg, &ring(1));
    let mut g = gaia(&cfg);
    let mut backend = RecordingBackend::new();
    let viewer = ChunkCoord::new(0, 0);
    assert_eq!(g.upload_dirty(&mut backend).unwrap(), 0);

    for c in &chunks {
        g.create_chunk_vegetation(c, viewer);
    }
    let first = g.upload_dirty(&mut backend).unwrap();
    // Grass plus whichever HQ archetypes were rolled; no LQ bucket is touched.
    let used_hq = g.hq_counts().iter().filter(|&&n| n > 0).count();
    assert_eq!(first, used_hq + 1);
    assert_eq!(g.upload_dirty(&mut backend).unwrap(), 0);

    backend.clear_calls();
    g.draw(&mut backend, 0.0);
    assert!(backend.draws().count() >= 2 * used_hq + 1);
    for call in backend.draws() {
        if let RecordedCall::Draw { textures, .. } = call {
            assert_eq!(textures.len(), 1);
        }
    }
}

#[test]
fn wind_follows_cosine() {
    use std::f64::consts::PI;

    let cfg = config();
    let g = gaia(&cfg);
    let amp = cfg.vegetation.wind_amplitude_deg;
    assert_eq!(cfg.vegetation.wind_speed, 2.5);
    assert!((g.wind_angle(0.0) - amp).abs() < 1e-6);
    // A quarter period of cos(2.5 t) is pi / 5.
    assert!(g.wind_angle(PI / 5.0).abs() < 1e-5);
    assert!((g.wind_angle(2.0 * PI / 5.0) + amp).abs() < 1e-5);
    assert!((g.wind_angle(4.0 * PI / 5.0) - amp).abs() < 1e-5);
}

#[test]
fn wind_speed_is_configurable() {
    let mut cfg = config();
    cfg.vegetation.wind_speed = 1.0;
    let g = gaia(&cfg);
    assert!(g.wind_angle(std::f64::consts::FRAC_PI_2).abs() < 1e-5);
    cfg.vegetation.wind_speed = 0.0;
    let still = gaia(&cfg);
    assert_eq!(still.wind_angle(123.4), cfg.vegetation.wind_amplitude_deg);
}
