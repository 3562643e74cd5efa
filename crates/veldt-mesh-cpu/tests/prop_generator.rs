use proptest::prelude::*;
use veldt_mesh_cpu::{ChunkGenerator, SurfaceBand, TexturePalette};
use veldt_world::config::Palette;
use veldt_world::{ChunkCoord, NoiseField, TerrainConfig};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    // Normals are unit length and never point below the horizon.
    #[test]
    fn normals_are_unit_and_upward(cx in -500i32..500, cz in -500i32..500, seed in any::<i32>()) {
        let mut cfg = TerrainConfig::default();
        cfg.chunk.points_per_side = 6;
        cfg.noise.seed = seed;
        let noise = NoiseField::standard(&cfg.noise).unwrap();
        let palette = TexturePalette::from_config(&Palette::default());
        let out = ChunkGenerator::new(&cfg)
            .build(ChunkCoord::new(cx, cz), &noise, &palette)
            .unwrap();
        for n in out.mesh.norm.chunks_exact(3) {
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            prop_assert!((len - 1.0).abs() < 1e-4);
            prop_assert!(n[1] > 0.0);
        }
        for a in out.mesh.tex.chunks_exact(2) {
            prop_assert!((0.0..=1.0).contains(&a[1]));
        }
    }

    // Every vertex's texture matches the band its raw height classifies into.
    #[test]
    fn vertex_texture_matches_band(cx in -50i32..50, cz in -50i32..50) {
        let mut cfg = TerrainConfig::default();
        cfg.chunk.points_per_side = 5;
        let noise = NoiseField::standard(&cfg.noise).unwrap();
        let palette = TexturePalette::from_config(&Palette::default());
        let out = ChunkGenerator::new(&cfg)
            .build(ChunkCoord::new(cx, cz), &noise, &palette)
            .unwrap();
        for (h, t) in out.height_map.iter().zip(out.mesh.tex.chunks_exact(2)) {
            let band = SurfaceBand::classify(f64::from(*h), &cfg.bands);
            let expect = palette.id(band.texture_name()).unwrap();
            // f32 storage can move a height across a band floor by one ulp.
            if (t[0] as u16) != expect.0 {
                let near_floor = [cfg.bands.snow, cfg.bands.rock, cfg.bands.grass, cfg.bands.sand, cfg.bands.shallow_water]
                    .iter()
                    .any(|f| (f - f64::from(*h)).abs() < 1e-6);
                prop_assert!(near_floor);
            }
        }
    }
}
