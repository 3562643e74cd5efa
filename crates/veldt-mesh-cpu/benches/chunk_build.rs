use criterion::{Criterion, black_box, criterion_group, criterion_main};
use std::time::Duration;

use veldt_mesh_cpu::{ChunkGenerator, TexturePalette};
use veldt_world::config::Palette;
use veldt_world::{ChunkCoord, NoiseField, TerrainConfig};

fn bench_chunk_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_build");
    for points in [32u32, 128] {
        let mut cfg = TerrainConfig::default();
        cfg.chunk.points_per_side = points;
        let noise = NoiseField::standard(&cfg.noise).unwrap();
        let palette = TexturePalette::from_config(&Palette::default());
        let g = ChunkGenerator::new(&cfg);
        group.bench_function(format!("standard_{points}"), |b| {
            b.iter(|| {
                let out = g.build(ChunkCoord::new(3, -4), &noise, &palette).unwrap();
                black_box(out);
            })
        });
    }
    group.finish();
}

fn bench_noise_sample(c: &mut Criterion) {
    let noise = NoiseField::standard(&TerrainConfig::default().noise).unwrap();
    c.bench_function("noise_evaluate_1k", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for i in 0..1000 {
                acc += noise.evaluate(f64::from(i) * 0.37, f64::from(i) * -0.11);
            }
            black_box(acc)
        })
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(5));
    targets = bench_chunk_build, bench_noise_sample
}
criterion_main!(benches);
