use std::path::Path;

use veldt_world::{ConfigError, QueueFullPolicy, TerrainConfig, load_config_from_path};

#[test]
fn shipped_terrain_toml_matches_defaults() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../terrain.toml");
    let cfg = load_config_from_path(&path).unwrap();
    let d = TerrainConfig::default();
    assert_eq!(cfg.streaming.view_radius, d.streaming.view_radius);
    assert_eq!(cfg.streaming.load_radius, d.streaming.load_radius);
    assert_eq!(cfg.streaming.queue_full_policy, QueueFullPolicy::Block);
    assert_eq!(cfg.chunk.points_per_side, d.chunk.points_per_side);
    assert_eq!(cfg.noise.seed, d.noise.seed);
    assert_eq!(cfg.noise.mountain.octaves, d.noise.mountain.octaves);
    assert_eq!(cfg.noise.river_bed.bias, d.noise.river_bed.bias);
    assert_eq!(cfg.vegetation.seed, d.vegetation.seed);
    assert_eq!(cfg.vegetation.wind_speed, d.vegetation.wind_speed);
    assert_eq!(cfg.palette.textures, d.palette.textures);
    assert_eq!(cfg.sky.segments, d.sky.segments);
    assert_eq!(cfg.sky.cycle_rate, d.sky.cycle_rate);
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_config_from_path(Path::new("/nonexistent/veldt.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}
