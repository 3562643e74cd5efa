use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use thiserror::Error;

/// Vertices one chunk mesh may hold; GPU backends index chunk meshes with `u16`.
pub const MAX_CHUNK_VERTICES: usize = u16::MAX as usize + 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("chunk.points_per_side must be at least 1")]
    ZeroPointsPerSide,
    #[error("chunk.points_per_side {points} gives {vertices} vertices per chunk; at most {max} fit")]
    GridTooLarge { points: u32, vertices: u64, max: usize },
    #[error("chunk.world_size must be positive and finite, got {0}")]
    BadWorldSize(f64),
    #[error("chunk.vertical_scale must be finite, got {0}")]
    BadVerticalScale(f32),
    #[error("streaming.worker_count must be at least 1")]
    ZeroWorkers,
    #[error("streaming.queue_capacity must be at least 1")]
    ZeroQueueCapacity,
    #[error("streaming.{name} must not be negative, got {value}")]
    NegativeRadius { name: &'static str, value: i32 },
    #[error("streaming.load_radius ({load}) must be >= view_radius ({view})")]
    LoadRadiusBelowView { view: i32, load: i32 },
    #[error("noise stage `{stage}`: {reason}")]
    InvalidNoise { stage: String, reason: String },
    #[error("band `{name}` is empty or inverted: ({lo}, {hi})")]
    InvalidBand { name: &'static str, lo: f64, hi: f64 },
    #[error("vegetation.{0} must be at least 1")]
    ZeroStride(&'static str),
    #[error("vegetation wind amplitude {amplitude} and speed {speed} must be finite")]
    BadWind { amplitude: f32, speed: f32 },
    #[error("sky: {0}")]
    InvalidSky(String),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TerrainConfig {
    #[serde(default)]
    pub streaming: Streaming,
    #[serde(default)]
    pub chunk: ChunkShape,
    #[serde(default)]
    pub noise: NoiseConfig,
    #[serde(default)]
    pub bands: Bands,
    #[serde(default)]
    pub vegetation: Vegetation,
    #[serde(default)]
    pub palette: Palette,
    #[serde(default)]
    pub sky: Sky,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QueueFullPolicy {
    /// Producer waits for a free slot.
    #[default]
    Block,
    /// Chunk goes back to `Unrequested` and is offered again on the next recompute.
    Defer,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Streaming {
    #[serde(default = "default_view_radius")]
    pub view_radius: i32,
    #[serde(default = "default_load_radius")]
    pub load_radius: i32,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub queue_full_policy: QueueFullPolicy,
}
fn default_view_radius() -> i32 {
    4
}
fn default_load_radius() -> i32 {
    6
}
fn default_worker_count() -> usize {
    6
}
fn default_queue_capacity() -> usize {
    1024
}
impl Default for Streaming {
    fn default() -> Self {
        Self {
            view_radius: default_view_radius(),
            load_radius: default_load_radius(),
            worker_count: default_worker_count(),
            queue_capacity: default_queue_capacity(),
            queue_full_policy: QueueFullPolicy::Block,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChunkShape {
    #[serde(default = "default_world_size")]
    pub world_size: f64,
    #[serde(default = "default_points_per_side")]
    pub points_per_side: u32,
    #[serde(default = "default_vertical_scale")]
    pub vertical_scale: f32,
    #[serde(default = "default_texture_repeat")]
    pub texture_repeat: f32,
}
fn default_world_size() -> f64 {
    32.0
}
fn default_points_per_side() -> u32 {
    128
}
fn default_vertical_scale() -> f32 {
    12.0
}
fn default_texture_repeat() -> f32 {
    8.0
}
impl Default for ChunkShape {
    fn default() -> Self {
        Self {
            world_size: default_world_size(),
            points_per_side: default_points_per_side(),
            vertical_scale: default_vertical_scale(),
            texture_repeat: default_texture_repeat(),
        }
    }
}

impl ChunkShape {
    /// World distance between two adjacent height samples.
    #[inline]
    pub fn step(&self) -> f64 {
        self.world_size / f64::from(self.points_per_side)
    }
}

/// One fractal noise stage plus the scale/bias applied to its output.
#[derive(Clone, Debug, Deserialize)]
pub struct Fractal {
    #[serde(default = "d_freq")]
    pub frequency: f32,
    #[serde(default = "d_oct")]
    pub octaves: i32,
    #[serde(default = "d_lac")]
    pub lacunarity: f32,
    #[serde(default = "d_pers")]
    pub persistence: f32,
    #[serde(default = "d_scale")]
    pub scale: f64,
    #[serde(default)]
    pub bias: f64,
}
fn d_freq() -> f32 {
    0.02
}
fn d_oct() -> i32 {
    4
}
fn d_lac() -> f32 {
    2.0
}
fn d_pers() -> f32 {
    0.5
}
fn d_scale() -> f64 {
    1.0
}
impl Default for Fractal {
    fn default() -> Self {
        Self {
            frequency: d_freq(),
            octaves: d_oct(),
            lacunarity: d_lac(),
            persistence: d_pers(),
            scale: d_scale(),
            bias: 0.0,
        }
    }
}

/// Bounds for a select stage: control values inside `[lower, upper]` pick the
/// high input, with an s-curve blend `falloff` wide on each edge.
#[derive(Clone, Debug, Deserialize)]
pub struct SelectBounds {
    pub lower: f64,
    pub upper: f64,
    #[serde(default)]
    pub falloff: f64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NoiseConfig {
    #[serde(default = "default_seed")]
    pub seed: i32,
    #[serde(default = "default_mountain")]
    pub mountain: Fractal,
    #[serde(default = "default_plain")]
    pub plain: Fractal,
    #[serde(default = "default_terrain_type")]
    pub terrain_type: Fractal,
    #[serde(default = "default_river")]
    pub river: Fractal,
    #[serde(default = "default_river_bed")]
    pub river_bed: Fractal,
    #[serde(default = "default_blend")]
    pub blend: SelectBounds,
    #[serde(default = "default_river_select")]
    pub river_select: SelectBounds,
}
fn default_seed() -> i32 {
    1337
}
fn default_mountain() -> Fractal {
    Fractal {
        frequency: 0.012,
        octaves: 6,
        lacunarity: 2.1,
        persistence: 0.5,
        scale: 0.45,
        bias: 0.25,
    }
}
fn default_plain() -> Fractal {
    Fractal {
        frequency: 0.02,
        octaves: 4,
        lacunarity: 2.0,
        persistence: 0.5,
        scale: 0.125,
        bias: 0.12,
    }
}
fn default_terrain_type() -> Fractal {
    Fractal {
        frequency: 0.004,
        octaves: 3,
        lacunarity: 2.0,
        persistence: 0.5,
        scale: 1.0,
        bias: 0.0,
    }
}
fn default_river() -> Fractal {
    Fractal {
        frequency: 0.005,
        octaves: 1,
        lacunarity: 2.0,
        persistence: 0.5,
        scale: 1.0,
        bias: 0.0,
    }
}
fn default_river_bed() -> Fractal {
    Fractal {
        frequency: 0.03,
        octaves: 2,
        lacunarity: 2.0,
        persistence: 0.5,
        scale: 0.04,
        bias: -0.12,
    }
}
fn default_blend() -> SelectBounds {
    SelectBounds {
        lower: 0.0,
        upper: 1000.0,
        falloff: 0.125,
    }
}
fn default_river_select() -> SelectBounds {
    SelectBounds {
        lower: 0.82,
        upper: 1000.0,
        falloff: 0.06,
    }
}
impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            mountain: default_mountain(),
            plain: default_plain(),
            terrain_type: default_terrain_type(),
            river: default_river(),
            river_bed: default_river_bed(),
            blend: default_blend(),
            river_select: default_river_select(),
        }
    }
}

/// Lower height bound of each surface band, in raw noise units.
/// Anything below `shallow_water` is deep water.
#[derive(Clone, Debug, Deserialize)]
pub struct Bands {
    #[serde(default = "d_snow")]
    pub snow: f64,
    #[serde(default = "d_rock")]
    pub rock: f64,
    #[serde(default = "d_grass")]
    pub grass: f64,
    #[serde(default = "d_sand")]
    pub sand: f64,
    #[serde(default = "d_shallow")]
    pub shallow_water: f64,
    #[serde(default = "d_blend")]
    pub blend: f64,
}
fn d_snow() -> f64 {
    0.55
}
fn d_rock() -> f64 {
    0.38
}
fn d_grass() -> f64 {
    0.06
}
fn d_sand() -> f64 {
    0.0
}
fn d_shallow() -> f64 {
    -0.08
}
fn d_blend() -> f64 {
    0.03
}
impl Default for Bands {
    fn default() -> Self {
        Self {
            snow: d_snow(),
            rock: d_rock(),
            grass: d_grass(),
            sand: d_sand(),
            shallow_water: d_shallow(),
            blend: d_blend(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Vegetation {
    #[serde(default = "d_tree_band")]
    pub tree_band: [f64; 2],
    #[serde(default = "d_grass_band")]
    pub grass_band: [f64; 2],
    #[serde(default = "d_tree_stride")]
    pub tree_stride: u32,
    #[serde(default = "d_grass_stride")]
    pub grass_stride: u32,
    #[serde(default = "d_veg_seed")]
    pub seed: u64,
    #[serde(default = "d_wind")]
    pub wind_amplitude_deg: f32,
    /// Angular speed of the sway in radians per second.
    #[serde(default = "d_wind_speed")]
    pub wind_speed: f32,
}
fn d_tree_band() -> [f64; 2] {
    [0.0, 0.10]
}
fn d_grass_band() -> [f64; 2] {
    [0.20, 0.30]
}
fn d_tree_stride() -> u32 {
    10
}
fn d_grass_stride() -> u32 {
    2
}
fn d_veg_seed() -> u64 {
    0x5EED_7AEE
}
fn d_wind() -> f32 {
    5.0
}
fn d_wind_speed() -> f32 {
    2.5
}
impl Default for Vegetation {
    fn default() -> Self {
        Self {
            tree_band: d_tree_band(),
            grass_band: d_grass_band(),
            tree_stride: d_tree_stride(),
            grass_stride: d_grass_stride(),
            seed: d_veg_seed(),
            wind_amplitude_deg: d_wind(),
            wind_speed: d_wind_speed(),
        }
    }
}

/// Sky dome around the viewer and the sun's day cycle.
#[derive(Clone, Debug, Deserialize)]
pub struct Sky {
    #[serde(default = "d_sky_enabled")]
    pub enabled: bool,
    /// Horizontal dome radius; the dome is a quarter as tall.
    #[serde(default = "d_sky_radius")]
    pub radius: f32,
    /// Patches around the horizon and from horizon to zenith.
    #[serde(default = "d_sky_segments")]
    pub segments: u32,
    /// Angular speed of the day cycle in radians per second.
    #[serde(default = "d_sky_cycle")]
    pub cycle_rate: f32,
}
fn d_sky_enabled() -> bool {
    true
}
fn d_sky_radius() -> f32 {
    500.0
}
fn d_sky_segments() -> u32 {
    100
}
fn d_sky_cycle() -> f32 {
    0.2
}
impl Default for Sky {
    fn default() -> Self {
        Self {
            enabled: d_sky_enabled(),
            radius: d_sky_radius(),
            segments: d_sky_segments(),
            cycle_rate: d_sky_cycle(),
        }
    }
}

/// Texture name -> image path. Image loading itself happens in the renderer.
#[derive(Clone, Debug, Deserialize)]
pub struct Palette {
    #[serde(default = "default_textures")]
    pub textures: BTreeMap<String, String>,
}
fn default_textures() -> BTreeMap<String, String> {
    ["snow", "rock", "grass", "sand", "dirt", "water", "branches", "leaves"]
        .iter()
        .map(|n| (n.to_string(), format!("assets/textures/{n}.png")))
        .collect()
}
impl Default for Palette {
    fn default() -> Self {
        Self {
            textures: default_textures(),
        }
    }
}

impl TerrainConfig {
    /// Reject settings that would produce degenerate grids or an unusable
    /// stream before any worker starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.chunk;
        if c.points_per_side == 0 {
            return Err(ConfigError::ZeroPointsPerSide);
        }
        let side = u64::from(c.points_per_side) + 1;
        if side * side > MAX_CHUNK_VERTICES as u64 {
            return Err(ConfigError::GridTooLarge {
                points: c.points_per_side,
                vertices: side * side,
                max: MAX_CHUNK_VERTICES,
            });
        }
        if !(c.world_size.is_finite() && c.world_size > 0.0) {
            return Err(ConfigError::BadWorldSize(c.world_size));
        }
        if !c.vertical_scale.is_finite() {
            return Err(ConfigError::BadVerticalScale(c.vertical_scale));
        }

        let s = &self.streaming;
        if s.worker_count == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if s.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if s.view_radius < 0 {
            return Err(ConfigError::NegativeRadius {
                name: "view_radius",
                value: s.view_radius,
            });
        }
        if s.load_radius < 0 {
            return Err(ConfigError::NegativeRadius {
                name: "load_radius",
                value: s.load_radius,
            });
        }
        if s.load_radius < s.view_radius {
            return Err(ConfigError::LoadRadiusBelowView {
                view: s.view_radius,
                load: s.load_radius,
            });
        }

        let n = &self.noise;
        for (name, f) in [
            ("mountain", &n.mountain),
            ("plain", &n.plain),
            ("terrain_type", &n.terrain_type),
            ("river", &n.river),
            ("river_bed", &n.river_bed),
        ] {
            validate_fractal(name, f)?;
        }
        for (name, b) in [("blend", &n.blend), ("river_select", &n.river_select)] {
            if !(b.lower <= b.upper) || b.falloff < 0.0 {
                return Err(ConfigError::InvalidNoise {
                    stage: name.to_string(),
                    reason: format!(
                        "select bounds [{}, {}] falloff {} are inverted or negative",
                        b.lower, b.upper, b.falloff
                    ),
                });
            }
        }

        let v = &self.vegetation;
        for (name, band) in [("tree_band", v.tree_band), ("grass_band", v.grass_band)] {
            if !(band[0] < band[1]) {
                return Err(ConfigError::InvalidBand {
                    name,
                    lo: band[0],
                    hi: band[1],
                });
            }
        }
        if !(v.wind_amplitude_deg.is_finite() && v.wind_speed.is_finite()) {
            return Err(ConfigError::BadWind {
                amplitude: v.wind_amplitude_deg,
                speed: v.wind_speed,
            });
        }
        if v.tree_stride == 0 {
            return Err(ConfigError::ZeroStride("tree_stride"));
        }
        if v.grass_stride == 0 {
            return Err(ConfigError::ZeroStride("grass_stride"));
        }

        let sky = &self.sky;
        if !(sky.radius.is_finite() && sky.radius > 0.0) {
            return Err(ConfigError::InvalidSky(format!(
                "radius must be positive, got {}",
                sky.radius
            )));
        }
        if !sky.cycle_rate.is_finite() {
            return Err(ConfigError::InvalidSky(format!(
                "cycle_rate must be finite, got {}",
                sky.cycle_rate
            )));
        }
        let ring = u64::from(sky.segments) + 1;
        if sky.segments < 3 || ring * ring > MAX_CHUNK_VERTICES as u64 {
            return Err(ConfigError::InvalidSky(format!(
                "segments must be in 3..=255, got {}",
                sky.segments
            )));
        }

        let b = &self.bands;
        let ordered = [b.shallow_water, b.sand, b.grass, b.rock, b.snow];
        if ordered.windows(2).any(|w| !(w[0] <= w[1])) {
            return Err(ConfigError::InvalidBand {
                name: "bands",
                lo: b.shallow_water,
                hi: b.snow,
            });
        }
        Ok(())
    }
}

fn validate_fractal(stage: &str, f: &Fractal) -> Result<(), ConfigError> {
    let reason = if !(f.frequency.is_finite() && f.frequency > 0.0) {
        Some(format!("frequency must be positive, got {}", f.frequency))
    } else if !(1..=16).contains(&f.octaves) {
        Some(format!("octaves must be in 1..=16, got {}", f.octaves))
    } else if !(f.lacunarity.is_finite() && f.lacunarity > 0.0) {
        Some(format!("lacunarity must be positive, got {}", f.lacunarity))
    } else if !(f.persistence.is_finite() && f.persistence > 0.0) {
        Some(format!("persistence must be positive, got {}", f.persistence))
    } else if !(f.scale.is_finite() && f.bias.is_finite()) {
        Some("scale and bias must be finite".to_string())
    } else {
        None
    };
    match reason {
        Some(reason) => Err(ConfigError::InvalidNoise {
            stage: stage.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

pub fn load_config_from_path(path: &Path) -> Result<TerrainConfig, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: TerrainConfig = toml::from_str(&s)?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        TerrainConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: TerrainConfig = toml::from_str(
            r#"
            [streaming]
            view_radius = 2
            load_radius = 3
            queue_full_policy = "defer"

            [noise.mountain]
            octaves = 3
            "#,
        )
        .unwrap();
        assert_eq!(cfg.streaming.view_radius, 2);
        assert_eq!(cfg.streaming.worker_count, 6);
        assert_eq!(cfg.streaming.queue_full_policy, QueueFullPolicy::Defer);
        assert_eq!(cfg.noise.mountain.octaves, 3);
        assert_eq!(cfg.noise.mountain.frequency, d_freq());
        assert_eq!(cfg.chunk.points_per_side, 128);
        cfg.validate().unwrap();
    }

    #[test]
    fn degenerate_grid_is_rejected() {
        let mut cfg = TerrainConfig::default();
        cfg.chunk.points_per_side = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::ZeroPointsPerSide)));
    }

    #[test]
    fn grid_must_fit_sixteen_bit_indices() {
        let mut cfg = TerrainConfig::default();
        cfg.chunk.points_per_side = 255;
        cfg.validate().unwrap();
        cfg.chunk.points_per_side = 256;
        match cfg.validate() {
            Err(ConfigError::GridTooLarge { points, vertices, max }) => {
                assert_eq!((points, vertices, max), (256, 257 * 257, MAX_CHUNK_VERTICES));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn sky_dome_must_be_drawable() {
        let mut cfg = TerrainConfig::default();
        cfg.sky.segments = 2;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidSky(_))));
        cfg.sky.segments = 255;
        cfg.validate().unwrap();
        cfg.sky.segments = 256;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidSky(_))));
        let mut cfg = TerrainConfig::default();
        cfg.sky.radius = 0.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidSky(_))));
    }

    #[test]
    fn load_radius_must_cover_view_radius() {
        let mut cfg = TerrainConfig::default();
        cfg.streaming.view_radius = 5;
        cfg.streaming.load_radius = 3;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::LoadRadiusBelowView { view: 5, load: 3 })
        ));
    }

    #[test]
    fn zero_workers_and_zero_queue_are_rejected() {
        let mut cfg = TerrainConfig::default();
        cfg.streaming.worker_count = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::ZeroWorkers)));
        let mut cfg = TerrainConfig::default();
        cfg.streaming.queue_capacity = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::ZeroQueueCapacity)));
    }

    #[test]
    fn bad_noise_parameters_name_the_stage() {
        let mut cfg = TerrainConfig::default();
        cfg.noise.plain.frequency = 0.0;
        match cfg.validate() {
            Err(ConfigError::InvalidNoise { stage, .. }) => assert_eq!(stage, "plain"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn inverted_vegetation_band_is_rejected() {
        let mut cfg = TerrainConfig::default();
        cfg.vegetation.grass_band = [0.3, 0.2];
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidBand { name: "grass_band", .. })
        ));
    }
}
