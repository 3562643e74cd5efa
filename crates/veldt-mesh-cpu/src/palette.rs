use veldt_world::config::{Bands, Palette};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u16);

/// Named textures, indexed in name order. Paths are only resolved by the renderer.
#[derive(Clone, Debug, Default)]
pub struct TexturePalette {
    entries: Vec<(String, String)>,
}

impl TexturePalette {
    pub fn from_config(cfg: &Palette) -> Self {
        Self {
            entries: cfg
                .textures
                .iter()
                .map(|(name, path)| (name.clone(), path.clone()))
                .collect(),
        }
    }

    pub fn id(&self, name: &str) -> Option<TextureId> {
        self.entries
            .iter()
            .position(|(n, _)| n == name)
            .map(|i| TextureId(i as u16))
    }

    pub fn name(&self, id: TextureId) -> Option<&str> {
        self.entries.get(usize::from(id.0)).map(|(n, _)| n.as_str())
    }

    pub fn path(&self, id: TextureId) -> Option<&str> {
        self.entries.get(usize::from(id.0)).map(|(_, p)| p.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextureId, &str, &str)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, (n, p))| (TextureId(i as u16), n.as_str(), p.as_str()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SurfaceBand {
    DeepWater,
    ShallowWater,
    Sand,
    Grass,
    Rock,
    Snow,
}

impl SurfaceBand {
    /// Highest first; classification takes the first band whose floor the height reaches.
    pub const DESCENDING: [SurfaceBand; 6] = [
        SurfaceBand::Snow,
        SurfaceBand::Rock,
        SurfaceBand::Grass,
        SurfaceBand::Sand,
        SurfaceBand::ShallowWater,
        SurfaceBand::DeepWater,
    ];

    pub fn texture_name(self) -> &'static str {
        match self {
            SurfaceBand::Snow => "snow",
            SurfaceBand::Rock => "rock",
            SurfaceBand::Grass => "grass",
            SurfaceBand::Sand => "sand",
            // River and lake beds show through shallow water.
            SurfaceBand::ShallowWater => "dirt",
            SurfaceBand::DeepWater => "water",
        }
    }

    pub fn tint(self) -> [u8; 3] {
        match self {
            SurfaceBand::Snow => [240, 244, 250],
            SurfaceBand::Rock => [120, 112, 104],
            SurfaceBand::Grass => [86, 140, 62],
            SurfaceBand::Sand => [212, 196, 146],
            SurfaceBand::ShallowWater => [70, 120, 150],
            SurfaceBand::DeepWater => [30, 60, 120],
        }
    }

    #[inline]
    pub fn is_water(self) -> bool {
        matches!(self, SurfaceBand::ShallowWater | SurfaceBand::DeepWater)
    }

    fn floor(self, bands: &Bands) -> f64 {
        match self {
            SurfaceBand::Snow => bands.snow,
            SurfaceBand::Rock => bands.rock,
            SurfaceBand::Grass => bands.grass,
            SurfaceBand::Sand => bands.sand,
            SurfaceBand::ShallowWater => bands.shallow_water,
            SurfaceBand::DeepWater => f64::NEG_INFINITY,
        }
    }

    pub fn classify(height: f64, bands: &Bands) -> SurfaceBand {
        Self::DESCENDING
            .into_iter()
            .find(|b| height >= b.floor(bands))
            .unwrap_or(SurfaceBand::DeepWater)
    }

    /// Blend factor in `[0, 1]`. Land bands ramp from 0 at their floor to 1
    /// one blend width above it; water bands take the river mask or the depth
    /// below the sand line, whichever is stronger.
    pub fn alpha(self, height: f64, river: f64, bands: &Bands) -> f32 {
        let a = if self.is_water() {
            let depth = bands.sand - height;
            let span = (bands.sand - bands.shallow_water).max(f64::EPSILON);
            (depth / span).clamp(0.0, 1.0).max(river.clamp(0.0, 1.0))
        } else if bands.blend > 0.0 {
            ((height - self.floor(bands)) / bands.blend).clamp(0.0, 1.0)
        } else {
            1.0
        };
        a as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_are_classified_in_descending_order() {
        let b = Bands::default();
        assert_eq!(SurfaceBand::classify(b.snow + 0.1, &b), SurfaceBand::Snow);
        assert_eq!(SurfaceBand::classify(b.snow, &b), SurfaceBand::Snow);
        assert_eq!(SurfaceBand::classify(b.rock, &b), SurfaceBand::Rock);
        assert_eq!(SurfaceBand::classify(b.grass + 1e-6, &b), SurfaceBand::Grass);
        assert_eq!(SurfaceBand::classify(b.sand, &b), SurfaceBand::Sand);
        assert_eq!(
            SurfaceBand::classify(b.shallow_water + 1e-6, &b),
            SurfaceBand::ShallowWater
        );
        assert_eq!(SurfaceBand::classify(-10.0, &b), SurfaceBand::DeepWater);
    }

    #[test]
    fn classification_is_monotonic_in_height() {
        let b = Bands::default();
        let mut prev = SurfaceBand::DeepWater;
        for i in -200..200 {
            let band = SurfaceBand::classify(f64::from(i) * 0.005, &b);
            assert!(band >= prev);
            prev = band;
        }
    }

    #[test]
    fn river_mask_lifts_water_alpha() {
        let b = Bands::default();
        let h = b.sand - 1e-3;
        let dry = SurfaceBand::ShallowWater.alpha(h, 0.0, &b);
        let wet = SurfaceBand::ShallowWater.alpha(h, 0.9, &b);
        assert!(wet > dry);
        assert!((wet - 0.9).abs() < 1e-6);
    }

    #[test]
    fn palette_ids_follow_name_order() {
        let p = TexturePalette::from_config(&Palette::default());
        let ids: Vec<_> = p.iter().map(|(id, _, _)| id).collect();
        assert_eq!(ids.len(), p.len());
        let grass = p.id("grass").unwrap();
        assert_eq!(p.name(grass), Some("grass"));
        assert_eq!(p.path(grass), Some("assets/textures/grass.png"));
        for band in SurfaceBand::DESCENDING {
            assert!(p.id(band.texture_name()).is_some(), "{band:?}");
        }
        assert!(p.id("lava").is_none());
    }
}
