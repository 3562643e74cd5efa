use fastnoise_lite::{FastNoiseLite, NoiseType};

use crate::config::Fractal;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FractalKind {
    /// Plain fractal Brownian motion over Perlin gradients.
    Fbm,
    /// Ridged multifractal: sharp crests where the base noise crosses zero.
    Ridged,
    /// Billow: absolute-valued octaves, rounded hills.
    Billow,
}

/// One Perlin basis evaluated at unit frequency; octaves are summed here so
/// every stage kind shares the same loop.
pub struct FractalSource {
    kind: FractalKind,
    base: FastNoiseLite,
    frequency: f64,
    octaves: u32,
    lacunarity: f64,
    persistence: f64,
}

impl FractalSource {
    pub fn new(kind: FractalKind, seed: i32, params: &Fractal) -> Self {
        let mut base = FastNoiseLite::with_seed(seed);
        base.set_noise_type(Some(NoiseType::Perlin));
        base.set_frequency(Some(1.0));
        Self {
            kind,
            base,
            frequency: f64::from(params.frequency),
            octaves: params.octaves.max(1) as u32,
            lacunarity: f64::from(params.lacunarity),
            persistence: f64::from(params.persistence),
        }
    }

    #[inline]
    fn basis(&self, x: f64, z: f64) -> f64 {
        f64::from(self.base.get_noise_2d(x as f32, z as f32))
    }

    /// Roughly in `[-1, 1]` for every kind.
    pub fn evaluate(&self, x: f64, z: f64) -> f64 {
        let mut freq = self.frequency;
        let mut amp = 1.0_f64;
        let mut max_amp = 0.0_f64;
        let mut sum = 0.0_f64;
        let mut weight = 1.0_f64;
        for octave in 0..self.octaves {
            // Offset each octave so lattice zeros do not line up.
            let shift = f64::from(octave) * 19.19;
            let n = self.basis(x * freq + shift, z * freq - shift);
            match self.kind {
                FractalKind::Fbm => sum += n * amp,
                FractalKind::Billow => sum += (2.0 * n.abs() - 1.0) * amp,
                FractalKind::Ridged => {
                    let mut signal = 1.0 - n.abs();
                    signal *= signal;
                    signal *= weight;
                    weight = (signal * 2.0).clamp(0.0, 1.0);
                    sum += signal * amp;
                }
            }
            max_amp += amp;
            amp *= self.persistence;
            freq *= self.lacunarity;
        }
        let v = if max_amp > 0.0 { sum / max_amp } else { sum };
        match self.kind {
            FractalKind::Ridged => v * 2.0 - 1.0,
            _ => v,
        }
    }
}
