use crate::config::{ConfigError, Fractal, SelectBounds};

use super::fractal::{FractalKind, FractalSource};

/// Upper bound on stages in one graph; evaluation keeps all outputs on the stack.
pub const MAX_STAGES: usize = 16;

/// Index of a stage inside the graph that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StageId(usize);

impl StageId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

pub(crate) enum Stage {
    Source(FractalSource),
    ScaleBias {
        src: StageId,
        scale: f64,
        bias: f64,
    },
    Select {
        low: StageId,
        high: StageId,
        control: StageId,
        lower: f64,
        upper: f64,
        falloff: f64,
    },
}

/// Builder for an acyclic stage graph. A stage can only reference stages
/// pushed before it, so insertion order is a valid evaluation order.
#[derive(Default)]
pub struct NoiseGraph {
    stages: Vec<(String, Stage)>,
}

impl NoiseGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: &str, stage: Stage) -> StageId {
        self.stages.push((name.to_string(), stage));
        StageId(self.stages.len() - 1)
    }

    pub fn fractal(&mut self, name: &str, kind: FractalKind, seed: i32, params: &Fractal) -> StageId {
        self.push(name, Stage::Source(FractalSource::new(kind, seed, params)))
    }

    pub fn scale_bias(&mut self, name: &str, src: StageId, scale: f64, bias: f64) -> StageId {
        self.push(name, Stage::ScaleBias { src, scale, bias })
    }

    /// `high` where `control` lies in `[lower, upper]`, `low` elsewhere, with
    /// an s-curve transition `falloff` wide on both edges.
    pub fn select(
        &mut self,
        name: &str,
        low: StageId,
        high: StageId,
        control: StageId,
        bounds: &SelectBounds,
    ) -> StageId {
        // Two transitions cannot overlap.
        let half_span = (bounds.upper - bounds.lower) * 0.5;
        let falloff = bounds.falloff.clamp(0.0, half_span.max(0.0));
        self.push(
            name,
            Stage::Select {
                low,
                high,
                control,
                lower: bounds.lower,
                upper: bounds.upper,
                falloff,
            },
        )
    }

    /// Freeze the graph with `output` as the final stage, which must be a select.
    pub fn build(self, output: StageId) -> Result<CompiledGraph, ConfigError> {
        let invalid = |stage: &str, reason: String| ConfigError::InvalidNoise {
            stage: stage.to_string(),
            reason,
        };
        if self.stages.len() > MAX_STAGES {
            return Err(invalid(
                "graph",
                format!("{} stages exceed the limit of {MAX_STAGES}", self.stages.len()),
            ));
        }
        for (i, (name, stage)) in self.stages.iter().enumerate() {
            let inputs: &[StageId] = match stage {
                Stage::Source(_) => &[],
                Stage::ScaleBias { src, .. } => std::slice::from_ref(src),
                Stage::Select {
                    low, high, control, ..
                } => &[*low, *high, *control],
            };
            if let Some(bad) = inputs.iter().find(|id| id.0 >= i) {
                return Err(invalid(
                    name,
                    format!("input {} is not an earlier stage", bad.0),
                ));
            }
        }
        match self.stages.get(output.0) {
            Some((_, Stage::Select { .. })) => {}
            Some((name, _)) => {
                return Err(invalid(name, "output stage must be a select".to_string()));
            }
            None => {
                return Err(invalid("graph", format!("output {} is out of range", output.0)));
            }
        }
        Ok(CompiledGraph {
            stages: self.stages.into_iter().map(|(_, s)| s).collect(),
            output,
        })
    }
}

pub struct CompiledGraph {
    stages: Vec<Stage>,
    output: StageId,
}

impl CompiledGraph {
    /// Value of the output stage and the blend weight it gave its `high` input.
    pub fn evaluate(&self, x: f64, z: f64) -> (f64, f64) {
        let mut out = [0.0_f64; MAX_STAGES];
        let mut weight = [0.0_f64; MAX_STAGES];
        for (i, stage) in self.stages.iter().enumerate() {
            out[i] = match *stage {
                Stage::Source(ref src) => src.evaluate(x, z),
                Stage::ScaleBias { src, scale, bias } => out[src.0] * scale + bias,
                Stage::Select {
                    low,
                    high,
                    control,
                    lower,
                    upper,
                    falloff,
                } => {
                    let w = select_weight(out[control.0], lower, upper, falloff);
                    weight[i] = w;
                    lerp(out[low.0], out[high.0], w)
                }
            };
        }
        let o = self.output.0;
        (out[o], weight[o])
    }
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[inline]
fn scurve3(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

/// 0 selects the low input, 1 the high input.
pub(crate) fn select_weight(c: f64, lower: f64, upper: f64, falloff: f64) -> f64 {
    if falloff > 0.0 {
        if c < lower - falloff {
            0.0
        } else if c < lower + falloff {
            scurve3((c - (lower - falloff)) / (2.0 * falloff))
        } else if c < upper - falloff {
            1.0
        } else if c < upper + falloff {
            1.0 - scurve3((c - (upper - falloff)) / (2.0 * falloff))
        } else {
            0.0
        }
    } else if c < lower || c > upper {
        0.0
    } else {
        1.0
    }
}
