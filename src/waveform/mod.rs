//! Waveform sample generation.
//!
//! A [`WaveformSpec`] describes one of eight function families sampled over
//! `[start, end]`. Sample positions are computed as `start + i * step` rather
//! than by accumulation, so long runs do not drift and `end` is included
//! whenever it lies on the grid within [`END_EPSILON`] steps.

use std::f64::consts::TAU;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Tolerance, in steps, for including `end` in the sample grid.
pub const END_EPSILON: f64 = 1e-9;

/// Largest sample grid a spec may describe.
pub const MAX_SAMPLES: usize = 1_000_000;

/// `|cos θ|` below which the tangent is treated as singular.
const TAN_SINGULARITY: f64 = 1e-10;

/// Function family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaveformKind {
    /// `A·sin(2πfx)`
    Sine,
    /// `A·cos(2πfx)`
    Cosine,
    /// `A·tan(2πfx)`, clamped to `±A` at singularities.
    Tangent,
    /// `±A` following the sign of `sin(2πfx)`.
    Square,
    /// Symmetric triangle with period `1/f`.
    Triangle,
    /// Centered ramp with period `1/f`.
    Sawtooth,
    /// `A·e^(fx)`
    Exp,
    /// `A·ln(fx)`, `-10A` where undefined.
    Log,
}

impl WaveformKind {
    /// All kinds, in menu order.
    pub const ALL: [Self; 8] = [
        Self::Sine,
        Self::Cosine,
        Self::Tangent,
        Self::Square,
        Self::Triangle,
        Self::Sawtooth,
        Self::Exp,
        Self::Log,
    ];

    /// Short name used in settings and on the command line.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sine => "sin",
            Self::Cosine => "cos",
            Self::Tangent => "tan",
            Self::Square => "square",
            Self::Triangle => "triangle",
            Self::Sawtooth => "sawtooth",
            Self::Exp => "exp",
            Self::Log => "log",
        }
    }

    /// Evaluates the function at `x`.
    ///
    /// May return a non-finite value (e.g. `exp` overflow); callers skip those.
    #[must_use]
    pub fn evaluate(&self, x: f64, amplitude: f64, frequency: f64) -> f64 {
        let theta = TAU * frequency * x;
        match self {
            Self::Sine => amplitude * theta.sin(),
            Self::Cosine => amplitude * theta.cos(),
            Self::Tangent => {
                if theta.cos().abs() > TAN_SINGULARITY {
                    amplitude * theta.tan()
                } else if theta.sin() > 0.0 {
                    amplitude
                } else {
                    -amplitude
                }
            }
            Self::Square => {
                if theta.sin() > 0.0 {
                    amplitude
                } else {
                    -amplitude
                }
            }
            Self::Triangle => {
                let cycles = x * frequency;
                let phase = cycles - cycles.floor();
                if phase < 0.25 {
                    4.0 * amplitude * phase
                } else if phase < 0.75 {
                    2.0 * amplitude - 4.0 * amplitude * phase
                } else {
                    4.0 * amplitude * phase - 4.0 * amplitude
                }
            }
            Self::Sawtooth => {
                let cycles = x * frequency;
                2.0 * amplitude * (cycles - (cycles + 0.5).floor())
            }
            Self::Exp => amplitude * (frequency * x).exp(),
            Self::Log => {
                let arg = frequency * x;
                if arg > 0.0 {
                    amplitude * arg.ln()
                } else {
                    -10.0 * amplitude
                }
            }
        }
    }
}

impl fmt::Display for WaveformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WaveformKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown waveform {s:?}"))
    }
}

/// One generated point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Position.
    pub x: f64,
    /// Function value.
    pub y: f64,
}

/// Parameters of a sampled function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveformSpec {
    /// Function family.
    pub kind: WaveformKind,
    /// First sample position.
    pub start: f64,
    /// Last sample position (inclusive when on the grid).
    pub end: f64,
    /// Distance between samples, strictly positive.
    pub step: f64,
    /// Output scale.
    pub amplitude: f64,
    /// Cycles per unit of `x`.
    pub frequency: f64,
}

impl WaveformSpec {
    /// Creates a spec over `[0, 10]` with step 0.1, amplitude 1 and frequency 1.
    #[must_use]
    pub const fn new(kind: WaveformKind) -> Self {
        Self {
            kind,
            start: 0.0,
            end: 10.0,
            step: 0.1,
            amplitude: 1.0,
            frequency: 1.0,
        }
    }

    /// Sets the sampled range.
    #[must_use]
    pub const fn range(mut self, start: f64, end: f64) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Sets the step.
    #[must_use]
    pub const fn step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Sets the amplitude.
    #[must_use]
    pub const fn amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Sets the frequency.
    #[must_use]
    pub const fn frequency(mut self, frequency: f64) -> Self {
        self.frequency = frequency;
        self
    }

    /// Checks `step > 0`, `start < end` and that the grid has at most
    /// [`MAX_SAMPLES`] positions. NaN fails the first two.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.step.is_nan() || self.step <= 0.0 {
            return Err(ValidationError::BadStep(self.step));
        }
        if self.start.is_nan() || self.end.is_nan() || self.start >= self.end {
            return Err(ValidationError::BadRange {
                start: self.start,
                end: self.end,
            });
        }
        self.grid_len().map(|_| ())
    }

    /// Number of grid positions in `[start, end]`.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn grid_len(&self) -> Result<usize, ValidationError> {
        let steps = ((self.end - self.start) / self.step + END_EPSILON).floor();
        // Checked in f64 so the cast below cannot saturate.
        if steps.is_nan() || steps > (MAX_SAMPLES - 1) as f64 {
            return Err(ValidationError::TooManySamples {
                count: steps + 1.0,
                max: MAX_SAMPLES,
            });
        }
        Ok(steps as usize + 1)
    }
}

/// Generates the samples described by `spec`.
///
/// Points whose value is not finite are skipped. An empty result is valid
/// and distinct from a validation error.
#[allow(clippy::cast_precision_loss)]
pub fn generate(spec: &WaveformSpec) -> Result<Vec<Sample>, ValidationError> {
    spec.validate()?;

    let count = spec.grid_len()?;
    let mut samples = Vec::with_capacity(count);
    for i in 0..count {
        let x = (i as f64).mul_add(spec.step, spec.start);
        let y = spec.kind.evaluate(x, spec.amplitude, spec.frequency);
        if y.is_finite() {
            samples.push(Sample { x, y });
        } else {
            tracing::trace!("skipping non-finite {} sample at x={}", spec.kind, x);
        }
    }

    tracing::debug!(
        "generated {} of {} {} samples",
        samples.len(),
        count,
        spec.kind
    );
    Ok(samples)
}
