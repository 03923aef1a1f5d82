//! Double-gamma hemodynamic response function.
//!
//! The kernel models the BOLD response to a unit neural impulse:
//!
//! ```text
//! h(t) = (t/d1)^a1 · exp((d1 − t)/b1) − c · (t/d2)^a2 · exp((d2 − t)/b2)
//! d1 = a1·b1,  d2 = a2·b2
//! ```
//!
//! sampled at `t = 0, TR, 2·TR, ...` while `t < width`.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::types::Prng;

/// Shape and sampling parameters of a double-gamma HRF.
///
/// Missing fields deserialize to their canonical values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HrfParams {
    /// Kernel support in seconds.
    pub width: f64,
    /// Sampling interval in seconds.
    pub tr: f64,
    /// Shape of the response gamma.
    pub a1: f64,
    /// Shape of the undershoot gamma.
    pub a2: f64,
    /// Scale of the response gamma.
    pub b1: f64,
    /// Scale of the undershoot gamma.
    pub b2: f64,
    /// Undershoot ratio.
    pub c: f64,
}

impl HrfParams {
    /// Canonical parameters: width 32 s, TR 1 s, a1 6, a2 12, b1 = b2 = 0.9, c 0.35.
    pub const fn canonical() -> Self {
        Self {
            width: 32.0,
            tr: 1.0,
            a1: 6.0,
            a2: 12.0,
            b1: 0.9,
            b2: 0.9,
            c: 0.35,
        }
    }

    /// Same shape, different sampling.
    pub fn with_sampling(self, width: f64, tr: f64) -> Self {
        Self { width, tr, ..self }
    }

    fn get(&self, which: HrfParam) -> f64 {
        match which {
            HrfParam::A1 => self.a1,
            HrfParam::A2 => self.a2,
            HrfParam::B1 => self.b1,
            HrfParam::B2 => self.b2,
            HrfParam::C => self.c,
        }
    }

    fn set(&mut self, which: HrfParam, value: f64) {
        match which {
            HrfParam::A1 => self.a1 = value,
            HrfParam::A2 => self.a2 = value,
            HrfParam::B1 => self.b1 = value,
            HrfParam::B2 => self.b2 = value,
            HrfParam::C => self.c = value,
        }
    }

    /// Evaluate the response at time `t` (seconds).
    pub fn evaluate(&self, t: f64) -> f64 {
        let d1 = self.a1 * self.b1;
        let d2 = self.a2 * self.b2;
        (t / d1).powf(self.a1) * ((d1 - t) / self.b1).exp()
            - self.c * (t / d2).powf(self.a2) * ((d2 - t) / self.b2).exp()
    }
}

impl Default for HrfParams {
    fn default() -> Self {
        Self::canonical()
    }
}

/// Shape parameter eligible for perturbation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HrfParam {
    /// Response shape.
    A1,
    /// Undershoot shape.
    A2,
    /// Response scale.
    B1,
    /// Undershoot scale.
    B2,
    /// Undershoot ratio.
    C,
}

impl HrfParam {
    /// All perturbable parameters, in a fixed order.
    pub const ALL: [HrfParam; 5] = [
        HrfParam::A1,
        HrfParam::A2,
        HrfParam::B1,
        HrfParam::B2,
        HrfParam::C,
    ];
}

/// A sampled HRF together with the parameters that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrfKernel {
    params: HrfParams,
    values: Vec<f64>,
}

impl HrfKernel {
    /// Parameters the kernel was built from.
    pub fn params(&self) -> &HrfParams {
        &self.params
    }

    /// Kernel samples.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the kernel has no samples.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Build a double-gamma kernel from explicit parameters.
pub fn double_gamma(width: f64, tr: f64, a1: f64, a2: f64, b1: f64, b2: f64, c: f64) -> Result<HrfKernel> {
    HrfParams {
        width,
        tr,
        a1,
        a2,
        b1,
        b2,
        c,
    }
    .try_into()
}

impl TryFrom<HrfParams> for HrfKernel {
    type Error = SimError;

    fn try_from(params: HrfParams) -> Result<Self> {
        if !(params.width.is_finite() && params.width > 0.0) {
            return Err(SimError::invalid("width", format!("must be positive, got {}", params.width)));
        }
        if !(params.tr.is_finite() && params.tr > 0.0) {
            return Err(SimError::invalid("tr", format!("must be positive, got {}", params.tr)));
        }

        let n = (params.width / params.tr).ceil() as usize;
        let values = (0..n)
            .map(|i| i as f64 * params.tr)
            .filter(|&t| t < params.width)
            .map(|t| params.evaluate(t))
            .collect();

        Ok(HrfKernel { params, values })
    }
}

/// Outcome of [`perturb`].
#[derive(Debug, Clone)]
pub struct PerturbedHrf {
    /// Kernel built from the perturbed parameters.
    pub kernel: HrfKernel,
    /// Full parameter set used, for provenance.
    pub params: HrfParams,
    /// Which parameter was redrawn.
    pub perturbed: HrfParam,
}

/// Redraw one randomly chosen shape parameter.
///
/// The chosen parameter is replaced with a draw from
/// `Normal(value, value / fraction)`. Draws are not clamped, so a parameter
/// can become non-physical (e.g. negative).
pub fn perturb(base: HrfParams, fraction: f64, mut prng: Prng) -> Result<(PerturbedHrf, Prng)> {
    if !(fraction.is_finite() && fraction > 0.0) {
        return Err(SimError::invalid("fraction", format!("must be positive, got {fraction}")));
    }

    let which = HrfParam::ALL[prng.random_range(0..HrfParam::ALL.len())];
    let loc = base.get(which);
    let normal = Normal::new(loc, (loc / fraction).abs())
        .map_err(|e| SimError::invalid("fraction", e.to_string()))?;

    let mut params = base;
    params.set(which, normal.sample(&mut prng));
    let kernel = HrfKernel::try_from(params)?;

    Ok((
        PerturbedHrf {
            kernel,
            params,
            perturbed: which,
        },
        prng,
    ))
}
