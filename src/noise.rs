//! Noise models for synthetic BOLD signals.
//!
//! Every generator consumes the PRNG by value and returns it advanced, so
//! sequential calls compose deterministically:
//!
//! ```ignore
//! let (a, prng) = white(100, 1.0, seeded(42))?;
//! let (b, prng) = ar1(100, 0.3, 1.0, prng)?;
//! ```

use std::f64::consts::PI;
use std::str::FromStr;

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::types::Prng;

/// Period range, in seconds, for low-frequency drift (0.015 Hz to 0.002 Hz).
pub const DRIFT_PERIOD_RANGE: (u32, u32) = (67, 500);

/// Default cardiac frequency (Hz) for physiological noise.
pub const FREQ_HEART: f64 = 1.17;

/// Default respiratory frequency (Hz) for physiological noise.
pub const FREQ_RESP: f64 = 0.2;

/// I.i.d. Gaussian noise with mean 0 and standard deviation `sigma`.
pub fn white(n: usize, sigma: f64, mut prng: Prng) -> Result<(Vec<f64>, Prng)> {
    if !(sigma.is_finite() && sigma >= 0.0) {
        return Err(SimError::invalid("sigma", format!("must be finite and >= 0, got {sigma}")));
    }
    let normal = Normal::new(0.0, sigma).map_err(|e| SimError::invalid("sigma", e.to_string()))?;
    let noise = (0..n).map(|_| normal.sample(&mut prng)).collect();
    Ok((noise, prng))
}

/// First-order autoregressive noise built on a white trace.
///
/// `out[0] = w[0]`, `out[i] = w[i] + alpha * out[i - 1]`. With `alpha = 0`
/// the result is the white trace itself.
pub fn ar1(n: usize, alpha: f64, sigma: f64, prng: Prng) -> Result<(Vec<f64>, Prng)> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(SimError::invalid("alpha", format!("must be in [0, 1], got {alpha}")));
    }

    let (mut noise, prng) = white(n, sigma, prng)?;
    for i in 1..noise.len() {
        noise[i] += alpha * noise[i - 1];
    }
    Ok((noise, prng))
}

/// White noise plus cardiac and respiratory oscillations.
///
/// The oscillatory part `sin(2π·f_heart·TR·t) + cos(2π·f_resp·TR·t)` is
/// rescaled so that its standard deviation equals `sigma`.
pub fn physio(
    n: usize,
    tr: f64,
    freq_heart: f64,
    freq_resp: f64,
    sigma: f64,
    prng: Prng,
) -> Result<(Vec<f64>, Prng)> {
    if !(tr.is_finite() && tr > 0.0) {
        return Err(SimError::invalid("tr", format!("must be positive, got {tr}")));
    }

    let heart = 2.0 * PI * freq_heart * tr;
    let resp = 2.0 * PI * freq_resp * tr;
    let mut drift: Vec<f64> = (0..n)
        .map(|t| {
            let t = t as f64;
            (heart * t).sin() + (resp * t).cos()
        })
        .collect();

    let sd = population_std(&drift);
    if sd > 0.0 {
        let k = sigma / sd;
        drift.iter_mut().for_each(|x| *x *= k);
    }

    let (white, prng) = white(n, sigma, prng)?;
    Ok((add(drift, &white), prng))
}

/// White noise plus a discrete-cosine low-frequency drift.
///
/// A drift period is drawn uniformly from [`DRIFT_PERIOD_RANGE`]; the number
/// of cosine basis functions is `floor(2·N·TR/period + 1)` and the basis
/// columns are summed.
pub fn lowfreqdrift(n: usize, tr: f64, sigma: f64, mut prng: Prng) -> Result<(Vec<f64>, Prng)> {
    if !(tr.is_finite() && tr > 0.0) {
        return Err(SimError::invalid("tr", format!("must be positive, got {tr}")));
    }

    let (lo, hi) = DRIFT_PERIOD_RANGE;
    let period = prng.random_range(lo..=hi) as f64;
    let nbasis = (2.0 * n as f64 * tr / period + 1.0).floor() as usize;
    let drift = dct_drift(n, nbasis);

    let (white, prng) = white(n, sigma, prng)?;
    Ok((add(drift, &white), prng))
}

/// Zero the first `offset` samples of a trace.
pub fn shift(mut noise: Vec<f64>, offset: usize) -> Vec<f64> {
    let offset = offset.min(noise.len());
    noise[..offset].iter_mut().for_each(|x| *x = 0.0);
    noise
}

/// Row sums of an `n × nbasis` DCT-II basis.
fn dct_drift(n: usize, nbasis: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    let nf = n as f64;
    (0..n)
        .map(|i| {
            (0..nbasis)
                .map(|k| {
                    if k == 0 {
                        1.0 / nf.sqrt()
                    } else {
                        (2.0 / nf).sqrt() * (PI * (2.0 * i as f64 + 1.0) * k as f64 / (2.0 * nf)).cos()
                    }
                })
                .sum()
        })
        .collect()
}

fn add(mut a: Vec<f64>, b: &[f64]) -> Vec<f64> {
    a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
    a
}

fn population_std(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let n = x.len() as f64;
    let mean = x.iter().sum::<f64>() / n;
    (x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// A named noise family with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NoiseModel {
    /// Gaussian white noise.
    White {
        /// Standard deviation.
        sigma: f64,
    },
    /// AR(1) noise.
    Ar1 {
        /// Autoregressive coefficient in [0, 1].
        alpha: f64,
        /// Standard deviation of the innovations.
        sigma: f64,
    },
    /// Cardiac/respiratory oscillations plus white noise.
    Physio {
        /// Sampling interval in seconds.
        tr: f64,
        /// Cardiac frequency (Hz).
        freq_heart: f64,
        /// Respiratory frequency (Hz).
        freq_resp: f64,
        /// Target standard deviation of the oscillations and of the white part.
        sigma: f64,
    },
    /// DCT drift plus white noise.
    LowFreqDrift {
        /// Sampling interval in seconds.
        tr: f64,
        /// Standard deviation of the white part.
        sigma: f64,
    },
    /// An inner model whose first `offset` samples are zeroed.
    Shift {
        /// Number of leading samples to zero.
        offset: usize,
        /// Model generating the trace.
        inner: Box<NoiseModel>,
    },
}

impl NoiseModel {
    /// Names accepted by [`NoiseModel::from_str`].
    pub const NAMES: &'static [&'static str] = &["white", "ar1", "physio", "lowfreqdrift"];

    /// Draw a trace of length `n`.
    pub fn generate(&self, n: usize, prng: Prng) -> Result<(Vec<f64>, Prng)> {
        match self {
            NoiseModel::White { sigma } => white(n, *sigma, prng),
            NoiseModel::Ar1 { alpha, sigma } => ar1(n, *alpha, *sigma, prng),
            NoiseModel::Physio {
                tr,
                freq_heart,
                freq_resp,
                sigma,
            } => physio(n, *tr, *freq_heart, *freq_resp, *sigma, prng),
            NoiseModel::LowFreqDrift { tr, sigma } => lowfreqdrift(n, *tr, *sigma, prng),
            NoiseModel::Shift { offset, inner } => {
                let (noise, prng) = inner.generate(n, prng)?;
                Ok((shift(noise, *offset), prng))
            }
        }
    }

    /// Same model sampled at `tr` seconds.
    ///
    /// Only the oscillatory and drift models depend on the sampling rate.
    pub fn with_tr(self, tr: f64) -> Self {
        match self {
            NoiseModel::Physio {
                freq_heart,
                freq_resp,
                sigma,
                ..
            } => NoiseModel::Physio {
                tr,
                freq_heart,
                freq_resp,
                sigma,
            },
            NoiseModel::LowFreqDrift { sigma, .. } => NoiseModel::LowFreqDrift { tr, sigma },
            NoiseModel::Shift { offset, inner } => NoiseModel::Shift {
                offset,
                inner: Box::new(inner.with_tr(tr)),
            },
            other => other,
        }
    }

    /// Wrap this model so its first `offset` samples are zero.
    pub fn shifted(self, offset: usize) -> Self {
        NoiseModel::Shift {
            offset,
            inner: Box::new(self),
        }
    }
}

impl Default for NoiseModel {
    fn default() -> Self {
        NoiseModel::White { sigma: 1.0 }
    }
}

impl FromStr for NoiseModel {
    type Err = SimError;

    /// Parse a model name with unit-scale defaults.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "white" => Ok(NoiseModel::White { sigma: 1.0 }),
            "ar1" => Ok(NoiseModel::Ar1 { alpha: 0.5, sigma: 1.0 }),
            "physio" => Ok(NoiseModel::Physio {
                tr: 1.0,
                freq_heart: FREQ_HEART,
                freq_resp: FREQ_RESP,
                sigma: 1.0,
            }),
            "lowfreqdrift" => Ok(NoiseModel::LowFreqDrift { tr: 1.0, sigma: 1.0 }),
            _ => Err(SimError::UnknownConfiguration {
                kind: "noise model",
                name: s.to_string(),
                valid: Self::NAMES,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::seeded;

    #[test]
    fn test_white_is_deterministic() {
        let (a, _) = white(1000, 1.0, seeded(42)).unwrap();
        let (b, _) = white(1000, 1.0, seeded(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_white_moments() {
        let (x, _) = white(20_000, 2.0, seeded(1)).unwrap();
        let mean = x.iter().sum::<f64>() / x.len() as f64;
        assert!(mean.abs() < 0.1, "mean {mean}");
        assert!((population_std(&x) - 2.0).abs() < 0.1);
    }

    #[test]
    fn test_returned_prng_continues_stream() {
        let (first, prng) = white(10, 1.0, seeded(5)).unwrap();
        let (second, _) = white(10, 1.0, prng).unwrap();
        let (both, _) = white(20, 1.0, seeded(5)).unwrap();
        assert_eq!(&both[..10], &first[..]);
        assert_eq!(&both[10..], &second[..]);
    }

    #[test]
    fn test_ar1_zero_alpha_is_white() {
        let (w, _) = white(100, 1.0, seeded(7)).unwrap();
        let (a, _) = ar1(100, 0.0, 1.0, seeded(7)).unwrap();
        assert_eq!(w, a);
    }

    #[test]
    fn test_ar1_recursion() {
        let (w, _) = white(50, 1.0, seeded(7)).unwrap();
        let (a, _) = ar1(50, 0.5, 1.0, seeded(7)).unwrap();
        assert_eq!(a[0], w[0]);
        for i in 1..50 {
            assert!((a[i] - (w[i] + 0.5 * a[i - 1])).abs() < 1e-12);
        }
    }

    #[test]
    fn test_ar1_rejects_alpha() {
        assert!(matches!(
            ar1(10, 1.5, 1.0, seeded(0)),
            Err(SimError::InvalidParameter { name: "alpha", .. })
        ));
        assert!(ar1(10, -0.1, 1.0, seeded(0)).is_err());
    }

    #[test]
    fn test_physio_oscillation_scale() {
        // Zero white noise isolates the rescaled oscillation
        let (x, _) = physio(500, 1.0, FREQ_HEART, FREQ_RESP, 0.0, seeded(3)).unwrap();
        assert!(x.iter().all(|v| *v == 0.0));

        let (x, _) = physio(500, 1.0, FREQ_HEART, FREQ_RESP, 1e-9, seeded(3)).unwrap();
        assert!(x.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_lowfreqdrift_length_and_determinism() {
        let (a, _) = lowfreqdrift(200, 2.0, 1.0, seeded(11)).unwrap();
        let (b, _) = lowfreqdrift(200, 2.0, 1.0, seeded(11)).unwrap();
        assert_eq!(a.len(), 200);
        assert_eq!(a, b);
    }

    #[test]
    fn test_dct_single_basis_is_constant() {
        let d = dct_drift(16, 1);
        assert!(d.iter().all(|v| (v - 0.25).abs() < 1e-12));
    }

    #[test]
    fn test_shift() {
        let out = shift(vec![1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(out, vec![0.0, 0.0, 3.0, 4.0]);
        assert_eq!(shift(vec![1.0, 2.0], 5), vec![0.0, 0.0]);
    }

    #[test]
    fn test_model_parse() {
        assert_eq!("white".parse::<NoiseModel>().unwrap(), NoiseModel::White { sigma: 1.0 });
        let err = "pink".parse::<NoiseModel>().unwrap_err();
        assert!(err.to_string().contains("lowfreqdrift"));
    }

    #[test]
    fn test_with_tr() {
        let drift = NoiseModel::LowFreqDrift { tr: 1.0, sigma: 0.5 }.shifted(2).with_tr(2.5);
        assert_eq!(
            drift,
            NoiseModel::LowFreqDrift { tr: 2.5, sigma: 0.5 }.shifted(2)
        );
        let white = NoiseModel::White { sigma: 2.0 };
        assert_eq!(white.clone().with_tr(3.0), white);
    }

    #[test]
    fn test_shifted_model() {
        let model = NoiseModel::default().shifted(3);
        let (x, _) = model.generate(10, seeded(2)).unwrap();
        assert_eq!(&x[..3], &[0.0, 0.0, 0.0]);
        let (w, _) = white(10, 1.0, seeded(2)).unwrap();
        assert_eq!(&x[3..], &w[3..]);
    }
}
