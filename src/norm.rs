//! Column-wise normalization of design matrices and signals.
//!
//! Degenerate columns are not errors:
//! - zero standard deviation divides by 1.0, leaving `x - mean`
//! - zero mean in percent change yields 0 instead of NaN/Inf

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::types::Matrix;

/// Z-score each column using the population standard deviation.
pub fn zscore(matrix: &Matrix) -> Matrix {
    let mut out = matrix.clone();
    for mut col in out.column_iter_mut() {
        let values: Vec<f64> = col.iter().copied().collect();
        let (mean, std) = mean_std(&values);
        let std = if std == 0.0 { 1.0 } else { std };
        col.iter_mut().for_each(|x| *x = (*x - mean) / std);
    }
    out
}

/// Z-score a single signal.
pub fn zscore_signal(signal: &[f64]) -> Vec<f64> {
    let (mean, std) = mean_std(signal);
    let std = if std == 0.0 { 1.0 } else { std };
    signal.iter().map(|x| (x - mean) / std).collect()
}

/// Percent change from each column mean: `100 + 100·(x − mean)/mean`.
pub fn percent_change(matrix: &Matrix) -> Matrix {
    let mut out = matrix.clone();
    for mut col in out.column_iter_mut() {
        let values: Vec<f64> = col.iter().copied().collect();
        let (mean, _) = mean_std(&values);
        col.iter_mut().for_each(|x| *x = percent(*x, mean));
    }
    out
}

/// Percent change of a single signal.
pub fn percent_change_signal(signal: &[f64]) -> Vec<f64> {
    let (mean, _) = mean_std(signal);
    signal.iter().map(|&x| percent(x, mean)).collect()
}

fn percent(x: f64, mean: f64) -> f64 {
    let y = 100.0 + (x - mean) / mean * 100.0;
    if y.is_finite() {
        y
    } else {
        0.0
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
    (mean, var.sqrt())
}

/// Normalization applied to BOLD and design matrix before fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// Column z-scores.
    #[default]
    Zscore,
    /// Percent change from the column mean.
    Percent,
    /// Leave data untouched.
    None,
}

impl Normalization {
    /// Names accepted by [`Normalization::from_str`].
    pub const NAMES: &'static [&'static str] = &["zscore", "percent", "none"];

    /// Normalize every column of `matrix`.
    pub fn apply_matrix(&self, matrix: &Matrix) -> Matrix {
        match self {
            Normalization::Zscore => zscore(matrix),
            Normalization::Percent => percent_change(matrix),
            Normalization::None => matrix.clone(),
        }
    }

    /// Normalize a single signal.
    pub fn apply_signal(&self, signal: &[f64]) -> Vec<f64> {
        match self {
            Normalization::Zscore => zscore_signal(signal),
            Normalization::Percent => percent_change_signal(signal),
            Normalization::None => signal.to_vec(),
        }
    }
}

impl FromStr for Normalization {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "zscore" | "z" => Ok(Normalization::Zscore),
            "percent" | "percent_change" => Ok(Normalization::Percent),
            "none" => Ok(Normalization::None),
            _ => Err(SimError::UnknownConfiguration {
                kind: "normalization",
                name: s.to_string(),
                valid: Self::NAMES,
            }),
        }
    }
}
