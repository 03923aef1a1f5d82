//! Least-squares GLM fit of a BOLD signal on a design matrix.
//!
//! The model is `y = X·beta + e` with `X = [design | 1]`: a constant dummy
//! column is appended last, after any normalization or convolution, so it
//! absorbs the mean without being transformed itself.
//!
//! The fit uses the SVD pseudo-inverse, which tolerates the rank deficiency
//! that boxcar designs with a baseline column routinely produce:
//!
//! ```text
//! beta  = pinv(X)·y
//! cov   = pinv(X)·pinv(X)ᵀ · SSR/df_resid
//! t     = beta / sqrt(diag(cov))
//! ```

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::warn;

use crate::error::{Result, SimError};
use crate::types::{Matrix, Vector};

const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// Confidence level of [`FitResult::ci`].
pub const CI_LEVEL: f64 = 0.95;

/// Everything a single GLM fit produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    /// Coefficients, one per design column plus the dummy (last).
    pub beta: Vec<f64>,
    /// Standard errors of the coefficients.
    pub bse: Vec<f64>,
    /// t statistics.
    pub t: Vec<f64>,
    /// Two-sided p-values.
    pub p: Vec<f64>,
    /// 95% confidence intervals as `(lower, upper)`.
    pub ci: Vec<(f64, f64)>,
    /// Residuals `y − X·beta`.
    pub resid: Vec<f64>,
    /// Fitted values `X·beta`.
    pub fitted: Vec<f64>,
    /// Coefficient of determination (centered).
    pub rsquared: f64,
    /// Omnibus F statistic.
    pub fvalue: f64,
    /// Gaussian log-likelihood.
    pub llf: f64,
    /// Akaike information criterion.
    pub aic: f64,
    /// Bayesian information criterion.
    pub bic: f64,
    /// Explained sum of squares / df_model.
    pub mse_model: f64,
    /// Residual sum of squares / df_resid.
    pub mse_resid: f64,
    /// Total centered sum of squares / (n − 1).
    pub mse_total: f64,
    /// Model degrees of freedom (rank − 1).
    pub df_model: f64,
    /// Residual degrees of freedom (n − rank).
    pub df_resid: f64,
    /// Number of observations used.
    pub nobs: usize,
    /// Numerical rank of the augmented design.
    pub rank: usize,
    cov: Vec<f64>,
}

impl FitResult {
    /// Number of coefficients, dummy included.
    pub fn n_params(&self) -> usize {
        self.beta.len()
    }

    /// Scaled covariance matrix of the coefficients.
    pub fn cov_params(&self) -> Matrix {
        let k = self.n_params();
        Matrix::from_column_slice(k, k, &self.cov)
    }

    /// t-test of the linear combination `weights · beta`.
    ///
    /// `weights` may omit the dummy coefficient, which is then given weight 0.
    pub fn contrast(&self, weights: &[f64]) -> Result<Contrast> {
        let k = self.n_params();
        let mut w = weights.to_vec();
        if w.len() == k - 1 {
            w.push(0.0);
        }
        if w.len() != k {
            return Err(SimError::length("contrast weights", k - 1, weights.len()));
        }

        let w = Vector::from_vec(w);
        let effect = w.dot(&Vector::from_column_slice(&self.beta));
        let variance = (w.transpose() * self.cov_params() * &w)[(0, 0)];
        let t = effect / variance.sqrt();

        Ok(Contrast {
            df: self.df_resid,
            effect,
            t,
            p: two_sided_p(t, self.df_resid),
        })
    }
}

/// Result of a linear-hypothesis t-test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contrast {
    /// Denominator degrees of freedom.
    pub df: f64,
    /// Estimated value of the combination.
    pub effect: f64,
    /// t statistic.
    pub t: f64,
    /// Two-sided p-value.
    pub p: f64,
}

/// Stateful fitter: holds the last fit so contrasts can be requested later.
#[derive(Debug, Clone, Default)]
pub struct Glm {
    result: Option<FitResult>,
}

impl Glm {
    /// A fitter with no model yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit `bold` on `design` plus a dummy column and keep the result.
    pub fn fit(&mut self, bold: &[f64], design: &Matrix) -> Result<&FitResult> {
        let result = fit(bold, design)?;
        Ok(self.result.insert(result))
    }

    /// The last fit.
    pub fn result(&self) -> Result<&FitResult> {
        self.result.as_ref().ok_or(SimError::NotFitted)
    }

    /// t-test a contrast against the last fit, returning `(df, t, p)`.
    pub fn contrast(&self, weights: &[f64]) -> Result<(f64, f64, f64)> {
        let c = self.result()?.contrast(weights)?;
        Ok((c.df, c.t, c.p))
    }
}

/// Append the constant dummy column.
pub fn add_dummy(design: &Matrix) -> Matrix {
    let n = design.ncols();
    design.clone().insert_column(n, 1.0)
}

/// Fit `bold` on `design` with an appended dummy column.
///
/// When row counts differ, both are truncated to the shorter length.
pub fn fit(bold: &[f64], design: &Matrix) -> Result<FitResult> {
    let x = add_dummy(design);
    let n = bold.len().min(x.nrows());
    if n != bold.len() || n != x.nrows() {
        warn!(bold = bold.len(), design = x.nrows(), "truncating to {n} rows before fitting");
    }
    if n == 0 {
        return Err(SimError::length("bold", design.nrows().max(1), bold.len()));
    }

    let x = x.rows(0, n).into_owned();
    let y = Vector::from_column_slice(&bold[..n]);
    ols(&y, &x)
}

fn ols(y: &Vector, x: &Matrix) -> Result<FitResult> {
    let (n, k) = x.shape();
    let nf = n as f64;

    let svd = x.clone().svd(true, true);
    let max_sv = svd.singular_values.max();
    let tol = max_sv * (n.max(k) as f64) * f64::EPSILON;
    let rank = svd.singular_values.iter().filter(|&&s| s > tol).count();
    let pinv = svd
        .pseudo_inverse(tol)
        .map_err(|e| SimError::IncompatibleShape(e.to_string()))?;

    let beta = &pinv * y;
    let fitted = x * &beta;
    let resid = y - &fitted;

    let ssr = resid.dot(&resid);
    let mean = y.mean();
    let tss = y.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    let ess = tss - ssr;

    let df_resid = nf - rank as f64;
    let df_model = rank as f64 - 1.0;
    let scale = ssr / df_resid;

    let cov = (&pinv * pinv.transpose()) * scale;
    let bse: Vec<f64> = cov.diagonal().iter().map(|v| v.sqrt()).collect();
    let t: Vec<f64> = beta.iter().zip(&bse).map(|(b, s)| b / s).collect();
    let p = t.iter().map(|&t| two_sided_p(t, df_resid)).collect();

    let q = t_quantile(1.0 - (1.0 - CI_LEVEL) / 2.0, df_resid);
    let ci = beta.iter().zip(&bse).map(|(b, s)| (b - q * s, b + q * s)).collect();

    let llf = -nf / 2.0 * (LN_2PI + (ssr / nf).ln() + 1.0);
    let params = rank as f64;
    let mse_model = ess / df_model;
    let mse_resid = ssr / df_resid;

    Ok(FitResult {
        beta: beta.iter().copied().collect(),
        bse,
        t,
        p,
        ci,
        resid: resid.iter().copied().collect(),
        fitted: fitted.iter().copied().collect(),
        rsquared: 1.0 - ssr / tss,
        fvalue: mse_model / mse_resid,
        llf,
        aic: -2.0 * llf + 2.0 * params,
        bic: -2.0 * llf + nf.ln() * params,
        mse_model,
        mse_resid,
        mse_total: tss / (nf - 1.0),
        df_model,
        df_resid,
        nobs: n,
        rank,
        cov: cov.iter().copied().collect(),
    })
}

fn students_t(df: f64) -> Option<StudentsT> {
    if df > 0.0 && df.is_finite() {
        StudentsT::new(0.0, 1.0, df).ok()
    } else {
        None
    }
}

fn two_sided_p(t: f64, df: f64) -> f64 {
    if t.is_nan() {
        return f64::NAN;
    }
    match students_t(df) {
        Some(dist) => 2.0 * dist.sf(t.abs()),
        None => f64::NAN,
    }
}

fn t_quantile(p: f64, df: f64) -> f64 {
    match students_t(df) {
        Some(dist) => dist.inverse_cdf(p),
        None => f64::NAN,
    }
}
