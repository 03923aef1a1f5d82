//! Named streaming histogram with Welford moments.
//!
//! Values are bucketed after rounding to a fixed number of decimals, so the
//! table stays small no matter how many iterations are added, while mean
//! and variance are tracked exactly with Welford's online update.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Default bucket resolution, in decimal places.
pub const DEFAULT_DECIMALS: u32 = 2;

/// Append-only histogram of a single statistic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramAccumulator {
    name: String,
    decimals: u32,
    count: u64,
    mean: f64,
    m2: f64,
    buckets: BTreeMap<i64, u64>,
}

impl HistogramAccumulator {
    /// Empty histogram at [`DEFAULT_DECIMALS`] resolution.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_decimals(name, DEFAULT_DECIMALS)
    }

    /// Empty histogram bucketing at `decimals` places.
    pub fn with_decimals(name: impl Into<String>, decimals: u32) -> Self {
        Self {
            name: name.into(),
            decimals,
            count: 0,
            mean: 0.0,
            m2: 0.0,
            buckets: BTreeMap::new(),
        }
    }

    /// Histogram name (condition or statistic).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bucket resolution.
    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    fn scale(&self) -> f64 {
        10f64.powi(self.decimals as i32)
    }

    // Largest magnitude with its own bucket.
    fn limit(&self) -> f64 {
        i64::MAX as f64 / self.scale()
    }

    fn bucket(&self, value: f64) -> i64 {
        (value * self.scale()).round() as i64
    }

    fn bucket_value(&self, key: i64) -> f64 {
        key as f64 / self.scale()
    }

    /// Add one observation.
    ///
    /// NaN is counted as 0. Infinities are clamped to the extreme bucket
    /// value, so the moments stay finite.
    pub fn add(&mut self, value: f64) {
        let limit = self.limit();
        let value = if value.is_nan() { 0.0 } else { value.clamp(-limit, limit) };

        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);

        *self.buckets.entry(self.bucket(value)).or_insert(0) += 1;
    }

    /// Add every value of an iterator.
    pub fn extend<I: IntoIterator<Item = f64>>(&mut self, values: I) {
        values.into_iter().for_each(|v| self.add(v));
    }

    /// Number of observations.
    pub fn n(&self) -> u64 {
        self.count
    }

    /// Running mean (0 when empty).
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample standard deviation, 0 for fewer than two observations.
    pub fn stdev(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        (self.m2 / (self.count - 1) as f64).sqrt()
    }

    /// Standard error of the mean.
    pub fn se(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.stdev() / (self.count as f64).sqrt()
    }

    /// Median at bucket resolution: the first bucket where the cumulative
    /// count reaches half of the total. NaN when empty.
    pub fn median(&self) -> f64 {
        let half = self.count as f64 / 2.0;
        let mut cumulative = 0u64;
        for (&key, &c) in &self.buckets {
            cumulative += c;
            if cumulative as f64 >= half {
                return self.bucket_value(key);
            }
        }
        f64::NAN
    }

    /// Fraction of mass in buckets strictly above `threshold`.
    pub fn above(&self, threshold: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let above: u64 = self
            .buckets
            .iter()
            .filter(|(&key, _)| self.bucket_value(key) > threshold)
            .map(|(_, &c)| c)
            .sum();
        above as f64 / self.count as f64
    }

    /// Complement of [`above`](Self::above).
    pub fn at_or_below(&self, threshold: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        1.0 - self.above(threshold)
    }

    /// Probability mass per bucket value.
    pub fn probabilities(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        let n = self.count as f64;
        self.buckets
            .iter()
            .map(move |(&key, &c)| (self.bucket_value(key), c as f64 / n))
    }

    /// Shared probability mass: Σ min(p_self, p_other) over buckets.
    ///
    /// Both histograms must use the same resolution. An empty histogram
    /// overlaps nothing.
    pub fn overlap(&self, other: &Self) -> Result<f64> {
        self.check_compatible(other)?;
        if self.count == 0 || other.count == 0 {
            return Ok(0.0);
        }
        let (na, nb) = (self.count as f64, other.count as f64);
        Ok(self
            .buckets
            .iter()
            .filter_map(|(key, &ca)| {
                other
                    .buckets
                    .get(key)
                    .map(|&cb| (ca as f64 / na).min(cb as f64 / nb))
            })
            .sum())
    }

    /// Fold `other` into `self` (Chan et al. parallel update).
    ///
    /// ```text
    /// n_AB  = n_A + n_B
    /// δ     = μ_B − μ_A
    /// μ_AB  = μ_A + δ·n_B/n_AB
    /// M2_AB = M2_A + M2_B + δ²·n_A·n_B/n_AB
    /// ```
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        self.check_compatible(other)?;
        if other.count == 0 {
            return Ok(());
        }
        if self.count == 0 {
            self.count = other.count;
            self.mean = other.mean;
            self.m2 = other.m2;
            self.buckets = other.buckets.clone();
            return Ok(());
        }

        let n_a = self.count as f64;
        let n_b = other.count as f64;
        let n_ab = n_a + n_b;
        let delta = other.mean - self.mean;

        self.mean += delta * n_b / n_ab;
        self.m2 += other.m2 + delta * delta * n_a * n_b / n_ab;
        self.count += other.count;
        for (&key, &c) in &other.buckets {
            *self.buckets.entry(key).or_insert(0) += c;
        }
        Ok(())
    }

    fn check_compatible(&self, other: &Self) -> Result<()> {
        if self.decimals != other.decimals {
            return Err(SimError::IncompatibleShape(format!(
                "histogram `{}` buckets at {} decimals, `{}` at {}",
                self.name, self.decimals, other.name, other.decimals
            )));
        }
        Ok(())
    }
}
