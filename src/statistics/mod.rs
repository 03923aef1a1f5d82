//! Streaming aggregation of per-run statistics.
//!
//! Simulations produce thousands of fits; rather than keeping every value,
//! each named statistic is folded into a [`HistogramAccumulator`] that
//! tracks exact moments and a rounded frequency table.

mod histogram;

pub use histogram::{HistogramAccumulator, DEFAULT_DECIMALS};
