//! Aggregation queries over collected simulation records.
//!
//! Every query first folds one statistic of one model into histograms
//! ([`create_hist_list`]) and then reads them out:
//!
//! - [`summary`] and [`summary_table`]: moments and median per condition
//! - [`above`]: mass above a criterion
//! - [`pairwise_overlaps`]: shared mass between conditions

mod collect;

pub use collect::create_hist_list;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::record::Record;

/// Descriptive statistics of one condition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Mean.
    pub mean: f64,
    /// Observation count.
    pub n: u64,
    /// Sample standard deviation.
    pub std: f64,
    /// Standard error of the mean.
    pub se: f64,
    /// Median at bucket resolution.
    pub median: f64,
}

/// One row of [`summary_table`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    /// Condition or statistic name.
    pub name: String,
    /// Mean.
    pub m: f64,
    /// Sample standard deviation.
    pub sd: f64,
    /// Standard error.
    pub se: f64,
    /// Median.
    pub median: f64,
    /// Observation count.
    pub n: u64,
}

/// Column headings matching [`SummaryRow`].
pub const SUMMARY_HEADER: [&str; 6] = ["name", "M", "SD", "SE", "MEDIAN", "N"];

/// Summary of `stat` per condition of `model`.
pub fn summary(records: &[Record], model: &str, stat: &str) -> Result<BTreeMap<String, Summary>> {
    Ok(create_hist_list(records, model, stat)?
        .into_iter()
        .map(|h| {
            let s = Summary {
                mean: h.mean(),
                n: h.n(),
                std: h.stdev(),
                se: h.se(),
                median: h.median(),
            };
            (h.name().to_string(), s)
        })
        .collect())
}

/// Same content as [`summary`], as ordered rows in design-matrix order.
pub fn summary_table(records: &[Record], model: &str, stat: &str) -> Result<Vec<SummaryRow>> {
    Ok(create_hist_list(records, model, stat)?
        .into_iter()
        .map(|h| SummaryRow {
            name: h.name().to_string(),
            m: h.mean(),
            sd: h.stdev(),
            se: h.se(),
            median: h.median(),
            n: h.n(),
        })
        .collect())
}

/// Fraction of each condition's mass above `criterion`.
pub fn above(records: &[Record], model: &str, stat: &str, criterion: f64) -> Result<BTreeMap<String, f64>> {
    Ok(create_hist_list(records, model, stat)?
        .iter()
        .map(|h| (h.name().to_string(), h.above(criterion)))
        .collect())
}

/// Overlap of every pair of conditions, keyed `"{a}_{b}"`.
///
/// An omnibus statistic has a single histogram and reports `{name: 0}`.
pub fn pairwise_overlaps(records: &[Record], model: &str, stat: &str) -> Result<BTreeMap<String, f64>> {
    let hists = create_hist_list(records, model, stat)?;
    let mut out = BTreeMap::new();

    if let [only] = hists.as_slice() {
        out.insert(only.name().to_string(), 0.0);
        return Ok(out);
    }

    for (i, a) in hists.iter().enumerate() {
        for b in &hists[i + 1..] {
            out.insert(format!("{}_{}", a.name(), b.name()), a.overlap(b)?);
        }
    }
    Ok(out)
}
