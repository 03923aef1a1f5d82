//! Design matrix construction.
//!
//! A design matrix has one row per TR unit and one column per regressor.
//! The baseline (condition 0) column is always first. Columns are laid out
//! in blocks, one block per regressor kind, each holding one column per
//! non-baseline condition:
//!
//! ```text
//! [baseline | box_1 .. box_K | acc_1 .. acc_K | value_1 .. value_K]
//! ```
//!
//! Pipeline order is build → orthogonalize → convolve.

mod convolve;

pub use convolve::{convolve_columns, convolve_truncated};

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SimError};
use crate::hrf::HrfKernel;
use crate::timing::Timeline;
use crate::types::{Condition, Matrix};

/// Name of the baseline column.
pub const BASELINE: &str = "baseline";

/// Name of the boxcar block.
pub const BOX: &str = "box";

/// A design matrix with its column names and condition levels.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    matrix: Matrix,
    names: Vec<String>,
    levels: Vec<Condition>,
}

impl DesignMatrix {
    /// Underlying matrix.
    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    /// Consume into the underlying matrix.
    pub fn into_matrix(self) -> Matrix {
        self.matrix
    }

    /// Column names, baseline first.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Sorted condition levels, always starting with 0.
    pub fn levels(&self) -> &[Condition] {
        &self.levels
    }

    /// Number of TR rows.
    pub fn nrows(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of regressors.
    pub fn ncols(&self) -> usize {
        self.matrix.ncols()
    }

    /// Index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Copy of one column.
    pub fn column(&self, index: usize) -> Vec<f64> {
        self.matrix.column(index).iter().copied().collect()
    }

    /// Sub-matrix made of the given columns.
    pub fn select(&self, columns: &[usize]) -> Matrix {
        self.matrix.select_columns(columns)
    }

    /// Convolve every column with `hrf`, keeping the row count.
    pub fn convolved(&self, hrf: &HrfKernel) -> Self {
        Self {
            matrix: convolve_columns(&self.matrix, hrf),
            names: self.names.clone(),
            levels: self.levels.clone(),
        }
    }

    /// Orthogonalize each regressor block against the block to its left.
    ///
    /// For every condition, the column in block `b + 1` is regressed (no
    /// intercept) on that condition's column in block `b` and replaced by
    /// the residual. Left-hand columns keep their original values.
    pub fn orthogonalized(&self) -> Result<Self> {
        let nconds = self.levels.len() - 1;
        let ncols = self.ncols() - 1;
        if nconds == 0 {
            debug!("design has no conditions besides baseline; nothing to orthogonalize");
            return Ok(self.clone());
        }
        if ncols % nconds != 0 {
            return Err(SimError::IncompatibleShape(format!(
                "{ncols} regressors cannot be split across {nconds} conditions"
            )));
        }
        if ncols == nconds {
            debug!("one regressor per condition; nothing to orthogonalize");
            return Ok(self.clone());
        }

        let per_cond = ncols / nconds;
        let mut out = self.matrix.clone();
        for cond in 0..nconds {
            let mut left = 1 + cond;
            for _ in 1..per_cond {
                let right = left + nconds;
                let resid = residualize(&self.column(right), &self.column(left));
                out.set_column(right, &nalgebra::DVector::from_vec(resid));
                left = right;
            }
        }

        Ok(Self {
            matrix: out,
            names: self.names.clone(),
            levels: self.levels.clone(),
        })
    }
}

/// Residual of `y` after a no-intercept regression on `x`.
fn residualize(y: &[f64], x: &[f64]) -> Vec<f64> {
    let xx: f64 = x.iter().map(|v| v * v).sum();
    if xx == 0.0 {
        return y.to_vec();
    }
    let xy: f64 = x.iter().zip(y).map(|(a, b)| a * b).sum();
    let slope = xy / xx;
    y.iter().zip(x).map(|(yi, xi)| yi - slope * xi).collect()
}

/// Step-by-step design matrix construction.
#[derive(Debug, Clone)]
pub struct DesignBuilder<'a> {
    trials: &'a [Condition],
    durations: &'a [usize],
    drop: Option<&'a [bool]>,
    hrf: Option<&'a HrfKernel>,
}

impl<'a> DesignBuilder<'a> {
    /// Start a design from original trials and their durations (in TR units).
    pub fn new(trials: &'a [Condition], durations: &'a [usize]) -> Self {
        Self {
            trials,
            durations,
            drop: None,
            hrf: None,
        }
    }

    /// Remove sub-trial positions (`true` = drop) from every trial.
    pub fn drop_mask(mut self, mask: &'a [bool]) -> Self {
        self.drop = Some(mask);
        self
    }

    /// Optionally set the drop mask.
    pub fn maybe_drop_mask(mut self, mask: Option<&'a [bool]>) -> Self {
        self.drop = mask;
        self
    }

    /// Convolve the finished design with `hrf`.
    pub fn convolve(mut self, hrf: &'a HrfKernel) -> Self {
        self.hrf = Some(hrf);
        self
    }

    /// Optionally convolve the finished design.
    pub fn maybe_convolve(mut self, hrf: Option<&'a HrfKernel>) -> Self {
        self.hrf = hrf;
        self
    }

    fn timeline(&self) -> Result<(Timeline, Vec<Condition>)> {
        let timeline = Timeline::expand(self.trials, self.durations, self.drop)?;
        let mut levels: BTreeSet<Condition> = self.trials.iter().copied().collect();
        levels.insert(0);
        Ok((timeline, levels.into_iter().collect()))
    }

    /// Unit (0/1) design: one indicator column per condition.
    pub fn boxcar(&self) -> Result<DesignMatrix> {
        let (timeline, levels) = self.timeline()?;
        let matrix = unit_block(&timeline, &levels);
        let names = std::iter::once(BASELINE.to_string())
            .chain(levels[1..].iter().map(|l| format!("{BOX}_{l}")))
            .collect();
        Ok(self.finish(DesignMatrix { matrix, names, levels }))
    }

    /// Parametric design from one impulse per original trial.
    pub fn impulses(&self, impulses: &[f64]) -> Result<DesignMatrix> {
        self.parametric(&[("param", impulses)], false, false)
    }

    /// Parametric design from named per-trial regressors.
    ///
    /// With `with_box` the boxcar block is placed before the parametric
    /// blocks. With `orth` each block is orthogonalized against its left
    /// neighbor before convolution.
    pub fn parametric(&self, regressors: &[(&str, &[f64])], with_box: bool, orth: bool) -> Result<DesignMatrix> {
        let (timeline, levels) = self.timeline()?;
        let nconds = levels.len() - 1;

        for (name, values) in regressors {
            if values.len() != self.trials.len() {
                return Err(SimError::length(*name, self.trials.len(), values.len()));
            }
        }

        let unit = unit_block(&timeline, &levels);
        let lead = if with_box { unit.ncols() } else { 1 };
        let mut matrix = Matrix::zeros(timeline.len(), lead + regressors.len() * nconds);
        matrix.columns_mut(0, lead).copy_from(&unit.columns(0, lead));

        let mut names = vec![BASELINE.to_string()];
        if with_box {
            names.extend(levels[1..].iter().map(|l| format!("{BOX}_{l}")));
        }

        let labels = timeline.masked_labels(0);
        for (block, (name, values)) in regressors.iter().enumerate() {
            let broadcast = timeline.broadcast(values);
            for (c, &level) in levels[1..].iter().enumerate() {
                let col = lead + block * nconds + c;
                for (row, &label) in labels.iter().enumerate() {
                    if label == level {
                        matrix[(row, col)] = broadcast[row];
                    }
                }
                names.push(format!("{name}_{level}"));
            }
        }

        let mut design = DesignMatrix { matrix, names, levels };
        if orth {
            design = design.orthogonalized()?;
        }
        Ok(self.finish(design))
    }

    fn finish(&self, design: DesignMatrix) -> DesignMatrix {
        match self.hrf {
            Some(hrf) => design.convolved(hrf),
            None => design,
        }
    }
}

/// Indicator columns for every level, baseline included.
///
/// Dropped positions count as baseline.
fn unit_block(timeline: &Timeline, levels: &[Condition]) -> Matrix {
    let mut m = Matrix::zeros(timeline.len(), levels.len());
    for (row, label) in timeline.masked_labels(0).into_iter().enumerate() {
        if let Ok(col) = levels.binary_search(&label) {
            m[(row, col)] = 1.0;
        }
    }
    m
}

/// Build a boxcar or single-impulse parametric design.
///
/// `impulses`, when given, holds one weight per original trial. The
/// baseline column is always filled with ones at baseline time points.
pub fn build(
    trials: &[Condition],
    durations: &[usize],
    impulses: Option<&[f64]>,
    drop_mask: Option<&[bool]>,
) -> Result<DesignMatrix> {
    let builder = DesignBuilder::new(trials, durations).maybe_drop_mask(drop_mask);
    match impulses {
        Some(impulses) => builder.impulses(impulses),
        None => builder.boxcar(),
    }
}

/// Which design-matrix constructor a model uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DesignKind {
    /// One indicator column per condition.
    Boxcar,
    /// Named per-trial regressors.
    Parametric {
        /// Data arrays providing the regressors, in block order.
        names: Vec<String>,
        /// Prepend the boxcar block.
        #[serde(default)]
        with_box: bool,
        /// Orthogonalize blocks left to right.
        #[serde(default)]
        orth: bool,
    },
}

impl DesignKind {
    /// Names accepted by [`DesignKind::from_str`].
    pub const NAMES: &'static [&'static str] = &["boxcar", "parametric"];
}

impl FromStr for DesignKind {
    type Err = SimError;

    /// Parse a kind name; `parametric` starts with no regressors.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "boxcar" | "unit" => Ok(DesignKind::Boxcar),
            "parametric" => Ok(DesignKind::Parametric {
                names: Vec::new(),
                with_box: false,
                orth: false,
            }),
            _ => Err(SimError::UnknownConfiguration {
                kind: "design matrix",
                name: s.to_string(),
                valid: Self::NAMES,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hrf::HrfParams;

    fn ones(n: usize) -> Vec<usize> {
        vec![1; n]
    }

    #[test]
    fn test_boxcar_two_conditions() {
        let trials = [0, 0, 0, 1, 1, 1];
        let dm = build(&trials, &ones(6), None, None).unwrap();
        assert_eq!(dm.matrix().shape(), (6, 2));
        assert_eq!(dm.column(0), vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
        assert_eq!(dm.column(1), vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        assert_eq!(dm.names(), &["baseline", "box_1"]);
    }

    #[test]
    fn test_baseline_always_present() {
        let dm = build(&[2, 1, 2], &ones(3), None, None).unwrap();
        assert_eq!(dm.levels(), &[0, 1, 2]);
        assert_eq!(dm.column(0), vec![0.0, 0.0, 0.0]);
        assert_eq!(dm.column(1), vec![0.0, 1.0, 0.0]);
        assert_eq!(dm.column(2), vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_durations_expand_rows() {
        let dm = build(&[0, 1], &[2, 3], None, None).unwrap();
        assert_eq!(dm.nrows(), 5);
        assert_eq!(dm.column(1), vec![0.0, 0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_impulses_broadcast() {
        let dm = build(&[0, 1, 2, 1], &[1, 2, 1, 1], Some(&[9.0, 0.5, 2.0, 0.25]), None).unwrap();
        assert_eq!(dm.column(0), vec![1.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(dm.column(1), vec![0.0, 0.5, 0.5, 0.0, 0.25]);
        assert_eq!(dm.column(2), vec![0.0, 0.0, 0.0, 2.0, 0.0]);
    }

    #[test]
    fn test_impulse_length_mismatch() {
        let err = build(&[0, 1], &[1, 1], Some(&[1.0]), None).unwrap_err();
        assert!(matches!(err, SimError::LengthMismatch { .. }));
    }

    #[test]
    fn test_drop_mask_marks_baseline() {
        let dm = build(&[0, 1], &[2, 2], None, Some(&[false, true])).unwrap();
        assert_eq!(dm.column(0), vec![1.0, 1.0, 0.0, 1.0]);
        assert_eq!(dm.column(1), vec![0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_drop_mask_parametric() {
        let dm = build(&[1, 2], &[3, 2], Some(&[0.5, 2.0]), Some(&[false, true])).unwrap();
        assert_eq!(dm.column(0), vec![0.0, 1.0, 0.0, 0.0, 1.0]);
        assert_eq!(dm.column(1), vec![0.5, 0.0, 0.5, 0.0, 0.0]);
        assert_eq!(dm.column(2), vec![0.0, 0.0, 0.0, 2.0, 0.0]);
    }

    #[test]
    fn test_parametric_layout() {
        let trials = [0, 1, 2, 1, 2];
        let acc = [0.0, 1.0, 0.0, 1.0, 1.0];
        let value = [0.0, 0.2, 0.4, 0.6, 0.8];
        let dm = DesignBuilder::new(&trials, &ones(5))
            .parametric(&[("acc", &acc), ("value", &value)], true, false)
            .unwrap();
        assert_eq!(
            dm.names(),
            &["baseline", "box_1", "box_2", "acc_1", "acc_2", "value_1", "value_2"]
        );
        assert_eq!(dm.column(5), vec![0.0, 0.2, 0.0, 0.6, 0.0]);
        assert_eq!(dm.column(6), vec![0.0, 0.0, 0.4, 0.0, 0.8]);
    }

    #[test]
    fn test_orthogonalize_removes_shared_variance() {
        let trials = [0, 1, 1, 1, 0, 1, 1];
        let value = [0.0, 1.0, 2.0, 3.0, 0.0, 4.0, 5.0];
        let dm = DesignBuilder::new(&trials, &ones(7))
            .parametric(&[("value", &value)], true, true)
            .unwrap();

        let box_col = dm.column(1);
        let value_col = dm.column(2);
        let dot: f64 = box_col.iter().zip(&value_col).map(|(a, b)| a * b).sum();
        assert!(dot.abs() < 1e-12);
        // The left neighbor is untouched
        assert_eq!(box_col, vec![0.0, 1.0, 1.0, 1.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_orthogonalize_incompatible_shape() {
        let dm = DesignMatrix {
            matrix: Matrix::zeros(4, 4),
            names: vec!["baseline".into(), "a".into(), "b".into(), "c".into()],
            levels: vec![0, 1, 2],
        };
        assert!(matches!(dm.orthogonalized(), Err(SimError::IncompatibleShape(_))));
    }

    #[test]
    fn test_convolved_keeps_rows() {
        let hrf = HrfKernel::try_from(HrfParams::canonical()).unwrap();
        let trials: Vec<u32> = (0..50).map(|i| (i % 3) as u32).collect();
        let dm = DesignBuilder::new(&trials, &ones(50)).convolve(&hrf).boxcar().unwrap();
        assert_eq!(dm.nrows(), 50);
        assert_eq!(dm.ncols(), 3);
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("boxcar".parse::<DesignKind>().unwrap(), DesignKind::Boxcar);
        let err = "sparse".parse::<DesignKind>().unwrap_err();
        assert!(err.to_string().contains("boxcar, parametric"));
    }
}
