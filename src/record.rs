//! Per-run result records.
//!
//! A record is a nested mapping whose leaves are one of a small closed set
//! of value kinds. Whether a statistic is one- or two-dimensional is decided
//! once, when the value is built, and carried as an [`ArrayValue`] tag.

use std::collections::BTreeMap;

use crate::glm::FitResult;
use crate::types::Matrix;

/// Numeric array leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayValue {
    /// A vector, e.g. betas or a BOLD trace.
    OneD(Vec<f64>),
    /// A row-major matrix, e.g. a design matrix or confidence intervals.
    TwoD {
        /// Row count.
        rows: usize,
        /// Column count.
        cols: usize,
        /// Row-major entries.
        data: Vec<f64>,
    },
}

impl ArrayValue {
    /// Number of entries.
    pub fn len(&self) -> usize {
        match self {
            ArrayValue::OneD(v) => v.len(),
            ArrayValue::TwoD { data, .. } => data.len(),
        }
    }

    /// True when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shape as `(rows, cols)`; a vector is a single row.
    pub fn shape(&self) -> (usize, usize) {
        match self {
            ArrayValue::OneD(v) => (1, v.len()),
            ArrayValue::TwoD { rows, cols, .. } => (*rows, *cols),
        }
    }

    /// Rows of the array.
    pub fn rows(&self) -> Vec<&[f64]> {
        match self {
            ArrayValue::OneD(v) => vec![v.as_slice()],
            ArrayValue::TwoD { cols, data, .. } if *cols > 0 => data.chunks(*cols).collect(),
            ArrayValue::TwoD { rows, .. } => vec![&[][..]; *rows],
        }
    }
}

impl From<&Matrix> for ArrayValue {
    fn from(m: &Matrix) -> Self {
        let (rows, cols) = m.shape();
        let data = m.row_iter().flat_map(|r| r.iter().copied().collect::<Vec<_>>()).collect();
        ArrayValue::TwoD { rows, cols, data }
    }
}

/// Nested mapping of named values.
pub type Mapping = BTreeMap<String, Value>;

/// One node of a result record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value (e.g. an unset ISI).
    Null,
    /// Single number.
    Scalar(f64),
    /// Free text.
    Text(String),
    /// List of names.
    Labels(Vec<String>),
    /// Numeric array.
    Array(ArrayValue),
    /// Nested group.
    Mapping(Mapping),
}

impl Value {
    /// The number, if this is a scalar.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(x) => Some(*x),
            _ => None,
        }
    }

    /// The array, if this is one.
    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The labels, if this is a label list.
    pub fn as_labels(&self) -> Option<&[String]> {
        match self {
            Value::Labels(l) => Some(l),
            _ => None,
        }
    }

    /// The nested mapping, if this is a group.
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Child of a group by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_mapping().and_then(|m| m.get(key))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Scalar(x)
    }
}

impl From<usize> for Value {
    fn from(x: usize) -> Self {
        Value::Scalar(x as f64)
    }
}

impl From<Option<f64>> for Value {
    fn from(x: Option<f64>) -> Self {
        x.map_or(Value::Null, Value::Scalar)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Array(ArrayValue::OneD(v))
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::Labels(v)
    }
}

impl From<&Matrix> for Value {
    fn from(m: &Matrix) -> Self {
        Value::Array(ArrayValue::from(m))
    }
}

impl From<Mapping> for Value {
    fn from(m: Mapping) -> Self {
        Value::Mapping(m)
    }
}

/// Result record of one simulation iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Mapping,
}

impl Record {
    /// Empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a top-level entry.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Top-level entry by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Group stored for a model.
    pub fn model(&self, name: &str) -> Option<&Mapping> {
        self.get(name).and_then(Value::as_mapping)
    }

    /// Batch code of the iteration that produced this record.
    pub fn batch_code(&self) -> Option<usize> {
        self.get("batch_code").and_then(Value::as_scalar).map(|c| c as usize)
    }

    /// All top-level entries.
    pub fn entries(&self) -> &Mapping {
        &self.entries
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Mapping(r.entries)
    }
}

/// Store the statistics of a fit under their record keys.
pub fn insert_fit(group: &mut Mapping, fit: &FitResult) {
    let ci: Vec<f64> = fit.ci.iter().flat_map(|&(lo, hi)| [lo, hi]).collect();
    let entries: [(&str, Value); 16] = [
        ("beta", fit.beta.clone().into()),
        ("bse", fit.bse.clone().into()),
        ("t", fit.t.clone().into()),
        ("p", fit.p.clone().into()),
        (
            "ci",
            Value::Array(ArrayValue::TwoD {
                rows: fit.ci.len(),
                cols: 2,
                data: ci,
            }),
        ),
        ("resid", fit.resid.clone().into()),
        ("r", fit.rsquared.into()),
        ("fvalue", fit.fvalue.into()),
        ("llf", fit.llf.into()),
        ("aic", fit.aic.into()),
        ("bic", fit.bic.into()),
        ("mse_model", fit.mse_model.into()),
        ("mse_resid", fit.mse_resid.into()),
        ("mse_total", fit.mse_total.into()),
        ("df_model", fit.df_model.into()),
        ("df_resid", fit.df_resid.into()),
    ];
    for (key, value) in entries {
        group.insert(key.to_string(), value);
    }
}
