//! Persistence of result records into hierarchical containers.
//!
//! The walker in this module knows the shape of a [`Record`]; a
//! [`HierarchySink`] only knows how to open groups and store leaves. Adding
//! a storage format means implementing the sink, nothing else.

mod json;

pub use json::{to_json, to_json_pretty, write_json, JsonSink};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::record::{ArrayValue, Record, Value};

/// How [`Value::Null`] leaves are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullPolicy {
    /// Store an explicit null marker.
    #[default]
    Sentinel,
    /// Store 0, for consumers that cannot represent missing values.
    Zero,
}

/// Target of a recursive record walk.
pub trait HierarchySink {
    /// Open a nested group.
    fn begin_group(&mut self, name: &str) -> Result<()>;

    /// Close the innermost open group.
    fn end_group(&mut self) -> Result<()>;

    /// Store a missing value.
    fn write_null(&mut self, name: &str) -> Result<()>;

    /// Store a number.
    fn write_scalar(&mut self, name: &str, value: f64) -> Result<()>;

    /// Store a string.
    fn write_text(&mut self, name: &str, value: &str) -> Result<()>;

    /// Store a list of names.
    fn write_labels(&mut self, name: &str, labels: &[String]) -> Result<()>;

    /// Store a numeric array.
    fn write_array(&mut self, name: &str, array: &ArrayValue) -> Result<()>;
}

/// Write `value` under `name`, recursing into mappings.
pub fn write_value<S: HierarchySink + ?Sized>(
    sink: &mut S,
    name: &str,
    value: &Value,
    policy: NullPolicy,
) -> Result<()> {
    match value {
        Value::Null => match policy {
            NullPolicy::Sentinel => sink.write_null(name),
            NullPolicy::Zero => sink.write_scalar(name, 0.0),
        },
        Value::Scalar(x) => sink.write_scalar(name, *x),
        Value::Text(s) => sink.write_text(name, s),
        Value::Labels(l) => sink.write_labels(name, l),
        Value::Array(a) => sink.write_array(name, a),
        Value::Mapping(m) => {
            sink.begin_group(name)?;
            for (key, child) in m {
                write_value(sink, key, child, policy)?;
            }
            sink.end_group()
        }
    }
}

/// Write one top-level group per record, keyed by its position.
pub fn write_records<S: HierarchySink + ?Sized>(
    sink: &mut S,
    records: &[Record],
    policy: NullPolicy,
) -> Result<()> {
    for (index, record) in records.iter().enumerate() {
        sink.begin_group(&index.to_string())?;
        for (key, value) in record.entries() {
            write_value(sink, key, value, policy)?;
        }
        sink.end_group()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Mapping;

    /// Records every call as a path string.
    #[derive(Default)]
    struct Trace {
        path: Vec<String>,
        lines: Vec<String>,
    }

    impl Trace {
        fn leaf(&mut self, name: &str, what: String) -> Result<()> {
            let mut full = self.path.clone();
            full.push(name.to_string());
            self.lines.push(format!("{}={what}", full.join("/")));
            Ok(())
        }
    }

    impl HierarchySink for Trace {
        fn begin_group(&mut self, name: &str) -> Result<()> {
            self.path.push(name.to_string());
            Ok(())
        }
        fn end_group(&mut self) -> Result<()> {
            self.path.pop();
            Ok(())
        }
        fn write_null(&mut self, name: &str) -> Result<()> {
            self.leaf(name, "null".into())
        }
        fn write_scalar(&mut self, name: &str, value: f64) -> Result<()> {
            self.leaf(name, value.to_string())
        }
        fn write_text(&mut self, name: &str, value: &str) -> Result<()> {
            self.leaf(name, value.to_string())
        }
        fn write_labels(&mut self, name: &str, labels: &[String]) -> Result<()> {
            self.leaf(name, labels.join(","))
        }
        fn write_array(&mut self, name: &str, array: &ArrayValue) -> Result<()> {
            self.leaf(name, format!("{:?}", array.shape()))
        }
    }

    fn record() -> Record {
        let mut r = Record::new();
        r.insert("ISI", Value::Null);
        let mut model = Mapping::new();
        model.insert("aic".into(), Value::Scalar(1.5));
        model.insert("beta".into(), vec![1.0, 2.0].into());
        r.insert("boxcar", model);
        r
    }

    #[test]
    fn test_walk_mirrors_nesting() {
        let mut sink = Trace::default();
        write_records(&mut sink, &[record(), record()], NullPolicy::Sentinel).unwrap();
        assert_eq!(
            sink.lines,
            vec![
                "0/ISI=null",
                "0/boxcar/aic=1.5",
                "0/boxcar/beta=(1, 2)",
                "1/ISI=null",
                "1/boxcar/aic=1.5",
                "1/boxcar/beta=(1, 2)",
            ]
        );
    }

    #[test]
    fn test_zero_null_policy() {
        let mut sink = Trace::default();
        write_records(&mut sink, &[record()], NullPolicy::Zero).unwrap();
        assert_eq!(sink.lines[0], "0/ISI=0");
    }
}
