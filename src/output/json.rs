//! JSON backend for simulation records.

use std::io::Write;

use serde_json::{Map, Value as Json};

use super::{write_records, HierarchySink, NullPolicy};
use crate::error::{Result, SimError};
use crate::record::{ArrayValue, Record};

/// Builds a `serde_json::Value` tree from a record walk.
///
/// Non-finite numbers have no JSON representation and are stored as null.
#[derive(Debug)]
pub struct JsonSink {
    root: Map<String, Json>,
    open: Vec<(String, Map<String, Json>)>,
}

impl Default for JsonSink {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonSink {
    /// Sink with an empty root object.
    pub fn new() -> Self {
        Self {
            root: Map::new(),
            open: Vec::new(),
        }
    }

    fn current(&mut self) -> &mut Map<String, Json> {
        match self.open.last_mut() {
            Some((_, group)) => group,
            None => &mut self.root,
        }
    }

    fn put(&mut self, name: &str, value: Json) -> Result<()> {
        self.current().insert(name.to_string(), value);
        Ok(())
    }

    /// Finish the walk and return the root object.
    pub fn finish(self) -> Result<Json> {
        if !self.open.is_empty() {
            return Err(SimError::IncompatibleShape(format!(
                "{} group(s) left open",
                self.open.len()
            )));
        }
        Ok(Json::Object(self.root))
    }
}

impl HierarchySink for JsonSink {
    fn begin_group(&mut self, name: &str) -> Result<()> {
        self.open.push((name.to_string(), Map::new()));
        Ok(())
    }

    fn end_group(&mut self) -> Result<()> {
        match self.open.pop() {
            Some((name, group)) => self.put(&name, Json::Object(group)),
            None => Err(SimError::IncompatibleShape("end_group without begin_group".into())),
        }
    }

    fn write_null(&mut self, name: &str) -> Result<()> {
        self.put(name, Json::Null)
    }

    fn write_scalar(&mut self, name: &str, value: f64) -> Result<()> {
        self.put(name, Json::from(value))
    }

    fn write_text(&mut self, name: &str, value: &str) -> Result<()> {
        self.put(name, Json::from(value))
    }

    fn write_labels(&mut self, name: &str, labels: &[String]) -> Result<()> {
        self.put(name, Json::from(labels.to_vec()))
    }

    fn write_array(&mut self, name: &str, array: &ArrayValue) -> Result<()> {
        let json = match array {
            ArrayValue::OneD(v) => Json::from(v.clone()),
            ArrayValue::TwoD { .. } => Json::Array(
                array
                    .rows()
                    .into_iter()
                    .map(|row| Json::from(row.to_vec()))
                    .collect(),
            ),
        };
        self.put(name, json)
    }
}

fn to_tree(records: &[Record], policy: NullPolicy) -> Result<Json> {
    let mut sink = JsonSink::new();
    write_records(&mut sink, records, policy)?;
    sink.finish()
}

/// Serialize records to a compact JSON string.
pub fn to_json(records: &[Record], policy: NullPolicy) -> Result<String> {
    Ok(serde_json::to_string(&to_tree(records, policy)?)?)
}

/// Serialize records to a pretty-printed JSON string.
pub fn to_json_pretty(records: &[Record], policy: NullPolicy) -> Result<String> {
    Ok(serde_json::to_string_pretty(&to_tree(records, policy)?)?)
}

/// Stream records as pretty-printed JSON into `writer`.
pub fn write_json<W: Write>(writer: W, records: &[Record], policy: NullPolicy) -> Result<()> {
    serde_json::to_writer_pretty(writer, &to_tree(records, policy)?)?;
    Ok(())
}
