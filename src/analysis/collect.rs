//! Turn stored records into per-condition histograms.

use tracing::debug;

use crate::error::{Result, SimError};
use crate::record::{Record, Value};
use crate::statistics::{HistogramAccumulator, DEFAULT_DECIMALS};

/// Histograms of `stat` for `model` across all records.
///
/// An array statistic yields one histogram per entry except the last, which
/// belongs to the dummy regressor. Histograms are named after the model's
/// design-matrix columns. A scalar statistic yields a single histogram
/// named after the statistic. Null entries are skipped.
pub fn create_hist_list(records: &[Record], model: &str, stat: &str) -> Result<Vec<HistogramAccumulator>> {
    let mut hists: Vec<HistogramAccumulator> = Vec::new();

    for record in records {
        let group = record.model(model).ok_or_else(|| SimError::MissingData {
            model: model.to_string(),
            name: model.to_string(),
        })?;
        let value = group.get(stat).ok_or_else(|| SimError::MissingData {
            model: model.to_string(),
            name: stat.to_string(),
        })?;

        match value {
            Value::Null => continue,
            Value::Scalar(x) => {
                if hists.is_empty() {
                    hists.push(HistogramAccumulator::new(stat));
                }
                hists[0].add(*x);
            }
            Value::Array(array) => {
                let rows = array.rows();
                let entries = match rows.as_slice() {
                    [row] => *row,
                    _ => {
                        return Err(SimError::IncompatibleShape(format!(
                            "statistic `{stat}` of `{model}` is two-dimensional {:?}",
                            array.shape()
                        )))
                    }
                };
                let keep = entries.len().saturating_sub(1);
                while hists.len() < keep {
                    let name = column_name(group.get("meta"), hists.len(), stat);
                    hists.push(HistogramAccumulator::new(name));
                }
                for (hist, &x) in hists.iter_mut().zip(&entries[..keep]) {
                    hist.add(x);
                }
            }
            _ => {
                return Err(SimError::IncompatibleShape(format!(
                    "statistic `{stat}` of `{model}` is not numeric"
                )))
            }
        }
    }

    debug!(model, stat, histograms = hists.len(), records = records.len(), "collected histograms");
    Ok(hists)
}

fn column_name(meta: Option<&Value>, index: usize, stat: &str) -> String {
    meta.and_then(|m| m.get("dm"))
        .and_then(Value::as_labels)
        .and_then(|names| names.get(index))
        .cloned()
        .unwrap_or_else(|| format!("{stat}_{index}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ArrayValue, Mapping};

    fn record(t: Vec<f64>, aic: f64) -> Record {
        let mut meta = Mapping::new();
        meta.insert("dm".into(), vec!["baseline".to_string(), "box_1".to_string()].into());
        let mut model = Mapping::new();
        model.insert("t".into(), t.into());
        model.insert("aic".into(), aic.into());
        model.insert("meta".into(), meta.into());
        let mut r = Record::new();
        r.insert("boxcar", model);
        r
    }

    #[test]
    fn test_array_stat_drops_dummy() {
        let records = vec![record(vec![1.0, 2.0, 9.0], 5.0), record(vec![3.0, 4.0, 9.0], 6.0)];
        let hists = create_hist_list(&records, "boxcar", "t").unwrap();
        assert_eq!(hists.len(), 2);
        assert_eq!(hists[0].name(), "baseline");
        assert_eq!(hists[1].name(), "box_1");
        assert!((hists[0].mean() - 2.0).abs() < 1e-12);
        assert_eq!(hists[1].n(), 2);
    }

    #[test]
    fn test_scalar_stat_single_histogram() {
        let records = vec![record(vec![0.0, 0.0], 5.0), record(vec![0.0, 0.0], 7.0)];
        let hists = create_hist_list(&records, "boxcar", "aic").unwrap();
        assert_eq!(hists.len(), 1);
        assert_eq!(hists[0].name(), "aic");
        assert!((hists[0].mean() - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_stat() {
        let records = vec![record(vec![1.0], 1.0)];
        assert!(matches!(
            create_hist_list(&records, "boxcar", "bic"),
            Err(SimError::MissingData { .. })
        ));
        assert!(matches!(
            create_hist_list(&records, "other", "t"),
            Err(SimError::MissingData { .. })
        ));
    }

    #[test]
    fn test_two_dimensional_stat_rejected() {
        let mut r = record(vec![1.0], 1.0);
        let mut model = r.model("boxcar").cloned().unwrap();
        model.insert(
            "ci".into(),
            Value::Array(ArrayValue::TwoD { rows: 2, cols: 2, data: vec![0.0; 4] }),
        );
        r.insert("boxcar", model);
        assert!(matches!(
            create_hist_list(&[r], "boxcar", "ci"),
            Err(SimError::IncompatibleShape(_))
        ));
    }

    #[test]
    fn test_unnamed_columns_fall_back() {
        let mut model = Mapping::new();
        model.insert("beta".into(), vec![1.0, 2.0, 3.0].into());
        let mut r = Record::new();
        r.insert("m", model);
        let hists = create_hist_list(&[r], "m", "beta").unwrap();
        assert_eq!(hists[1].name(), "beta_1");
        assert_eq!(hists[1].decimals(), DEFAULT_DECIMALS);
    }
}
