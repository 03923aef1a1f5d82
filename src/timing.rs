//! Trial timing: duration expansion, sub-trial drop masks and ISI to TR conversion.

use crate::error::{Result, SimError};
use crate::types::Condition;

/// Trials expanded to TR resolution.
///
/// Each expanded row remembers which original trial it came from and
/// whether a drop mask removed it from modeling.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    labels: Vec<Condition>,
    origin: Vec<usize>,
    kept: Vec<bool>,
}

impl Timeline {
    /// Expand `trials` by `durations`, optionally masking sub-trial positions.
    ///
    /// `drop[j] == true` removes position `j` of every trial. Mask entries
    /// beyond a trial's duration are ignored; a mask longer than the longest
    /// duration is rejected.
    pub fn expand(trials: &[Condition], durations: &[usize], drop: Option<&[bool]>) -> Result<Self> {
        if trials.len() != durations.len() {
            return Err(SimError::length("durations", trials.len(), durations.len()));
        }
        if let Some(mask) = drop {
            let longest = durations.iter().copied().max().unwrap_or(0);
            if mask.len() > longest {
                return Err(SimError::invalid(
                    "drop",
                    format!("mask length {} exceeds the longest duration {}", mask.len(), longest),
                ));
            }
        }

        let total: usize = durations.iter().sum();
        let mut labels = Vec::with_capacity(total);
        let mut origin = Vec::with_capacity(total);
        let mut kept = Vec::with_capacity(total);

        for (trial, (&label, &dur)) in trials.iter().zip(durations).enumerate() {
            for j in 0..dur {
                let dropped = drop.and_then(|m| m.get(j)).copied().unwrap_or(false);
                labels.push(label);
                origin.push(trial);
                kept.push(!dropped);
            }
        }

        Ok(Self { labels, origin, kept })
    }

    /// Number of TR units.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True if the timeline has no rows.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Condition label of each TR unit (drop mask not applied).
    pub fn labels(&self) -> &[Condition] {
        &self.labels
    }

    /// Labels with dropped positions replaced by `drop_value`.
    pub fn masked_labels(&self, drop_value: Condition) -> Vec<Condition> {
        self.labels
            .iter()
            .zip(&self.kept)
            .map(|(&l, &k)| if k { l } else { drop_value })
            .collect()
    }

    /// Broadcast per-trial values onto the timeline; dropped positions get 0.
    pub fn broadcast(&self, per_trial: &[f64]) -> Vec<f64> {
        self.origin
            .iter()
            .zip(&self.kept)
            .map(|(&i, &k)| if k { per_trial[i] } else { 0.0 })
            .collect()
    }
}

/// Repeat each element of `values` by its duration, replacing masked
/// positions with `drop_value`.
pub fn dtime<T: Clone>(values: &[T], durations: &[usize], drop: Option<&[bool]>, drop_value: T) -> Result<Vec<T>> {
    if values.len() != durations.len() {
        return Err(SimError::length("durations", values.len(), durations.len()));
    }

    let mut out = Vec::with_capacity(durations.iter().sum());
    for (value, &dur) in values.iter().zip(durations) {
        for j in 0..dur {
            let dropped = drop.and_then(|m| m.get(j)).copied().unwrap_or(false);
            out.push(if dropped { drop_value.clone() } else { value.clone() });
        }
    }
    Ok(out)
}

/// Number of TR units per ISI, or an error if ISI is not a whole multiple of TR.
pub fn isi_multiplier(tr: f64, isi: f64) -> Result<usize> {
    if !(tr.is_finite() && tr > 0.0) {
        return Err(SimError::invalid("tr", format!("must be positive, got {tr}")));
    }
    if !(isi.is_finite() && isi > 0.0) {
        return Err(SimError::invalid("isi", format!("must be positive, got {isi}")));
    }

    let ratio = isi / tr;
    let mult = ratio.round();
    if (ratio - mult).abs() > 1e-9 || mult < 1.0 {
        return Err(SimError::invalid(
            "isi",
            format!("ISI ({isi}) must be an even multiple of the TR ({tr})"),
        ));
    }
    Ok(mult as usize)
}

/// Place each element at the start of an ISI slot, padding with `fill`.
///
/// With `mult = 3`, `[a, b]` becomes `[a, fill, fill, b, fill, fill]`.
pub fn isi_expand<T: Clone>(values: &[T], mult: usize, fill: T) -> Vec<T> {
    let mut out = Vec::with_capacity(values.len() * mult);
    for v in values {
        out.push(v.clone());
        out.extend(std::iter::repeat(fill.clone()).take(mult.saturating_sub(1)));
    }
    out
}

/// Insert `empty` into behavioral `data` wherever `conditions` is baseline.
///
/// Behavioral recordings usually omit jitter periods; entries of `data`
/// are consumed in order for every non-zero condition.
pub fn add_empty<T: Clone>(data: &[T], conditions: &[Condition], empty: T) -> Result<Vec<T>> {
    let needed = conditions.iter().filter(|&&c| c != 0).count();
    if needed != data.len() {
        return Err(SimError::length("data", needed, data.len()));
    }

    let mut out = vec![empty; conditions.len()];
    let slots = conditions.iter().enumerate().filter(|(_, &c)| c != 0).map(|(i, _)| i);
    for (slot, value) in slots.zip(data) {
        out[slot] = value.clone();
    }
    Ok(out)
}
