//! Error type shared by every simulation stage.

use thiserror::Error;

/// Errors raised by the simulation, fitting and aggregation stages.
///
/// Numerical degeneracy (zero-variance or zero-mean columns) is not an error;
/// see [`crate::norm`] for the substitution policy.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SimError {
    /// Trial, impulse, duration or data sequences disagree in length.
    #[error("length mismatch: {what} has length {found}, expected {expected}")]
    LengthMismatch {
        /// Which sequence was inconsistent.
        what: String,
        /// Length the caller should have supplied.
        expected: usize,
        /// Length actually supplied.
        found: usize,
    },

    /// A noise, HRF or run parameter lies outside its valid domain.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// Design-matrix columns cannot be grouped by condition.
    #[error("incompatible shape: {0}")]
    IncompatibleShape(String),

    /// Statistics requested before a model was fitted.
    #[error("no model has been fitted yet; call fit() first")]
    NotFitted,

    /// A design-matrix, noise or normalization kind was not recognized.
    #[error("unknown {kind} `{name}`; valid options are: {}", valid.join(", "))]
    UnknownConfiguration {
        /// Category of the lookup (e.g. "noise model").
        kind: &'static str,
        /// Name that failed to resolve.
        name: String,
        /// Names that would have been accepted.
        valid: &'static [&'static str],
    },

    /// A model referenced data that the experiment does not carry.
    #[error("model `{model}` references missing data `{name}`")]
    MissingData {
        /// Model being built.
        model: String,
        /// Name of the absent column or data array.
        name: String,
    },

    /// One simulation iteration failed; the run is aborted.
    #[error("iteration {index} (seed {seed}) failed: {source}")]
    Iteration {
        /// Iteration index (batch code) that failed.
        index: usize,
        /// Seed of the PRNG stream the iteration ran on.
        seed: u64,
        /// Underlying failure.
        #[source]
        source: Box<SimError>,
    },

    /// Output backend failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SimError {
    pub(crate) fn length(what: impl Into<String>, expected: usize, found: usize) -> Self {
        SimError::LengthMismatch {
            what: what.into(),
            expected,
            found,
        }
    }

    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        SimError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SimError>;
