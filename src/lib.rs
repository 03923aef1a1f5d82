//! # simfmri
//!
//! Monte-Carlo simulation of event-related fMRI experiments.
//!
//! Each simulated iteration takes a trial sequence through the same
//! pipeline a real analysis would use:
//!
//! 1. **Design** ([`design`]): expand trials to TR resolution and build a
//!    boxcar or parametric design matrix, optionally orthogonalized and
//!    convolved with a double-gamma HRF ([`hrf`])
//! 2. **BOLD** ([`bold`]): sum ground-truth regressors and add noise from
//!    one of several models ([`noise`])
//! 3. **Fit** ([`glm`]): normalize ([`norm`]) and fit an OLS GLM with a
//!    trailing dummy regressor
//!
//! Results are stored as nested [`Record`]s, persisted through a
//! [`HierarchySink`](output::HierarchySink) and summarized across
//! iterations with streaming histograms ([`statistics`], [`analysis`]).
//!
//! ## Quick Start
//!
//! ```no_run
//! use simfmri::{analysis, random_trials, Experiment, ExperimentConfig, ModelSpec, RunConfig, Runner};
//!
//! let runner = Runner::new(RunConfig::new(100).ncore(4), |_code, prng| {
//!     let (trials, prng) = random_trials(2, 60, true, prng);
//!     Experiment::with_unit_durations(trials, ExperimentConfig::default(), prng)?
//!         .model(ModelSpec::boxcar("model_01", ["box_1"]))
//! });
//!
//! let records = runner.go(true)?;
//! let t = analysis::summary(&records, "model_01", "t")?;
//! println!("mean t for box_1: {:.2}", t["box_1"].mean);
//! # Ok::<(), simfmri::SimError>(())
//! ```
//!
//! Every stochastic step takes a [`Prng`] by value and returns it advanced,
//! so a run is fully determined by its [`RunConfig`] seeds.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
mod config;
mod error;
mod types;

// Functional modules
pub mod analysis;
pub mod bold;
pub mod design;
pub mod experiment;
pub mod glm;
pub mod hrf;
pub mod noise;
pub mod norm;
pub mod output;
pub mod record;
pub mod runner;
pub mod statistics;
pub mod thread_pool;
pub mod timing;

// Re-exports for public API
pub use config::{ExperimentConfig, RunConfig, SEED_OFFSET, SERIAL_SEED};
pub use design::{build, DesignBuilder, DesignKind, DesignMatrix};
pub use error::{Result, SimError};
pub use experiment::{random_trials, BoldSource, Experiment, ModelSpec};
pub use glm::{Contrast, FitResult, Glm};
pub use hrf::{double_gamma, HrfKernel, HrfParams};
pub use noise::NoiseModel;
pub use norm::Normalization;
pub use output::NullPolicy;
pub use record::{ArrayValue, Record, Value};
pub use runner::{create_chunks, reduce_chunks, Runner};
pub use statistics::HistogramAccumulator;
pub use types::{from_entropy, process_prng, seeded, Condition, Matrix, Prng, Vector};
