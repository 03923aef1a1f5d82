//! Configuration for experiments and simulation runs.
//!
//! Both structs deserialize from JSON with every field optional, falling
//! back to the defaults below.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::hrf::HrfParams;
use crate::noise::NoiseModel;

/// Seed of the single stream used by a serial run.
pub const SERIAL_SEED: u64 = 42;

/// Offset added to the chunk index to seed each parallel stream.
pub const SEED_OFFSET: u64 = 10;

/// Settings shared by every iteration of an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Repetition time in seconds (default: 1.0).
    pub tr: f64,

    /// Inter-stimulus interval in seconds. When it is a multiple of the TR,
    /// trials and data are padded with baseline to TR resolution
    /// (default: unset, trials are already in TR units).
    pub isi: Option<f64>,

    /// HRF shape and sampling (default: canonical double gamma).
    pub hrf: HrfParams,

    /// Redraw one HRF parameter per iteration with this fraction
    /// (default: disabled).
    pub hrf_perturbation: Option<f64>,

    /// Noise added to every synthesized BOLD signal (default: white, σ = 1).
    pub noise: NoiseModel,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            tr: 1.0,
            isi: None,
            hrf: HrfParams::canonical(),
            hrf_perturbation: None,
            noise: NoiseModel::default(),
        }
    }
}

impl ExperimentConfig {
    /// Set the repetition time.
    pub fn tr(mut self, tr: f64) -> Self {
        self.tr = tr;
        self
    }

    /// Set the inter-stimulus interval.
    pub fn isi(mut self, isi: f64) -> Self {
        self.isi = Some(isi);
        self
    }

    /// Set the HRF parameters.
    pub fn hrf(mut self, hrf: HrfParams) -> Self {
        self.hrf = hrf;
        self
    }

    /// Perturb the HRF once per iteration.
    pub fn hrf_perturbation(mut self, fraction: f64) -> Self {
        self.hrf_perturbation = Some(fraction);
        self
    }

    /// Set the noise model.
    pub fn noise(mut self, noise: NoiseModel) -> Self {
        self.noise = noise;
        self
    }
}

/// How many iterations to run and how to split them across workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Total number of iterations (default: 100).
    pub nrun: usize,

    /// Number of chunks run concurrently; must divide `nrun` (default: 1).
    pub ncore: usize,

    /// Chunk `g` is seeded with `g + seed_offset` (default: 10).
    pub seed_offset: u64,

    /// Seed of a serial run (default: 42).
    pub serial_seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            nrun: 100,
            ncore: 1,
            seed_offset: SEED_OFFSET,
            serial_seed: SERIAL_SEED,
        }
    }
}

impl RunConfig {
    /// `nrun` iterations in a single chunk.
    pub fn new(nrun: usize) -> Self {
        Self {
            nrun,
            ..Self::default()
        }
    }

    /// Set the number of chunks.
    pub fn ncore(mut self, ncore: usize) -> Self {
        self.ncore = ncore;
        self
    }

    /// Set the chunk seed offset.
    pub fn seed_offset(mut self, offset: u64) -> Self {
        self.seed_offset = offset;
        self
    }

    /// Set the serial-run seed.
    pub fn serial_seed(mut self, seed: u64) -> Self {
        self.serial_seed = seed;
        self
    }

    /// Load from a JSON object; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.ncore == 0 {
            return Err(SimError::invalid("ncore", "must be at least 1"));
        }
        if self.nrun % self.ncore != 0 {
            return Err(SimError::invalid(
                "ncore",
                format!("{} chunks must evenly divide {} runs", self.ncore, self.nrun),
            ));
        }
        Ok(())
    }
}
