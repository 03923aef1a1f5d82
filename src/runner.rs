//! Chunked, reproducible execution of many experiment iterations.
//!
//! Iterations are split into `ncore` equal chunks. Chunk `g` gets its own
//! PRNG seeded with `g + seed_offset`, threaded sequentially through that
//! chunk's iterations, so results depend only on the configuration and not
//! on scheduling. Chunk results are flattened in chunk order once every
//! chunk has finished.

use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::RunConfig;
use crate::error::{Result, SimError};
use crate::experiment::Experiment;
use crate::record::Record;
use crate::types::{seeded, Prng};

/// Split `0..nrun` into `ncore` consecutive chunks of equal size.
pub fn create_chunks(nrun: usize, ncore: usize) -> Result<Vec<Vec<usize>>> {
    RunConfig::new(nrun).ncore(ncore).validate()?;
    let size = nrun / ncore;
    Ok((0..ncore).map(|g| (g * size..(g + 1) * size).collect()).collect())
}

/// Flatten chunked results, keeping chunk order.
pub fn reduce_chunks<T>(chunks: Vec<Vec<T>>) -> Vec<T> {
    chunks.into_iter().flatten().collect()
}

/// Runs one experiment per iteration, built by a factory closure.
///
/// The factory receives the batch code and the chunk's PRNG, and must hand
/// the PRNG to the experiment it builds (possibly after drawing trials from
/// it) so the stream continues across iterations.
pub struct Runner<F> {
    config: RunConfig,
    factory: F,
}

impl<F> Runner<F>
where
    F: Fn(usize, Prng) -> Result<Experiment> + Sync,
{
    /// Runner over `config.nrun` iterations.
    pub fn new(config: RunConfig, factory: F) -> Self {
        Self { config, factory }
    }

    /// Run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run every iteration on one PRNG seeded with `serial_seed`.
    pub fn run_serial(&self) -> Result<Vec<Record>> {
        let codes: Vec<usize> = (0..self.config.nrun).collect();
        info!(nrun = self.config.nrun, seed = self.config.serial_seed, "starting serial run");
        self.run_chunk(&codes, self.config.serial_seed)
    }

    /// Run chunks concurrently on the shared pool.
    ///
    /// Without the `parallel` feature chunks run one after another, with
    /// identical results.
    pub fn run_parallel(&self) -> Result<Vec<Record>> {
        let chunks = create_chunks(self.config.nrun, self.config.ncore)?;
        let offset = self.config.seed_offset;
        info!(nrun = self.config.nrun, ncore = self.config.ncore, "starting chunked run");

        #[cfg(feature = "parallel")]
        let results: Result<Vec<Vec<Record>>> = crate::thread_pool::install(|| {
            chunks
                .par_iter()
                .enumerate()
                .map(|(g, codes)| self.run_chunk(codes, g as u64 + offset))
                .collect()
        });

        #[cfg(not(feature = "parallel"))]
        let results: Result<Vec<Vec<Record>>> = chunks
            .iter()
            .enumerate()
            .map(|(g, codes)| self.run_chunk(codes, g as u64 + offset))
            .collect();

        Ok(reduce_chunks(results?))
    }

    /// Run serially or in chunks.
    pub fn go(&self, parallel: bool) -> Result<Vec<Record>> {
        if parallel {
            self.run_parallel()
        } else {
            self.run_serial()
        }
    }

    fn run_chunk(&self, codes: &[usize], seed: u64) -> Result<Vec<Record>> {
        let mut prng = seeded(seed);
        let mut records = Vec::with_capacity(codes.len());
        for &code in codes {
            debug!(code, seed, "experiment");
            let (record, next) = (self.factory)(code, prng)
                .and_then(|exp| exp.run(code))
                .map_err(|e| SimError::Iteration {
                    index: code,
                    seed,
                    source: Box::new(e),
                })?;
            prng = next;
            records.push(record);
        }
        Ok(records)
    }
}
