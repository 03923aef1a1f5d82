//! Type aliases and common types.

use nalgebra::{DMatrix, DVector};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Column-oriented numeric matrix (rows = TR units, columns = regressors).
pub type Matrix = DMatrix<f64>;

/// Dense numeric vector.
pub type Vector = DVector<f64>;

/// The pseudo-random stream threaded through every stochastic operation.
///
/// Operations take the generator by value and hand it back advanced, so a
/// caller always continues from the state the previous draw left behind.
pub type Prng = Xoshiro256PlusPlus;

/// Create a deterministic PRNG from a seed.
pub fn seeded(seed: u64) -> Prng {
    Xoshiro256PlusPlus::seed_from_u64(seed)
}

/// Create a PRNG seeded from operating-system entropy.
pub fn from_entropy() -> Prng {
    Xoshiro256PlusPlus::from_os_rng()
}

/// Resolve an optional seed into a PRNG.
pub fn process_prng(seed: Option<u64>) -> Prng {
    match seed {
        Some(seed) => seeded(seed),
        None => from_entropy(),
    }
}

/// Condition label of one TR unit. `0` is baseline.
pub type Condition = u32;
