//! Synthetic BOLD signals: ground-truth regressors plus noise.

use crate::design::convolve_truncated;
use crate::error::Result;
use crate::hrf::HrfKernel;
use crate::noise::NoiseModel;
use crate::types::{Matrix, Prng};

/// Build a noisy BOLD signal from one or more regressor columns.
///
/// Columns are summed row-wise. When `hrf` is given the sum is convolved
/// (for regressors that were not convolved already) before a noise trace
/// of the same length is added.
pub fn synthesize(
    columns: &Matrix,
    noise: &NoiseModel,
    hrf: Option<&HrfKernel>,
    prng: Prng,
) -> Result<(Vec<f64>, Prng)> {
    let summed: Vec<f64> = columns.row_iter().map(|row| row.sum()).collect();
    synthesize_signal(summed, noise, hrf, prng)
}

/// Same as [`synthesize`] for an already one-dimensional regressor.
pub fn synthesize_signal(
    signal: Vec<f64>,
    noise: &NoiseModel,
    hrf: Option<&HrfKernel>,
    prng: Prng,
) -> Result<(Vec<f64>, Prng)> {
    let mut bold = match hrf {
        Some(hrf) => convolve_truncated(&signal, hrf.values()),
        None => signal,
    };

    let (trace, prng) = noise.generate(bold.len(), prng)?;
    bold.iter_mut().zip(&trace).for_each(|(b, n)| *b += n);
    Ok((bold, prng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hrf::HrfParams;
    use crate::noise::white;
    use crate::types::seeded;

    #[test]
    fn test_zero_noise_is_column_sum() {
        let m = Matrix::from_row_slice(3, 2, &[1.0, 2.0, 0.0, 1.0, 3.0, 3.0]);
        let (bold, _) = synthesize(&m, &NoiseModel::White { sigma: 0.0 }, None, seeded(0)).unwrap();
        assert_eq!(bold, vec![3.0, 1.0, 6.0]);
    }

    #[test]
    fn test_noise_is_added() {
        let m = Matrix::zeros(20, 1);
        let (bold, _) = synthesize(&m, &NoiseModel::White { sigma: 1.0 }, None, seeded(4)).unwrap();
        let (expected, _) = white(20, 1.0, seeded(4)).unwrap();
        assert_eq!(bold, expected);
    }

    #[test]
    fn test_convolution_pass() {
        let hrf = HrfKernel::try_from(HrfParams::canonical()).unwrap();
        let mut impulse = vec![0.0; 40];
        impulse[0] = 1.0;
        let (bold, _) =
            synthesize_signal(impulse, &NoiseModel::White { sigma: 0.0 }, Some(&hrf), seeded(0)).unwrap();
        assert_eq!(bold.len(), 40);
        assert!((bold[5] - hrf.values()[5]).abs() < 1e-12);
    }
}
