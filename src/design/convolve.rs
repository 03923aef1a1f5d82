//! Linear convolution truncated to the input length.

use crate::hrf::HrfKernel;
use crate::types::Matrix;

/// Convolve `signal` with `kernel`, keeping the first `signal.len()` samples.
///
/// Equivalent to taking `full_convolution[0..signal.len()]`, so the output
/// length always equals the input length.
pub fn convolve_truncated(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    let n = signal.len();
    let mut out = vec![0.0; n];
    for (i, &x) in signal.iter().enumerate() {
        if x == 0.0 {
            continue;
        }
        for (k, &h) in kernel.iter().take(n - i).enumerate() {
            out[i + k] += x * h;
        }
    }
    out
}

/// Convolve every column of `matrix` with the HRF.
pub fn convolve_columns(matrix: &Matrix, hrf: &HrfKernel) -> Matrix {
    let mut out = matrix.clone();
    for (j, mut col) in out.column_iter_mut().enumerate() {
        let source: Vec<f64> = matrix.column(j).iter().copied().collect();
        let convolved = convolve_truncated(&source, hrf.values());
        col.iter_mut().zip(convolved).for_each(|(dst, v)| *dst = v);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hrf::HrfParams;

    #[test]
    fn test_impulse_reproduces_kernel() {
        let kernel = [0.0, 1.0, 0.5, 0.25];
        let out = convolve_truncated(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0], &kernel);
        assert_eq!(out, vec![0.0, 1.0, 0.5, 0.25, 0.0, 0.0]);
    }

    #[test]
    fn test_truncation_keeps_length() {
        let kernel = HrfKernel::try_from(HrfParams::canonical()).unwrap();
        for n in [0usize, 1, 5, 31, 32, 33, 200] {
            let boxcar: Vec<f64> = (0..n).map(|i| (i % 3 == 0) as u8 as f64).collect();
            assert_eq!(convolve_truncated(&boxcar, kernel.values()).len(), n);
        }
    }

    #[test]
    fn test_matches_full_convolution_prefix() {
        let x = [1.0, 2.0, 0.0, -1.0];
        let h = [0.5, 0.25];
        // full: [0.5, 1.25, 0.5, -0.5, -0.25]
        assert_eq!(convolve_truncated(&x, &h), vec![0.5, 1.25, 0.5, -0.5]);
    }

    #[test]
    fn test_columns_shape() {
        let kernel = HrfKernel::try_from(HrfParams::canonical()).unwrap();
        let m = Matrix::from_element(40, 3, 1.0);
        let c = convolve_columns(&m, &kernel);
        assert_eq!(c.shape(), (40, 3));
    }
}
