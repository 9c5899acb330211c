//! Vectors of complex numbers and the radix-2 Fast Fourier Transform.

use super::{AnalysisError, ComplexNumber};
use std::f64::consts::PI;
use std::ops::Index;

/// An ordered sequence of complex numbers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComplexVector {
    values: Vec<ComplexNumber>,
}

impl ComplexVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: Vec<ComplexNumber>) -> Self {
        Self { values }
    }

    /// Builds a vector of real values with zero imaginary parts.
    pub fn from_real(samples: &[f64]) -> Self {
        Self {
            values: samples.iter().map(|&s| ComplexNumber::from(s)).collect(),
        }
    }

    pub fn push(&mut self, value: ComplexNumber) {
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ComplexNumber> {
        self.values.iter()
    }

    pub fn as_slice(&self) -> &[ComplexNumber] {
        &self.values
    }

    pub fn into_values(self) -> Vec<ComplexNumber> {
        self.values
    }

    /// Computes the discrete Fourier transform.
    ///
    /// The forward transform computes `X[k] = Σ x[n] e^(-2πikn/N)`. The
    /// inverse uses the conjugate exponent and divides every output by N, so
    /// `fft(fft(x, false), true)` reproduces `x`.
    ///
    /// # Arguments
    ///
    /// * `inverse` - Compute the inverse transform
    ///
    /// # Returns
    ///
    /// The transformed vector
    ///
    /// # Errors
    ///
    /// Fails if the vector is empty or its length is not a power of 2
    pub fn fft(&self, inverse: bool) -> Result<ComplexVector, AnalysisError> {
        let n = self.values.len();
        if n == 0 {
            return Err(AnalysisError::EmptyInput);
        }
        if !n.is_power_of_two() {
            return Err(AnalysisError::NotPowerOfTwo(n));
        }

        let sign = if inverse { 1.0 } else { -1.0 };
        let mut values = fft_recursive(&self.values, sign);
        if inverse {
            let scale = n as f64;
            for value in &mut values {
                *value = *value / scale;
            }
        }
        Ok(ComplexVector { values })
    }
}

/// Decimation in time: transform the even and odd halves, then combine.
fn fft_recursive(input: &[ComplexNumber], sign: f64) -> Vec<ComplexNumber> {
    let n = input.len();
    if n == 1 {
        return vec![input[0]];
    }

    let even: Vec<ComplexNumber> = input.iter().step_by(2).copied().collect();
    let odd: Vec<ComplexNumber> = input.iter().skip(1).step_by(2).copied().collect();
    let even = fft_recursive(&even, sign);
    let odd = fft_recursive(&odd, sign);

    let half = n / 2;
    let mut output = vec![ComplexNumber::new(0.0, 0.0); n];
    for k in 0..half {
        let twiddle = ComplexNumber::from_polar(1.0, sign * 2.0 * PI * k as f64 / n as f64);
        let product = twiddle * odd[k];
        output[k] = even[k] + product;
        output[k + half] = even[k] - product;
    }
    output
}

impl Index<usize> for ComplexVector {
    type Output = ComplexNumber;

    fn index(&self, index: usize) -> &ComplexNumber {
        &self.values[index]
    }
}

impl FromIterator<ComplexNumber> for ComplexVector {
    fn from_iter<I: IntoIterator<Item = ComplexNumber>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-random input (xorshift).
    fn random_vector(len: usize, seed: u64) -> ComplexVector {
        let mut state = seed;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state % 2000) as f64 / 1000.0 - 1.0
        };
        (0..len)
            .map(|_| ComplexNumber::new(next(), next()))
            .collect()
    }

    fn naive_dft(input: &ComplexVector) -> Vec<ComplexNumber> {
        let n = input.len();
        (0..n)
            .map(|k| {
                let mut sum = ComplexNumber::new(0.0, 0.0);
                for (j, value) in input.iter().enumerate() {
                    let angle = -2.0 * PI * (k * j) as f64 / n as f64;
                    sum += *value * ComplexNumber::from_polar(1.0, angle);
                }
                sum
            })
            .collect()
    }

    #[test]
    fn test_inverse_of_forward() {
        for (len, seed) in [(8usize, 1u64), (16, 7), (1024, 42)] {
            let input = random_vector(len, seed);
            let spectrum = input.fft(false).unwrap();
            let output = spectrum.fft(true).unwrap();
            for (a, b) in input.iter().zip(output.iter()) {
                let error = (*a - *b).norm();
                assert!(error <= 1e-9 * a.norm().max(1.0), "len {len}: {a} vs {b}");
            }
        }
    }

    #[test]
    fn test_matches_naive_dft() {
        let input = random_vector(32, 3);
        let fast = input.fft(false).unwrap();
        for (a, b) in fast.iter().zip(naive_dft(&input)) {
            assert!((*a - b).norm() < 1e-9);
        }
    }

    #[test]
    fn test_impulse_is_flat() {
        let mut samples = vec![0.0; 8];
        samples[0] = 1.0;
        let spectrum = ComplexVector::from_real(&samples).fft(false).unwrap();
        for value in spectrum.iter() {
            assert!((value.re - 1.0).abs() < 1e-12);
            assert!(value.im.abs() < 1e-12);
        }
    }

    #[test]
    fn test_single_value() {
        let input = ComplexVector::from_values(vec![ComplexNumber::new(3.0, -1.0)]);
        assert_eq!(input.fft(false).unwrap(), input);
        assert_eq!(input.fft(true).unwrap(), input);
    }

    #[test]
    fn test_invalid_lengths() {
        assert!(matches!(
            ComplexVector::new().fft(false),
            Err(AnalysisError::EmptyInput)
        ));
        assert!(matches!(
            ComplexVector::from_real(&[1.0, 2.0, 3.0]).fft(false),
            Err(AnalysisError::NotPowerOfTwo(3))
        ));
    }
}
