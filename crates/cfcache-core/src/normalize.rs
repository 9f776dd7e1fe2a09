//! Kernel normalization
//!
//! Signal kernels are scaled so their center sample has unit amplitude;
//! weight kernels are divided by their complex integral over the support
//! square, which makes that integral exactly one. The integral is taken over
//! oversampled pixels and divided by `sampling²`, so it approximates the
//! integral in grid-pixel units.

use serde::{Deserialize, Serialize};

use crate::array::KernelArray;
use crate::types::Complex;

/// What a kernel is normalized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizeMode {
    /// Center amplitude = 1
    Peak,
    /// Sum over the support square / sampling² = 1
    Integral,
}

/// Outcome of a normalization pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NormalizeOutcome {
    /// Kernel was divided by `divisor`
    Normalized { divisor: Complex },
    /// Divisor was below epsilon; the kernel has been zeroed
    Degenerate { divisor: f64 },
}

impl NormalizeOutcome {
    /// Magnitude of the divisor that was (or would have been) applied.
    pub fn factor(&self) -> f64 {
        match self {
            NormalizeOutcome::Normalized { divisor } => divisor.norm(),
            NormalizeOutcome::Degenerate { divisor } => *divisor,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        matches!(self, NormalizeOutcome::Degenerate { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Normalizer {
    /// Smallest divisor magnitude accepted
    pub epsilon: f64,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self { epsilon: 1e-12 }
    }
}

impl Normalizer {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    /// Normalize `kernel` in place.
    ///
    /// `support_px` is the support radius in array pixels; it bounds the
    /// integration square for [`NormalizeMode::Integral`].
    pub fn normalize(
        &self,
        kernel: &mut KernelArray,
        support_px: usize,
        sampling: usize,
        mode: NormalizeMode,
    ) -> NormalizeOutcome {
        let divisor = match mode {
            NormalizeMode::Peak => {
                let c = kernel.center();
                Complex::new(kernel.get(c, c).norm(), 0.0)
            }
            NormalizeMode::Integral => integral(kernel, support_px, sampling),
        };

        if !(divisor.norm() >= self.epsilon) {
            kernel.zero();
            return NormalizeOutcome::Degenerate {
                divisor: divisor.norm(),
            };
        }

        kernel.scale(divisor.inv());
        NormalizeOutcome::Normalized { divisor }
    }

    /// The quantity `normalize` drives to one, for checking a stored kernel.
    ///
    /// Peak mode yields the center amplitude as a real number; integral mode
    /// yields the complex integral, so a leftover phase shows up as a
    /// non-zero imaginary part.
    pub fn measure(
        kernel: &KernelArray,
        support_px: usize,
        sampling: usize,
        mode: NormalizeMode,
    ) -> Complex {
        match mode {
            NormalizeMode::Peak => {
                let c = kernel.center();
                Complex::new(kernel.get(c, c).norm(), 0.0)
            }
            NormalizeMode::Integral => integral(kernel, support_px, sampling),
        }
    }
}

fn integral(kernel: &KernelArray, support_px: usize, sampling: usize) -> Complex {
    let s = sampling.max(1) as f64;
    kernel.centered_sum(support_px) / (s * s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bump(side: usize) -> KernelArray {
        let c = (side / 2) as f64;
        KernelArray::from_fn(side, |x, y| {
            let r2 = (x as f64 - c).powi(2) + (y as f64 - c).powi(2);
            Complex::new(3.0 * (-r2 / 18.0).exp(), 0.5 * (-r2 / 18.0).exp())
        })
    }

    #[test]
    fn test_peak_normalization() {
        let mut k = bump(32);
        let outcome = Normalizer::default().normalize(&mut k, 10, 4, NormalizeMode::Peak);
        assert!(!outcome.is_degenerate());
        let peak = Normalizer::measure(&k, 10, 4, NormalizeMode::Peak);
        assert_relative_eq!(peak.re, 1.0, max_relative = 1e-12);
        assert_eq!(peak.im, 0.0);
        assert_relative_eq!(outcome.factor(), (9.0f64 + 0.25).sqrt(), max_relative = 1e-12);
    }

    #[test]
    fn test_integral_normalization() {
        let mut k = bump(40);
        let outcome = Normalizer::default().normalize(&mut k, 12, 4, NormalizeMode::Integral);
        assert!(!outcome.is_degenerate());
        let integral = Normalizer::measure(&k, 12, 4, NormalizeMode::Integral);
        assert!((integral - Complex::new(1.0, 0.0)).norm() < 1e-6, "{}", integral);
        // the phase of the bump is divided out with its magnitude
        if let NormalizeOutcome::Normalized { divisor } = outcome {
            assert_relative_eq!(divisor.arg(), 0.5f64.atan2(3.0), epsilon = 1e-12);
        }
        let c = k.center();
        assert!(k.get(c, c).im.abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_divisor_zeroes_kernel() {
        let mut k = bump(16);
        let c = k.center();
        k.set(c, c, Complex::new(1e-15, 0.0));
        let outcome = Normalizer::default().normalize(&mut k, 4, 1, NormalizeMode::Peak);
        assert!(outcome.is_degenerate());
        assert!(k.is_all_zero());

        let mut zeros = KernelArray::zeros(16);
        let outcome = Normalizer::default().normalize(&mut zeros, 4, 1, NormalizeMode::Integral);
        assert_eq!(outcome, NormalizeOutcome::Degenerate { divisor: 0.0 });
    }
}
