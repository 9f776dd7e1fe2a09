//! w-term phase screen
//!
//! Non-coplanar baselines see the sky through an extra phase
//! `exp(−2πi·w·(n − 1))` with `n = sqrt(1 − l² − m²)`. Each w-plane of the
//! cache bakes that phase into its kernels.

use std::f64::consts::PI;

use super::PhaseRampProvider;
use crate::types::{Complex, DirectionOffset};

/// Standard w-projection phase screen.
///
/// Pixels where the phase changes by more than π between neighbouring screen
/// samples are aliased and are returned as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WTermPhase;

impl PhaseRampProvider for WTermPhase {
    fn phase(&self, offset: DirectionOffset, w: f64, cell_size_rad: f64) -> Complex {
        let (l, m) = offset;
        let r2 = l * l + m * m;
        if r2 >= 1.0 {
            return Complex::new(0.0, 0.0);
        }
        if w == 0.0 {
            return Complex::new(1.0, 0.0);
        }
        let n = (1.0 - r2).sqrt();
        // |d(phase)/dr| = 2π|w|·r/n
        let step = 2.0 * PI * w.abs() * r2.sqrt() / n * cell_size_rad;
        if step > PI {
            return Complex::new(0.0, 0.0);
        }
        Complex::from_polar(1.0, -2.0 * PI * w * (n - 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_w_is_unity() {
        assert_eq!(WTermPhase.phase((0.1, 0.1), 0.0, 1e-3), Complex::new(1.0, 0.0));
    }

    #[test]
    fn test_unit_modulus_and_phase() {
        let (l, m) = (0.01, 0.02);
        let w = 250.0;
        let p = WTermPhase.phase((l, m), w, 1e-4);
        assert_relative_eq!(p.norm(), 1.0, epsilon = 1e-12);
        let n = (1.0 - l * l - m * m).sqrt();
        let expected = -2.0 * PI * w * (n - 1.0);
        assert_relative_eq!(p.arg(), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_horizon_and_aliasing_are_zeroed() {
        assert_eq!(WTermPhase.phase((0.8, 0.8), 10.0, 1e-4), Complex::new(0.0, 0.0));
        // huge w with coarse pixels aliases
        assert_eq!(WTermPhase.phase((0.3, 0.0), 1.0e6, 1e-2), Complex::new(0.0, 0.0));
    }
}
