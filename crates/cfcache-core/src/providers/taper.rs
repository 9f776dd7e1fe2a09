//! Sky-screen tapers
//!
//! The taper suppresses the screen edges so the transformed kernel does not
//! ring. The Kaiser–Bessel shape is the usual choice for gridding; its
//! shape parameter trades main-lobe width for sidelobe level exactly as in
//! FIR window design.

use super::{TaperProvider, TaperScale};
use crate::types::DirectionOffset;

/// Separable Kaiser–Bessel taper: `I0(β·sqrt(1−u²)) / I0(β)` per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KaiserTaper {
    pub beta: f64,
}

impl Default for KaiserTaper {
    fn default() -> Self {
        Self { beta: 4.0 }
    }
}

impl KaiserTaper {
    pub fn new(beta: f64) -> Self {
        Self { beta }
    }

    fn axis(&self, u: f64) -> f64 {
        if u.abs() > 1.0 {
            return 0.0;
        }
        bessel_i0(self.beta * (1.0 - u * u).sqrt()) / bessel_i0(self.beta)
    }
}

impl TaperProvider for KaiserTaper {
    fn apodization(&self, offset: DirectionOffset, scale: &TaperScale) -> f64 {
        if scale.half_width <= 0.0 {
            return 0.0;
        }
        self.axis(offset.0 / scale.half_width) * self.axis(offset.1 / scale.half_width)
    }
}

/// No apodization.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UniformTaper;

impl TaperProvider for UniformTaper {
    fn apodization(&self, _offset: DirectionOffset, _scale: &TaperScale) -> f64 {
        1.0
    }
}

/// Modified Bessel function of the first kind, order 0
///
/// Uses polynomial approximation (Abramowitz and Stegun)
fn bessel_i0(x: f64) -> f64 {
    if x.abs() < 1e-10 {
        return 1.0;
    }

    let ax = x.abs();

    if ax < 3.75 {
        let t = (x / 3.75).powi(2);
        1.0 + t
            * (3.5156229
                + t * (3.0899424
                    + t * (1.2067492 + t * (0.2659732 + t * (0.0360768 + t * 0.0045813)))))
    } else {
        let t = 3.75 / ax;
        (ax.exp() / ax.sqrt())
            * (0.39894228
                + t * (0.01328592
                    + t * (0.00225319
                        + t * (-0.00157565
                            + t * (0.00916281
                                + t * (-0.02057706
                                    + t * (0.02635537 + t * (-0.01647633 + t * 0.00392377))))))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bessel_i0_known_values() {
        assert_relative_eq!(bessel_i0(0.0), 1.0);
        assert_relative_eq!(bessel_i0(1.0), 1.266_065_9, epsilon = 1e-6);
        assert_relative_eq!(bessel_i0(5.0), 27.239_871_8, max_relative = 1e-6);
    }

    #[test]
    fn test_kaiser_taper_shape() {
        let taper = KaiserTaper::new(6.0);
        let scale = TaperScale { half_width: 0.5 };
        assert_relative_eq!(taper.apodization((0.0, 0.0), &scale), 1.0);
        let mid = taper.apodization((0.25, 0.0), &scale);
        let edge = taper.apodization((0.49, 0.0), &scale);
        assert!(mid < 1.0 && edge < mid && edge > 0.0);
        assert_eq!(taper.apodization((0.6, 0.0), &scale), 0.0);
        // separable and symmetric
        assert_relative_eq!(
            taper.apodization((0.1, -0.2), &scale),
            taper.apodization((-0.1, 0.2), &scale)
        );
    }

    #[test]
    fn test_uniform_taper() {
        let scale = TaperScale { half_width: 0.1 };
        assert_eq!(UniformTaper.apodization((5.0, 5.0), &scale), 1.0);
    }
}
