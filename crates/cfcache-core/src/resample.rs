//! Lanczos Resampler
//!
//! Rescales a centered kernel by an arbitrary factor. The output side is
//! `round_even(side · factor)`, and output sample `j` is taken from input
//! coordinate
//!
//! ```text
//!   x_in = (j − N_out/2) · (N_in / N_out) + N_in/2
//! ```
//!
//! so the kernel origin maps onto itself. The interpolator is a separable
//! Lanczos window with `a` lobes, applied to rows first and then to
//! columns. Output samples whose window would reach past the input edge are
//! zero. Kernels are negligible at their edges, so nothing is lost in
//! practice.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::array::KernelArray;
use crate::types::{round_even, CacheError, CacheResult, Complex};

/// Lanczos kernel `L(t) = sinc(t) · sinc(t/a)` for `|t| < a`.
#[inline]
fn lanczos(t: f64, a: f64) -> f64 {
    if t == 0.0 {
        return 1.0;
    }
    if t.abs() >= a {
        return 0.0;
    }
    let pt = PI * t;
    a * pt.sin() * (pt / a).sin() / (pt * pt)
}

/// Interpolation taps of one output coordinate.
#[derive(Debug, Clone)]
struct Taps {
    first: usize,
    weights: Vec<f64>,
}

impl Taps {
    #[inline]
    fn apply(&self, sample: impl Fn(usize) -> Complex) -> Complex {
        self.weights
            .iter()
            .enumerate()
            .map(|(k, &w)| sample(self.first + k) * w)
            .sum()
    }
}

/// Separable Lanczos resampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resampler {
    /// Number of lobes `a`
    pub lobes: usize,
}

impl Default for Resampler {
    fn default() -> Self {
        Self { lobes: 3 }
    }
}

impl Resampler {
    pub fn new(lobes: usize) -> Self {
        Self {
            lobes: lobes.max(1),
        }
    }

    /// Side of the array `resample` produces for the given input side.
    pub fn output_side(side: usize, factor: f64) -> usize {
        round_even(side as f64 * factor)
    }

    /// Resample `input` by `factor` (> 1 enlarges).
    pub fn resample(&self, input: &KernelArray, factor: f64) -> CacheResult<KernelArray> {
        if !(factor.is_finite() && factor > 0.0) {
            return Err(CacheError::InvalidParameter(format!(
                "resample factor {} must be finite and positive",
                factor
            )));
        }
        let n_in = input.side();
        if n_in == 0 {
            return Err(CacheError::InvalidParameter(
                "cannot resample an empty kernel".into(),
            ));
        }
        let n_out = Self::output_side(n_in, factor);
        let taps = self.taps(n_in, n_out);

        // rows: n_in rows of n_out samples
        let mut rows = vec![Complex::new(0.0, 0.0); n_in * n_out];
        rows.par_chunks_mut(n_out).enumerate().for_each(|(y, row)| {
            let src = input.row(y);
            for (out, tap) in row.iter_mut().zip(&taps) {
                if let Some(tap) = tap {
                    *out = tap.apply(|i| src[i]);
                }
            }
        });

        // columns
        let mut out = vec![Complex::new(0.0, 0.0); n_out * n_out];
        out.par_chunks_mut(n_out)
            .zip(taps.par_iter())
            .for_each(|(row, tap)| {
                if let Some(tap) = tap {
                    for (j, sample) in row.iter_mut().enumerate() {
                        *sample = tap.apply(|i| rows[i * n_out + j]);
                    }
                }
            });

        tracing::trace!(n_in, n_out, factor, "resampled kernel");
        KernelArray::from_vec(n_out, out)
    }

    fn taps(&self, n_in: usize, n_out: usize) -> Vec<Option<Taps>> {
        let a = self.lobes as i64;
        let step = n_in as f64 / n_out as f64;
        let (c_in, c_out) = ((n_in / 2) as f64, (n_out / 2) as f64);
        (0..n_out)
            .map(|j| {
                let x = (j as f64 - c_out) * step + c_in;
                let fl = x.floor() as i64;
                if fl + 1 < a || fl >= n_in as i64 - a {
                    return None;
                }
                let first = fl - a + 1;
                let weights = (first..=fl + a)
                    .map(|i| lanczos(x - i as f64, a as f64))
                    .collect();
                Some(Taps {
                    first: first as usize,
                    weights,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn gaussian(side: usize, sigma: f64) -> KernelArray {
        let c = (side / 2) as f64;
        KernelArray::from_fn(side, |x, y| {
            let r2 = (x as f64 - c).powi(2) + (y as f64 - c).powi(2);
            let g = (-r2 / (2.0 * sigma * sigma)).exp();
            Complex::new(g, -0.5 * g)
        })
    }

    fn rms_difference(a: &KernelArray, b: &KernelArray) -> f64 {
        assert_eq!(a.side(), b.side());
        let sum: f64 = a
            .data()
            .iter()
            .zip(b.data())
            .map(|(x, y)| (x - y).norm_sqr())
            .sum();
        (sum / a.data().len() as f64).sqrt()
    }

    #[test]
    fn test_lanczos_kernel() {
        assert_eq!(lanczos(0.0, 3.0), 1.0);
        assert!(lanczos(1.0, 3.0).abs() < 1e-15);
        assert!(lanczos(2.0, 3.0).abs() < 1e-15);
        assert_eq!(lanczos(3.0, 3.0), 0.0);
        assert_relative_eq!(lanczos(0.5, 3.0), 1.5 / (PI * PI * 0.25), max_relative = 1e-12);
    }

    #[test]
    fn test_output_side() {
        assert_eq!(Resampler::output_side(64, 1.5), 96);
        assert_eq!(Resampler::output_side(64, 0.5), 32);
        assert_eq!(Resampler::output_side(10, 1.05), 10);
        assert_eq!(Resampler::output_side(10, 1.15), 12);
    }

    #[test]
    fn test_unit_factor_is_identity_away_from_edges() {
        let input = gaussian(48, 4.0);
        let out = Resampler::default().resample(&input, 1.0).unwrap();
        assert_eq!(out.side(), 48);
        // a = 3: the window of x spans x - 2 ..= x + 3
        for y in 2..45 {
            for x in 2..45 {
                assert_relative_eq!(out.get(x, y).re, input.get(x, y).re, epsilon = 1e-12);
                assert_relative_eq!(out.get(x, y).im, input.get(x, y).im, epsilon = 1e-12);
            }
        }
        assert_ne!(out.get(2, 20), Complex::new(0.0, 0.0));
        // window reaches past the edge
        assert_eq!(out.get(1, 20), Complex::new(0.0, 0.0));
        assert_eq!(out.get(45, 20), Complex::new(0.0, 0.0));
    }

    #[test]
    fn test_center_is_preserved() {
        let input = gaussian(64, 5.0);
        let out = Resampler::default().resample(&input, 2.0).unwrap();
        assert_eq!(out.side(), 128);
        let c = out.center();
        assert_relative_eq!(out.get(c, c).re, 1.0, epsilon = 1e-12);
        assert_eq!(out.peak().0, c);
        assert_eq!(out.peak().1, c);
    }

    #[test]
    fn test_round_trip_error_is_small() {
        let input = gaussian(64, 6.0);
        let resampler = Resampler::default();
        for r in [0.5, 0.75, 1.25, 1.5, 2.0] {
            let there = resampler.resample(&input, r).unwrap();
            let back = resampler.resample(&there, 1.0 / r).unwrap();
            assert_eq!(back.side(), 64, "r = {}", r);
            let err = rms_difference(&input, &back);
            assert!(err < 1e-2, "r = {}: rms error {}", r, err);
        }
    }

    #[test]
    fn test_invalid_factor() {
        let input = gaussian(16, 2.0);
        let resampler = Resampler::default();
        assert!(matches!(
            resampler.resample(&input, 0.0),
            Err(CacheError::InvalidParameter(_))
        ));
        assert!(resampler.resample(&input, f64::NAN).is_err());
        assert!(resampler.resample(&input, -2.0).is_err());
    }
}
