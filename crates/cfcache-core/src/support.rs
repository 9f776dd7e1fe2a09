//! Support Determination
//!
//! A synthesized kernel is much larger than its useful footprint. The
//! support finder samples concentric circles around the kernel center and
//! reports the largest radius at which any sample still exceeds
//! `threshold · peak`.
//!
//! ```text
//!            outer edge ──► scanned first
//!       ┌───────────────────────┐
//!       │     ·  ·  ·  ·  ·     │  radius r: samples every δ radians
//!       │  ·   ┌─────────┐   ·  │
//!       │  ·   │  ░███░  │   ·  │  first radius (from outside) with a
//!       │  ·   │  ░███░  │   ·  │  sample above threshold = support
//!       │  ·   └─────────┘   ·  │
//!       │     ·  ·  ·  ·  ·     │
//!       └───────────────────────┘
//! ```
//!
//! Candidate radii are split into disjoint bands that are scanned in
//! parallel; the bands are combined with `max`, so the answer does not
//! depend on the number of workers or on which band finishes first.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use crate::array::KernelArray;

/// Result of a support search, in array pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportResult {
    /// Support radius in array (oversampled) pixels
    pub radius: usize,
    /// True when the raw radius ran into the edge margin and was clamped
    pub clamped: bool,
}

/// Support search parameters as configured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportSettings {
    /// Fraction of the peak amplitude that still counts as support
    pub threshold: f64,
    /// Angular spacing of samples, radians
    pub angular_increment: f64,
    /// Smallest support reported, grid pixels
    pub min_support: usize,
    /// Parallel bands; 0 uses the rayon pool size
    pub workers: usize,
}

impl Default for SupportSettings {
    fn default() -> Self {
        Self {
            threshold: 1.0e-3,
            angular_increment: std::f64::consts::PI / 16.0,
            min_support: 1,
            workers: 0,
        }
    }
}

impl SupportSettings {
    /// Finder keeping `margin_px` array pixels clear of the edge.
    pub fn finder(&self, margin_px: usize) -> SupportFinder {
        let finder = SupportFinder {
            angular_increment: self.angular_increment,
            margin_px,
            ..SupportFinder::default()
        };
        if self.workers == 0 {
            finder
        } else {
            finder.with_workers(self.workers)
        }
    }
}

/// Radial support search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupportFinder {
    /// Angular spacing of samples on each circle, radians
    pub angular_increment: f64,
    /// Pixels kept clear at the array edge
    pub margin_px: usize,
    /// Number of radial bands scanned concurrently
    pub workers: usize,
}

impl Default for SupportFinder {
    fn default() -> Self {
        Self {
            angular_increment: std::f64::consts::PI / 16.0,
            margin_px: 2,
            workers: rayon::current_num_threads().max(1),
        }
    }
}

impl SupportFinder {
    pub fn new(angular_increment: f64, margin_px: usize, workers: usize) -> Self {
        Self {
            angular_increment,
            margin_px,
            workers: workers.max(1),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Largest radius with a sample strictly above `threshold · peak`.
    ///
    /// Returns `None` when no sample at any radius crosses the threshold,
    /// which the cache treats as a degenerate kernel.
    pub fn find_support(&self, kernel: &KernelArray, threshold: f64) -> Option<SupportResult> {
        let side = kernel.side();
        if side == 0 {
            return None;
        }
        let (_, _, peak) = kernel.peak();
        let level = threshold * peak;
        if !(peak > 0.0) || !level.is_finite() {
            return None;
        }

        let max_radius = (side / 2).saturating_sub(1);
        let directions = sample_directions(self.angular_increment);
        let bands = self.workers.min(max_radius + 1).max(1);
        let band_len = (max_radius + 1).div_ceil(bands);

        let found = (0..bands)
            .into_par_iter()
            .filter_map(|band| {
                let lo = band * band_len;
                let hi = ((band + 1) * band_len).min(max_radius + 1);
                (lo..hi)
                    .rev()
                    .find(|&r| circle_exceeds(kernel, r, &directions, level))
            })
            .max()?;

        let limit = (side / 2).saturating_sub(self.margin_px);
        if found > limit {
            tracing::warn!(
                radius = found,
                limit,
                side,
                "kernel support reaches the array edge; clamping"
            );
            Some(SupportResult {
                radius: limit,
                clamped: true,
            })
        } else {
            Some(SupportResult {
                radius: found,
                clamped: false,
            })
        }
    }
}

/// Unit-circle sample directions at the given angular spacing.
fn sample_directions(increment: f64) -> Vec<(f64, f64)> {
    let step = if increment.is_finite() && increment > 0.0 {
        increment.min(TAU)
    } else {
        TAU / 32.0
    };
    let count = (TAU / step).ceil() as usize;
    (0..count.max(1))
        .map(|k| {
            let theta = k as f64 * step;
            (theta.cos(), theta.sin())
        })
        .collect()
}

fn circle_exceeds(
    kernel: &KernelArray,
    radius: usize,
    directions: &[(f64, f64)],
    level: f64,
) -> bool {
    let r = radius as f64;
    directions.iter().any(|&(cos, sin)| {
        let dx = (r * cos).round() as i64;
        let dy = (r * sin).round() as i64;
        kernel
            .get_centered(dx, dy)
            .is_some_and(|v| v.norm() > level)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Complex;

    fn gaussian(side: usize, sigma: f64) -> KernelArray {
        let c = (side / 2) as f64;
        KernelArray::from_fn(side, |x, y| {
            let r2 = (x as f64 - c).powi(2) + (y as f64 - c).powi(2);
            Complex::new((-r2 / (2.0 * sigma * sigma)).exp(), 0.0)
        })
    }

    #[test]
    fn test_gaussian_support_matches_threshold_radius() {
        let k = gaussian(64, 4.0);
        let finder = SupportFinder::new(std::f64::consts::PI / 32.0, 2, 4);
        let result = finder.find_support(&k, 0.01).unwrap();
        // exp(-r^2/32) = 0.01  =>  r ≈ 12.14
        assert_eq!(result.radius, 12);
        assert!(!result.clamped);
    }

    #[test]
    fn test_monotonic_in_threshold() {
        let k = gaussian(64, 6.0);
        let finder = SupportFinder::default();
        let thresholds = [1e-4, 1e-3, 1e-2, 5e-2, 0.1, 0.5, 0.9];
        let radii: Vec<usize> = thresholds
            .iter()
            .map(|&t| finder.find_support(&k, t).unwrap().radius)
            .collect();
        for pair in radii.windows(2) {
            assert!(pair[0] >= pair[1], "radii not monotonic: {:?}", radii);
        }
    }

    #[test]
    fn test_worker_count_invariance() {
        let k = gaussian(96, 7.5);
        let reference = SupportFinder::new(0.1, 2, 1).find_support(&k, 0.003);
        for workers in [2, 3, 5, 8, 64, 1000] {
            let got = SupportFinder::new(0.1, 2, workers).find_support(&k, 0.003);
            assert_eq!(got, reference, "workers = {}", workers);
        }
    }

    #[test]
    fn test_wide_kernel_is_clamped() {
        let k = KernelArray::from_fn(32, |_, _| Complex::new(1.0, 0.0));
        let result = SupportFinder::new(0.2, 3, 2).find_support(&k, 0.5).unwrap();
        assert_eq!(result.radius, 13);
        assert!(result.clamped);
    }

    #[test]
    fn test_degenerate_kernels() {
        let finder = SupportFinder::default();
        assert_eq!(finder.find_support(&KernelArray::zeros(32), 0.01), None);
        // nothing is strictly above the peak itself
        assert_eq!(finder.find_support(&gaussian(32, 3.0), 1.0), None);
    }

    #[test]
    fn test_off_axis_lobe_is_found_with_fine_sampling() {
        let mut k = KernelArray::zeros(64);
        k.set(32, 32, Complex::new(1.0, 0.0));
        // a diagonal sidelobe at radius ~ 14
        k.set(42, 42, Complex::new(0.2, 0.0));
        let coarse = SupportFinder::new(std::f64::consts::FRAC_PI_2, 2, 2);
        let fine = SupportFinder::new(std::f64::consts::PI / 64.0, 2, 2);
        assert_eq!(coarse.find_support(&k, 0.1).unwrap().radius, 0);
        assert_eq!(fine.find_support(&k, 0.1).unwrap().radius, 14);
    }
}
