//! Grid geometry and kernel axes
//!
//! [`GridGeometry`] describes the target uv grid; [`KernelAxes`] lists the
//! physical values behind the integer indices of a [`CacheKey`].

use serde::{Deserialize, Serialize};

use crate::key::CacheKey;
use crate::types::{CacheError, CacheResult};

/// Target grid description.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridGeometry {
    /// Image pixels along x
    pub nx: usize,
    /// Image pixels along y
    pub ny: usize,
    /// Image cell size in radians
    pub cell_size_rad: f64,
    /// Oversampling of the kernel relative to the uv grid
    pub sampling: usize,
}

impl Default for GridGeometry {
    fn default() -> Self {
        Self {
            nx: 256,
            ny: 256,
            cell_size_rad: 1.0e-5,
            sampling: 4,
        }
    }
}

impl GridGeometry {
    pub fn new(nx: usize, ny: usize, cell_size_rad: f64, sampling: usize) -> Self {
        Self {
            nx,
            ny,
            cell_size_rad,
            sampling,
        }
    }

    pub fn validate(&self) -> CacheResult<()> {
        if self.nx == 0 || self.ny == 0 {
            return Err(CacheError::InvalidParameter("grid has zero pixels".into()));
        }
        if !(self.cell_size_rad.is_finite() && self.cell_size_rad > 0.0) {
            return Err(CacheError::InvalidParameter(format!(
                "cell size {} must be positive",
                self.cell_size_rad
            )));
        }
        if self.sampling == 0 {
            return Err(CacheError::InvalidParameter("sampling must be >= 1".into()));
        }
        Ok(())
    }

    /// uv cell size in wavelengths.
    pub fn uv_cell(&self) -> f64 {
        1.0 / (self.nx as f64 * self.cell_size_rad)
    }

    /// Side of a kernel array with the given support (grid pixels) and margin.
    pub fn kernel_side(&self, support: usize, margin: usize) -> usize {
        2 * (support + margin) * self.sampling
    }
}

/// Polarization cross-product term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MuellerTerm {
    /// Row of the Mueller matrix
    pub row: u8,
    /// Column of the Mueller matrix
    pub col: u8,
}

impl MuellerTerm {
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    /// Diagonal terms relate a correlation to its own sky polarization.
    pub fn is_diagonal(&self) -> bool {
        self.row == self.col
    }

    /// Term with both feeds swapped, as seen by the conjugated antenna.
    ///
    /// Correlations are indexed `pp, pq, qp, qq` for feeds `p, q`, so the
    /// swap maps RR↔LL, RL↔LR (XX↔YY, XY↔YX). Indices past 3 are kept.
    pub fn conjugate(&self) -> Self {
        fn swap(i: u8) -> u8 {
            if i < 4 {
                3 - i
            } else {
                i
            }
        }
        Self::new(swap(self.row), swap(self.col))
    }
}

/// Physical values behind the key indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelAxes {
    /// Channel frequencies in Hz
    pub frequencies: Vec<f64>,
    /// Reference frequency for conjugate pairing, Hz
    pub reference_frequency: f64,
    /// w value of each plane, in wavelengths
    pub w_values: Vec<f64>,
    /// Polarization terms
    pub pol_terms: Vec<MuellerTerm>,
    /// Parallactic-angle bin centers in radians (empty when unused)
    pub pa_bins: Vec<f64>,
}

impl Default for KernelAxes {
    fn default() -> Self {
        Self {
            frequencies: vec![1.4e9],
            reference_frequency: 1.4e9,
            w_values: vec![0.0],
            pol_terms: vec![MuellerTerm::new(0, 0)],
            pa_bins: Vec::new(),
        }
    }
}

impl KernelAxes {
    pub fn frequency(&self, channel: u32) -> CacheResult<f64> {
        self.frequencies
            .get(channel as usize)
            .copied()
            .ok_or(CacheError::AxisOutOfRange {
                axis: "channel",
                index: channel,
                len: self.frequencies.len(),
            })
    }

    pub fn w_value(&self, plane: u32) -> CacheResult<f64> {
        self.w_values
            .get(plane as usize)
            .copied()
            .ok_or(CacheError::AxisOutOfRange {
                axis: "w-plane",
                index: plane,
                len: self.w_values.len(),
            })
    }

    pub fn pol_term(&self, index: u32) -> CacheResult<MuellerTerm> {
        self.pol_terms
            .get(index as usize)
            .copied()
            .ok_or(CacheError::AxisOutOfRange {
                axis: "polarization",
                index,
                len: self.pol_terms.len(),
            })
    }

    /// Parallactic angle of a bin; zero when the key carries no bin.
    pub fn pa_value(&self, bin: Option<u32>) -> CacheResult<f64> {
        match bin {
            None => Ok(0.0),
            Some(b) => self
                .pa_bins
                .get(b as usize)
                .copied()
                .ok_or(CacheError::AxisOutOfRange {
                    axis: "pa-bin",
                    index: b,
                    len: self.pa_bins.len(),
                }),
        }
    }

    /// Check every index of `key` against the axes.
    pub fn check(&self, key: &CacheKey) -> CacheResult<()> {
        self.frequency(key.channel)?;
        self.w_value(key.w_plane)?;
        self.pol_term(key.pol_term)?;
        self.pa_value(key.pa_bin)?;
        Ok(())
    }

    /// Channel whose frequency is nearest to `frequency`.
    pub fn nearest_channel(&self, frequency: f64) -> Option<u32> {
        self.frequencies
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1 - frequency).abs().total_cmp(&(b.1 - frequency).abs()))
            .map(|(i, _)| i as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::BaselineClassId;

    #[test]
    fn test_kernel_side() {
        let g = GridGeometry::new(512, 512, 2.0e-5, 4);
        assert_eq!(g.kernel_side(8, 2), 80);
        assert!((g.uv_cell() - 1.0 / (512.0 * 2.0e-5)).abs() < 1e-9);
    }

    #[test]
    fn test_validate() {
        assert!(GridGeometry::default().validate().is_ok());
        assert!(GridGeometry::new(0, 10, 1e-5, 4).validate().is_err());
        assert!(GridGeometry::new(10, 10, -1.0, 4).validate().is_err());
        assert!(GridGeometry::new(10, 10, 1e-5, 0).validate().is_err());
    }

    #[test]
    fn test_axes_lookup() {
        let axes = KernelAxes {
            frequencies: vec![1.0e9, 1.1e9, 1.2e9],
            reference_frequency: 1.1e9,
            w_values: vec![0.0, 100.0],
            pol_terms: vec![MuellerTerm::new(0, 0), MuellerTerm::new(3, 3)],
            pa_bins: vec![0.0, 0.1, 0.2],
        };
        assert_eq!(axes.frequency(1).unwrap(), 1.1e9);
        assert!(matches!(
            axes.w_value(2),
            Err(CacheError::AxisOutOfRange { axis: "w-plane", index: 2, len: 2 })
        ));
        assert_eq!(axes.nearest_channel(1.19e9), Some(2));

        let key = CacheKey::new(BaselineClassId(0), 2, 1, 1).with_pa_bin(2);
        assert!(axes.check(&key).is_ok());
        assert!(axes.check(&key.with_pa_bin(3)).is_err());
    }

    #[test]
    fn test_conjugate_pol_swaps_feeds() {
        // RR <-> LL, RL <-> LR
        assert_eq!(MuellerTerm::new(0, 0).conjugate(), MuellerTerm::new(3, 3));
        assert_eq!(MuellerTerm::new(3, 3).conjugate(), MuellerTerm::new(0, 0));
        assert_eq!(MuellerTerm::new(1, 1).conjugate(), MuellerTerm::new(2, 2));
        assert_eq!(MuellerTerm::new(0, 1).conjugate(), MuellerTerm::new(3, 2));
        for row in 0..4 {
            for col in 0..4 {
                let term = MuellerTerm::new(row, col);
                assert_eq!(term.conjugate().conjugate(), term);
                assert_eq!(term.conjugate().is_diagonal(), term.is_diagonal());
            }
        }
    }
}
