//! Kernel cells
//!
//! A cell is one slot of a store. It starts as a shape-only placeholder and
//! settles exactly once, either into a normalized kernel or into a
//! degenerate (all-zero) one.

use serde::{Deserialize, Serialize};

use crate::array::KernelArray;
use crate::grid::MuellerTerm;
use crate::key::CacheKey;
use crate::types::Complex;

/// Fill state of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillStatus {
    Unfilled,
    Filled,
    Degenerate,
}

impl FillStatus {
    /// Filled and degenerate cells are never recomputed.
    pub fn is_settled(&self) -> bool {
        !matches!(self, FillStatus::Unfilled)
    }
}

impl std::fmt::Display for FillStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FillStatus::Unfilled => write!(f, "unfilled"),
            FillStatus::Filled => write!(f, "filled"),
            FillStatus::Degenerate => write!(f, "degenerate"),
        }
    }
}

/// Scalar description of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelMetadata {
    /// Support radius in grid pixels
    pub support: usize,
    /// Oversampling factor
    pub sampling: usize,
    /// Array side in oversampled pixels
    pub side: usize,
    pub status: FillStatus,
    /// Magnitude of the divisor the raw kernel was normalized by
    pub norm_factor: f64,
    /// Cell this one was resampled from, when derived by conjugate reuse
    pub derived_from: Option<CacheKey>,
    /// Frequency the kernel was computed for, Hz
    pub frequency_hz: f64,
    /// w value the kernel was computed for, wavelengths
    pub w_value: f64,
    /// Frequency of the conjugate channel, Hz
    pub conjugate_frequency_hz: f64,
    /// Feed-swapped polarization term paired with this one
    pub conjugate_pol: Option<MuellerTerm>,
}

/// One cached kernel plus its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelCell {
    array: KernelArray,
    meta: KernelMetadata,
}

impl KernelCell {
    /// Placeholder that only records the expected shape.
    pub fn unfilled(side: usize, sampling: usize) -> Self {
        Self {
            array: KernelArray::zeros(0),
            meta: KernelMetadata {
                support: 0,
                sampling,
                side,
                status: FillStatus::Unfilled,
                norm_factor: 0.0,
                derived_from: None,
                frequency_hz: 0.0,
                w_value: 0.0,
                conjugate_frequency_hz: 0.0,
                conjugate_pol: None,
            },
        }
    }

    /// Normalized kernel with the given support (grid pixels).
    pub fn filled(
        array: KernelArray,
        support: usize,
        sampling: usize,
        norm_factor: f64,
        frequency_hz: f64,
        w_value: f64,
    ) -> Self {
        let side = array.side();
        Self {
            array,
            meta: KernelMetadata {
                support,
                sampling,
                side,
                status: FillStatus::Filled,
                norm_factor,
                derived_from: None,
                frequency_hz,
                w_value,
                conjugate_frequency_hz: 0.0,
                conjugate_pol: None,
            },
        }
    }

    /// All-zero kernel that will not be recomputed.
    pub fn degenerate(side: usize, sampling: usize, norm_factor: f64) -> Self {
        Self {
            array: KernelArray::zeros(side),
            meta: KernelMetadata {
                support: 0,
                sampling,
                side,
                status: FillStatus::Degenerate,
                norm_factor,
                derived_from: None,
                frequency_hz: 0.0,
                w_value: 0.0,
                conjugate_frequency_hz: 0.0,
                conjugate_pol: None,
            },
        }
    }

    /// Rebuild a cell from stored parts. The array side must match the
    /// metadata for filled cells.
    pub(crate) fn from_parts(array: KernelArray, meta: KernelMetadata) -> Self {
        Self { array, meta }
    }

    pub fn with_derived_from(mut self, source: CacheKey) -> Self {
        self.meta.derived_from = Some(source);
        self
    }

    /// Record the conjugate channel frequency and polarization term the
    /// kernel is paired with.
    pub fn with_conjugate(mut self, frequency_hz: f64, pol: MuellerTerm) -> Self {
        self.meta.conjugate_frequency_hz = frequency_hz;
        self.meta.conjugate_pol = Some(pol);
        self
    }

    pub fn array(&self) -> &KernelArray {
        &self.array
    }

    pub fn metadata(&self) -> &KernelMetadata {
        &self.meta
    }

    pub fn status(&self) -> FillStatus {
        self.meta.status
    }

    pub fn support(&self) -> usize {
        self.meta.support
    }

    pub fn sampling(&self) -> usize {
        self.meta.sampling
    }

    pub fn side(&self) -> usize {
        self.meta.side
    }

    pub fn derived_from(&self) -> Option<CacheKey> {
        self.meta.derived_from
    }

    pub fn is_filled(&self) -> bool {
        self.meta.status == FillStatus::Filled
    }

    /// Kernel value at a fractional grid-pixel offset from the center.
    ///
    /// Uses the nearest oversampled sample; zero outside the support square.
    pub fn sample_at(&self, offset: (f64, f64)) -> Complex {
        let support = self.meta.support as f64;
        if !self.is_filled() || offset.0.abs() > support || offset.1.abs() > support {
            return Complex::new(0.0, 0.0);
        }
        let s = self.meta.sampling as f64;
        let dx = (offset.0 * s).round() as i64;
        let dy = (offset.1 * s).round() as i64;
        self.array
            .get_centered(dx, dy)
            .unwrap_or(Complex::new(0.0, 0.0))
    }

    /// Bytes held by the kernel samples.
    pub fn memory_bytes(&self) -> usize {
        self.array.memory_bytes()
    }
}
