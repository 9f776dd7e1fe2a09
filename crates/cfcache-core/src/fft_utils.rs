//! FFT Utilities for Kernel Synthesis
//!
//! Kernels are synthesized in the sky (image) domain and moved to the grid
//! (uv) domain with a 2-D complex FFT. The helpers here wrap `rustfft` with
//! the centered convention used throughout the crate: the origin of both the
//! input screen and the output kernel sits at `(N/2, N/2)`.
//!
//! ```text
//!   sky screen (origin at N/2)          kernel (origin at N/2)
//!   ┌───────────────┐                   ┌───────────────┐
//!   │       ·       │   shift → FFT     │       ·       │
//!   │     ·███·     │   rows, columns   │    ·░░░░░·    │
//!   │       ·       │   → shift         │       ·       │
//!   └───────────────┘                   └───────────────┘
//! ```

use rustfft::{num_complex::Complex64, Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;

use crate::array::KernelArray;

/// Square 2-D FFT processor
pub struct FftProcessor {
    /// Side length of the square transform
    size: usize,
    /// Forward FFT instance
    fft_forward: Arc<dyn Fft<f64>>,
    /// Scratch buffer for FFT operations
    scratch: Vec<Complex64>,
    /// Column gather buffer
    column: Vec<Complex64>,
}

impl fmt::Debug for FftProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftProcessor")
            .field("size", &self.size)
            .finish()
    }
}

impl FftProcessor {
    /// Create a new processor for `size x size` transforms
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft_forward = planner.plan_fft_forward(size);
        let scratch = vec![Complex64::new(0.0, 0.0); fft_forward.get_inplace_scratch_len()];

        Self {
            size,
            fft_forward,
            scratch,
            column: vec![Complex64::new(0.0, 0.0); size],
        }
    }

    /// Get the transform side length
    pub fn size(&self) -> usize {
        self.size
    }

    /// Centered forward transform, in place.
    pub fn fft2_centered(&mut self, array: &mut KernelArray) {
        assert_eq!(array.side(), self.size);
        fft_shift_2d(array);
        let fft = Arc::clone(&self.fft_forward);
        self.transform_2d(array, fft.as_ref());
        fft_shift_2d(array);
    }

    fn transform_2d(&mut self, array: &mut KernelArray, fft: &dyn Fft<f64>) {
        let n = self.size;
        for row in array.data_mut().chunks_exact_mut(n) {
            fft.process_with_scratch(row, &mut self.scratch);
        }
        for x in 0..n {
            for y in 0..n {
                self.column[y] = array.get(x, y);
            }
            fft.process_with_scratch(&mut self.column, &mut self.scratch);
            for y in 0..n {
                array.set(x, y, self.column[y]);
            }
        }
    }
}

/// In-place 2-D FFT shift of an even-sided square array.
///
/// For even sides the shift is its own inverse.
pub fn fft_shift_2d(array: &mut KernelArray) {
    let n = array.side();
    let half = n / 2;
    let data = array.data_mut();
    for row in data.chunks_exact_mut(n) {
        row.rotate_left(half);
    }
    data.rotate_left(half * n);
}
