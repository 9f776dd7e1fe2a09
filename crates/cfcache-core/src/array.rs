//! Square complex kernel arrays
//!
//! Kernels are stored row-major: sample `(x, y)` lives at `y * side + x`.
//! The kernel origin sits at `(side/2, side/2)`, matching the layout the
//! FFT helpers produce after a centered transform.

use crate::types::{CacheError, CacheResult, Complex};

/// Square, row-major complex array.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KernelArray {
    side: usize,
    data: Vec<Complex>,
}

impl KernelArray {
    /// All-zero array of the given side.
    pub fn zeros(side: usize) -> Self {
        Self {
            side,
            data: vec![Complex::new(0.0, 0.0); side * side],
        }
    }

    /// Wrap an existing buffer. `data.len()` must equal `side * side`.
    pub fn from_vec(side: usize, data: Vec<Complex>) -> CacheResult<Self> {
        if data.len() != side * side {
            return Err(CacheError::InvalidParameter(format!(
                "buffer of {} samples cannot form a {}x{} kernel",
                data.len(),
                side,
                side
            )));
        }
        Ok(Self { side, data })
    }

    /// Build an array by evaluating `f(x, y)` at every sample.
    pub fn from_fn(side: usize, mut f: impl FnMut(usize, usize) -> Complex) -> Self {
        let mut data = Vec::with_capacity(side * side);
        for y in 0..side {
            for x in 0..side {
                data.push(f(x, y));
            }
        }
        Self { side, data }
    }

    #[inline]
    pub fn side(&self) -> usize {
        self.side
    }

    /// Index of the kernel origin along either axis.
    #[inline]
    pub fn center(&self) -> usize {
        self.side / 2
    }

    #[inline]
    pub fn data(&self) -> &[Complex] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [Complex] {
        &mut self.data
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Complex {
        self.data[y * self.side + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: Complex) {
        self.data[y * self.side + x] = value;
    }

    /// Sample relative to the center, `None` when outside the array.
    #[inline]
    pub fn get_centered(&self, dx: i64, dy: i64) -> Option<Complex> {
        let c = self.center() as i64;
        let (x, y) = (c + dx, c + dy);
        if x < 0 || y < 0 || x >= self.side as i64 || y >= self.side as i64 {
            None
        } else {
            Some(self.get(x as usize, y as usize))
        }
    }

    /// Row `y` as a slice.
    pub fn row(&self, y: usize) -> &[Complex] {
        &self.data[y * self.side..(y + 1) * self.side]
    }

    /// Largest amplitude and its position.
    pub fn peak(&self) -> (usize, usize, f64) {
        let mut best = (0, 0, 0.0);
        for (i, v) in self.data.iter().enumerate() {
            let a = v.norm();
            if a > best.2 {
                best = (i % self.side.max(1), i / self.side.max(1), a);
            }
        }
        best
    }

    pub fn is_all_zero(&self) -> bool {
        self.data.iter().all(|v| v.re == 0.0 && v.im == 0.0)
    }

    pub fn zero(&mut self) {
        self.data.iter_mut().for_each(|v| *v = Complex::new(0.0, 0.0));
    }

    /// Multiply every sample by `factor`.
    pub fn scale(&mut self, factor: Complex) {
        self.data.iter_mut().for_each(|v| *v *= factor);
    }

    /// Centered crop (when shrinking) or zero pad (when growing).
    pub fn recenter(&self, new_side: usize) -> KernelArray {
        let mut out = KernelArray::zeros(new_side);
        let (c_in, c_out) = (self.center() as i64, out.center() as i64);
        for y in 0..new_side {
            let sy = y as i64 - c_out + c_in;
            if sy < 0 || sy >= self.side as i64 {
                continue;
            }
            for x in 0..new_side {
                let sx = x as i64 - c_out + c_in;
                if sx < 0 || sx >= self.side as i64 {
                    continue;
                }
                out.set(x, y, self.get(sx as usize, sy as usize));
            }
        }
        out
    }

    /// Sum over the square `[c-r, c+r]^2` around the center.
    pub fn centered_sum(&self, radius: usize) -> Complex {
        let c = self.center();
        let lo = c.saturating_sub(radius);
        let hi = (c + radius).min(self.side.saturating_sub(1));
        let mut sum = Complex::new(0.0, 0.0);
        for y in lo..=hi {
            for x in lo..=hi {
                sum += self.get(x, y);
            }
        }
        sum
    }

    /// Bytes held by the sample buffer.
    pub fn memory_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<Complex>()
    }
}
