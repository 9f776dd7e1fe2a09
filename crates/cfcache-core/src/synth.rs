//! Kernel Synthesis
//!
//! A kernel is built in the sky domain from the physics term providers and
//! transformed to the oversampled uv grid:
//!
//! ```text
//!   signal:  screen = V_a(f, p) · V_b(f, p) · T · W(w)
//!   weight:  screen = V_a(f, p) · conj(V_b(f₂, p*)) · T²      (no w-term)
//!
//!   screen (N×N, Δl = nx·cell·sampling / N) ──centered FFT──► raw kernel
//! ```
//!
//! `p*` is the polarization term with its feeds swapped. `f₂` is the channel
//! frequency nearest the conjugate frequency in conjugate-beam mode and `f`
//! otherwise.
//! The screen increment is chosen so one output sample is exactly one
//! oversampled uv pixel. Directions beyond the horizon (`l² + m² ≥ 1`) are
//! zero.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::array::KernelArray;
use crate::baseline::Classification;
use crate::conjugate::conjugate_channel;
use crate::fft_utils::FftProcessor;
use crate::grid::{GridGeometry, KernelAxes, MuellerTerm};
use crate::key::{CacheKey, StoreKind};
use crate::providers::{TaperScale, TermProviders};
use crate::types::{CacheError, CacheResult, Complex, TermKind};

/// Synthesis parameters shared by both stores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisSettings {
    /// Largest support a kernel may have, grid pixels
    pub max_support: usize,
    /// Guard band around the support, grid pixels
    pub margin: usize,
    /// Pair each weight kernel's second antenna with the conjugate frequency
    pub conjugate_beams: bool,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            max_support: 8,
            margin: 2,
            conjugate_beams: false,
        }
    }
}

/// Unnormalized kernel straight out of the FFT.
#[derive(Debug, Clone, PartialEq)]
pub struct RawKernel {
    pub array: KernelArray,
    pub sampling: usize,
    /// Sky-screen pixel increment, radians
    pub cell_size: f64,
    pub frequency_hz: f64,
    pub w_value: f64,
    /// Channel frequency nearest the conjugate of `frequency_hz`
    pub conjugate_frequency_hz: f64,
    /// Feed-swapped polarization term
    pub conjugate_pol: MuellerTerm,
    /// Largest support the screen was sized for, grid pixels
    pub max_support_hint: usize,
}

/// Builds raw kernels for one store kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelSynthesizer {
    pub kind: StoreKind,
    pub settings: SynthesisSettings,
}

impl KernelSynthesizer {
    pub fn new(kind: StoreKind, settings: SynthesisSettings) -> Self {
        Self { kind, settings }
    }

    /// Side of the synthesis screen for `geometry`.
    pub fn screen_side(&self, geometry: &GridGeometry) -> usize {
        geometry.kernel_side(self.settings.max_support, self.settings.margin)
    }

    /// Synthesize the raw kernel for `key`.
    ///
    /// Nothing is evaluated before every required provider has been found
    /// and has confirmed it supports both antenna classes.
    pub fn synthesize(
        &self,
        key: &CacheKey,
        classification: &Classification,
        providers: &TermProviders,
        geometry: &GridGeometry,
        axes: &KernelAxes,
    ) -> CacheResult<RawKernel> {
        geometry.validate()?;
        let frequency = axes.frequency(key.channel)?;
        let w_value = axes.w_value(key.w_plane)?;
        let pol = axes.pol_term(key.pol_term)?;
        let pa = axes.pa_value(key.pa_bin)?;
        let (class_a, class_b) =
            classification
                .members(key.baseline)
                .ok_or(CacheError::AxisOutOfRange {
                    axis: "baseline",
                    index: key.baseline.0,
                    len: classification.baseline_count(),
                })?;

        let conjugate_pol = pol.conjugate();
        let conjugate_frequency = conjugate_channel(axes, key.channel)
            .and_then(|c| axes.frequency(c).ok())
            .unwrap_or(frequency);
        let second_pol = match self.kind {
            StoreKind::Signal => pol,
            StoreKind::Weight => conjugate_pol,
        };

        let missing = |term| CacheError::MissingTermProvider { key: *key, term };
        let response = providers
            .response
            .as_deref()
            .ok_or_else(|| missing(TermKind::AntennaResponse))?;
        if !response.supports(class_a, pol) || !response.supports(class_b, second_pol) {
            return Err(missing(TermKind::AntennaResponse));
        }
        let taper = providers
            .taper
            .as_deref()
            .ok_or_else(|| missing(TermKind::Taper))?;
        let phase = match self.kind {
            StoreKind::Signal => Some(
                providers
                    .phase
                    .as_deref()
                    .ok_or_else(|| missing(TermKind::PhaseRamp))?,
            ),
            StoreKind::Weight => None,
        };

        let second_frequency = if self.kind == StoreKind::Weight && self.settings.conjugate_beams {
            conjugate_frequency
        } else {
            frequency
        };

        let n = self.screen_side(geometry);
        let increment =
            geometry.nx as f64 * geometry.cell_size_rad * geometry.sampling as f64 / n as f64;
        let scale = TaperScale {
            half_width: increment * (n / 2) as f64,
        };
        let (sin_pa, cos_pa) = pa.sin_cos();
        let centre = (n / 2) as f64;
        let kind = self.kind;

        tracing::debug!(
            %key,
            screen = n,
            increment,
            frequency,
            second_frequency,
            w = w_value,
            "synthesizing kernel"
        );

        let mut screen = vec![Complex::new(0.0, 0.0); n * n];
        screen.par_chunks_mut(n).enumerate().for_each(|(y, row)| {
            let m = (y as f64 - centre) * increment;
            for (x, sample) in row.iter_mut().enumerate() {
                let l = (x as f64 - centre) * increment;
                if l * l + m * m >= 1.0 {
                    continue;
                }
                // the response is evaluated in the antenna frame
                let rotated = (l * cos_pa - m * sin_pa, l * sin_pa + m * cos_pa);
                let t = taper.apodization((l, m), &scale);
                *sample = match kind {
                    StoreKind::Signal => {
                        let va = response.evaluate(class_a, rotated, frequency, pol);
                        let vb = response.evaluate(class_b, rotated, frequency, pol);
                        let w = phase
                            .map(|p| p.phase((l, m), w_value, increment))
                            .unwrap_or(Complex::new(1.0, 0.0));
                        va * vb * w * t
                    }
                    StoreKind::Weight => {
                        let va = response.evaluate(class_a, rotated, frequency, pol);
                        let vb =
                            response.evaluate(class_b, rotated, second_frequency, second_pol);
                        va * vb.conj() * (t * t)
                    }
                };
            }
        });

        let mut array = KernelArray::from_vec(n, screen)?;
        FftProcessor::new(n).fft2_centered(&mut array);

        Ok(RawKernel {
            array,
            sampling: geometry.sampling,
            cell_size: increment,
            frequency_hz: frequency,
            w_value,
            conjugate_frequency_hz: conjugate_frequency,
            conjugate_pol,
            max_support_hint: self.settings.max_support,
        })
    }
}
