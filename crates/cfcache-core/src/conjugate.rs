//! Conjugate-frequency reuse
//!
//! In conjugate-beam mode the weight kernel of channel `f` pairs the beam at
//! `f` with the beam at the mirror frequency
//!
//! ```text
//!   g(f) = sqrt(2·f_ref² − f²)
//! ```
//!
//! Kernels of a channel and its conjugate differ mostly by a scale, so one
//! of each pair is synthesized and the other is resampled from it. The lower
//! channel index of a pair is the primary; a derived cell is never used as a
//! source.

use crate::cell::KernelCell;
use crate::grid::{GridGeometry, KernelAxes};
use crate::key::CacheKey;
use crate::normalize::{NormalizeMode, NormalizeOutcome, Normalizer};
use crate::resample::Resampler;
use crate::types::{CacheError, CacheResult, Complex};

/// Mirror frequency about `reference`; `None` when it would be imaginary.
pub fn conjugate_frequency(frequency: f64, reference: f64) -> Option<f64> {
    let arg = 2.0 * reference * reference - frequency * frequency;
    if arg > 0.0 && arg.is_finite() {
        Some(arg.sqrt())
    } else {
        None
    }
}

/// Channel whose frequency is nearest to the conjugate of `channel`.
pub fn conjugate_channel(axes: &KernelAxes, channel: u32) -> Option<u32> {
    let f = axes.frequency(channel).ok()?;
    let g = conjugate_frequency(f, axes.reference_frequency)?;
    axes.nearest_channel(g)
}

/// How a key is filled under conjugate reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConjugateRole {
    /// Synthesized from the physics terms
    Primary,
    /// Resampled from the key at the conjugate channel
    Derived { source: CacheKey },
}

/// Role of `key`: derived when its channel and the conjugate channel map
/// onto each other and the conjugate has the lower index, primary otherwise
/// (self-conjugate and unpaired channels included).
///
/// Requiring a mutual pair keeps every source primary, so derivation chains
/// never form.
pub fn role_of(axes: &KernelAxes, key: &CacheKey) -> ConjugateRole {
    match conjugate_channel(axes, key.channel) {
        Some(c) if c < key.channel && conjugate_channel(axes, c) == Some(key.channel) => {
            ConjugateRole::Derived {
                source: key.at_channel(c),
            }
        }
        _ => ConjugateRole::Primary,
    }
}

/// Derives cells from their conjugate partners.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConjugateReuser {
    pub resampler: Resampler,
    pub normalizer: Normalizer,
    /// Upper bound on the derived support, grid pixels
    pub max_support: usize,
    /// Guard band, grid pixels
    pub margin: usize,
}

impl ConjugateReuser {
    pub fn new(
        resampler: Resampler,
        normalizer: Normalizer,
        max_support: usize,
        margin: usize,
    ) -> Self {
        Self {
            resampler,
            normalizer,
            max_support,
            margin,
        }
    }

    /// Build the cell for `key` from the filled, non-derived cell `source`
    /// stored at `source_key`.
    ///
    /// A source whose normalization collapses after resampling yields
    /// `NormalizationFailure`; the caller records the key as degenerate.
    pub fn derive_from_conjugate(
        &self,
        key: &CacheKey,
        source_key: &CacheKey,
        source: &KernelCell,
        axes: &KernelAxes,
        geometry: &GridGeometry,
    ) -> CacheResult<KernelCell> {
        if source_key == key || source.derived_from().is_some() {
            return Err(CacheError::ConjugateCycle {
                key: *key,
                source_key: *source_key,
            });
        }
        if !source.is_filled() {
            return Err(CacheError::CellNotFilled(*source_key));
        }

        let f_key = axes.frequency(key.channel)?;
        let f_source = axes.frequency(source_key.channel)?;
        let conjugate_pol = axes.pol_term(key.pol_term)?.conjugate();
        let ratio = f_source / f_key;

        let mut array = self.resampler.resample(source.array(), ratio)?;
        array.scale(Complex::new(1.0 / (ratio * ratio), 0.0));

        let support = ((source.support() as f64 * ratio).ceil() as usize)
            .clamp(1, self.max_support.max(1));
        let sampling = source.sampling();
        let side = geometry.kernel_side(support, self.margin);
        let mut array = array.recenter(side);

        match self.normalizer.normalize(
            &mut array,
            support * sampling,
            sampling,
            NormalizeMode::Integral,
        ) {
            NormalizeOutcome::Degenerate { divisor } => {
                Err(CacheError::NormalizationFailure { key: *key, divisor })
            }
            NormalizeOutcome::Normalized { divisor } => {
                tracing::debug!(
                    %key,
                    source = %source_key,
                    ratio,
                    support,
                    "derived kernel from conjugate channel"
                );
                Ok(KernelCell::filled(
                    array,
                    support,
                    sampling,
                    divisor.norm(),
                    f_key,
                    source.metadata().w_value,
                )
                .with_derived_from(*source_key)
                .with_conjugate(f_source, conjugate_pol))
            }
        }
    }
}
