//! Core types shared across the kernel cache
//!
//! Kernels are complex-valued, sampled on a square grid. The same complex
//! type is used for the sky-domain screens, the raw FFT output and the
//! stored, normalized kernels.

use num_complex::Complex64;
use std::path::PathBuf;

use crate::key::CacheKey;

/// Type alias for complex kernel samples
pub type Complex = Complex64;

/// A point in direction-cosine space `(l, m)`
pub type DirectionOffset = (f64, f64);

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Which external physics collaborator was missing for a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermKind {
    AntennaResponse,
    Taper,
    PhaseRamp,
}

impl std::fmt::Display for TermKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TermKind::AntennaResponse => write!(f, "antenna response"),
            TermKind::Taper => write!(f, "taper"),
            TermKind::PhaseRamp => write!(f, "phase ramp"),
        }
    }
}

/// Errors that can occur while building, filling or persisting a store
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("No antennas supplied; cannot classify baselines")]
    EmptyGeometry,

    #[error("Missing {term} provider for key {key}")]
    MissingTermProvider { key: CacheKey, term: TermKind },

    #[error("Kernel for key {key} has no sample above the support threshold")]
    DegenerateKernel { key: CacheKey },

    #[error("Normalization divisor {divisor:e} too small for key {key}")]
    NormalizationFailure { key: CacheKey, divisor: f64 },

    #[error("Key {0} has not been declared")]
    KeyNotFound(CacheKey),

    #[error("Key {0} is declared but not filled")]
    CellNotFilled(CacheKey),

    #[error("{axis} index {index} out of range (axis length {len})")]
    AxisOutOfRange {
        axis: &'static str,
        index: u32,
        len: usize,
    },

    #[error("Conjugate derivation of {key} from {source_key} would cycle")]
    ConjugateCycle { key: CacheKey, source_key: CacheKey },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Persistence error at {}: {reason}", path.display())]
    Persistence { path: PathBuf, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    /// True for failures that only affect a single key.
    ///
    /// Store-wide failures (empty geometry, unreadable container) are the
    /// only ones that should stop a batch.
    pub fn is_key_local(&self) -> bool {
        !matches!(
            self,
            CacheError::EmptyGeometry | CacheError::Persistence { .. } | CacheError::Io(_)
        )
    }

    /// True when the key should end up marked degenerate rather than failed.
    pub fn is_degenerate(&self) -> bool {
        matches!(
            self,
            CacheError::DegenerateKernel { .. } | CacheError::NormalizationFailure { .. }
        )
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Serialization(e.to_string())
    }
}

/// Round `x` to the nearest even integer, never below 2.
pub fn round_even(x: f64) -> usize {
    let half = (x / 2.0).round();
    if half < 1.0 {
        2
    } else {
        2 * half as usize
    }
}
