//! # Physics term providers
//!
//! The synthesizer composes three independent terms into a sky-domain
//! screen before transforming it:
//!
//! ```text
//!   screen(l,m) = V_a(l,m,f) · V_b(l,m,f') · T(l,m) · W(l,m,w)
//!                 └── AntennaResponseProvider ┘   │      └ PhaseRampProvider
//!                                                 └ TaperProvider
//! ```
//!
//! The traits below are the only thing the cache depends on. The submodules
//! carry simple reference models used by the tests and benches; they are
//! not meant as authoritative beam models.

pub mod response;
pub mod taper;
pub mod wterm;

pub use response::{
    bessel_j1, AiryDisk, CommonPreset, ImagePattern, NumericPattern, ResponseCatalog,
    ResponseModel,
};
pub use taper::{KaiserTaper, UniformTaper};
pub use wterm::WTermPhase;

use std::fmt;
use std::sync::Arc;

use crate::grid::MuellerTerm;
use crate::key::AntennaClassId;
use crate::types::{Complex, DirectionOffset};

/// Complex voltage response of one antenna class.
pub trait AntennaResponseProvider: Send + Sync {
    /// Complex gain toward `offset` at `frequency_hz` for polarization term `pol`.
    fn evaluate(
        &self,
        class: AntennaClassId,
        offset: DirectionOffset,
        frequency_hz: f64,
        pol: MuellerTerm,
    ) -> Complex;

    /// Whether this provider has a model for `class` and `pol`.
    fn supports(&self, _class: AntennaClassId, _pol: MuellerTerm) -> bool {
        true
    }
}

/// Extent parameters handed to a taper.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaperScale {
    /// Half-width of the sky screen in direction cosines
    pub half_width: f64,
}

/// Apodization applied to the sky screen.
pub trait TaperProvider: Send + Sync {
    fn apodization(&self, offset: DirectionOffset, scale: &TaperScale) -> f64;
}

/// w-term phase screen.
pub trait PhaseRampProvider: Send + Sync {
    /// Unit phasor at `offset` for a w value in wavelengths. `cell_size_rad`
    /// is the screen pixel increment.
    fn phase(&self, offset: DirectionOffset, w: f64, cell_size_rad: f64) -> Complex;
}

/// The set of collaborators a store fills from.
#[derive(Clone, Default)]
pub struct TermProviders {
    pub response: Option<Arc<dyn AntennaResponseProvider>>,
    pub taper: Option<Arc<dyn TaperProvider>>,
    pub phase: Option<Arc<dyn PhaseRampProvider>>,
}

impl fmt::Debug for TermProviders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TermProviders")
            .field("response", &self.response.is_some())
            .field("taper", &self.taper.is_some())
            .field("phase", &self.phase.is_some())
            .finish()
    }
}

impl TermProviders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, provider: Arc<dyn AntennaResponseProvider>) -> Self {
        self.response = Some(provider);
        self
    }

    pub fn with_taper(mut self, provider: Arc<dyn TaperProvider>) -> Self {
        self.taper = Some(provider);
        self
    }

    pub fn with_phase(mut self, provider: Arc<dyn PhaseRampProvider>) -> Self {
        self.phase = Some(provider);
        self
    }

    /// Response catalog plus the default Kaiser taper and w-term screen.
    pub fn standard(catalog: ResponseCatalog) -> Self {
        Self::new()
            .with_response(Arc::new(catalog))
            .with_taper(Arc::new(KaiserTaper::default()))
            .with_phase(Arc::new(WTermPhase))
    }
}
