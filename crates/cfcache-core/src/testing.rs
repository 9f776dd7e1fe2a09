//! Shared fixtures for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::baseline::{classify, AntennaDescriptor, Classification};
use crate::grid::{GridGeometry, KernelAxes, MuellerTerm};
use crate::key::{AntennaClassId, DatasetId, StoreKind};
use crate::providers::{AntennaResponseProvider, KaiserTaper, TermProviders, WTermPhase};
use crate::store::{KernelCacheStore, StoreSettings};
use crate::types::{Complex, DirectionOffset};

/// Gaussian voltage beam whose width shrinks with frequency.
#[derive(Debug, Default)]
pub struct GaussianBeam {
    /// Frequency at which the response is forced to zero
    pub dead_frequency: Option<f64>,
    /// Extra width along m relative to l (0 for a circular beam)
    pub elongation: f64,
    pub calls: AtomicUsize,
}

impl GaussianBeam {
    pub fn dead_at(frequency: f64) -> Self {
        Self {
            dead_frequency: Some(frequency),
            ..Self::default()
        }
    }

    /// Beam `1 + elongation` times wider along m than along l.
    pub fn elongated(elongation: f64) -> Self {
        Self {
            elongation,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl AntennaResponseProvider for GaussianBeam {
    fn evaluate(
        &self,
        class: AntennaClassId,
        offset: DirectionOffset,
        frequency_hz: f64,
        _pol: MuellerTerm,
    ) -> Complex {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.dead_frequency == Some(frequency_hz) {
            return Complex::new(0.0, 0.0);
        }
        // 0.03 rad at 1 GHz for class 0, narrower for larger classes
        let sigma = 0.03 * 1.0e9 / frequency_hz / (1.0 + 0.25 * class.0 as f64);
        let m = offset.1 / (1.0 + self.elongation);
        let r2 = offset.0 * offset.0 + m * m;
        Complex::new((-r2 / (2.0 * sigma * sigma)).exp(), 0.0)
    }
}

pub fn geometry() -> GridGeometry {
    GridGeometry::new(64, 64, 1.0e-3, 4)
}

pub fn axes() -> KernelAxes {
    KernelAxes {
        frequencies: vec![0.9e9, 1.0e9, 1.1e9],
        reference_frequency: 1.0e9,
        w_values: vec![0.0, 100.0],
        pol_terms: vec![MuellerTerm::new(0, 0), MuellerTerm::new(3, 3)],
        pa_bins: Vec::new(),
    }
}

/// Two 12 m dishes and one 7 m dish.
pub fn classification() -> Classification {
    classify(&antennas()).unwrap_or_else(|e| panic!("fixture classification: {}", e))
}

pub fn antennas() -> Vec<AntennaDescriptor> {
    vec![
        AntennaDescriptor::airy(12.0),
        AntennaDescriptor::airy(12.0),
        AntennaDescriptor::airy(7.0),
    ]
}

pub fn providers(beam: Arc<GaussianBeam>) -> TermProviders {
    TermProviders::new()
        .with_response(beam)
        .with_taper(Arc::new(KaiserTaper::default()))
        .with_phase(Arc::new(WTermPhase))
}

pub fn store(kind: StoreKind, beam: Arc<GaussianBeam>) -> KernelCacheStore {
    store_with(kind, beam, StoreSettings::default())
}

pub fn store_with(
    kind: StoreKind,
    beam: Arc<GaussianBeam>,
    settings: StoreSettings,
) -> KernelCacheStore {
    build(kind, "fixture-ms", axes(), beam, settings)
}

/// Fixture axes with two parallactic-angle bins, 0 and 90 degrees.
pub fn axes_with_pa() -> KernelAxes {
    KernelAxes {
        pa_bins: vec![0.0, std::f64::consts::FRAC_PI_2],
        ..axes()
    }
}

pub fn build(
    kind: StoreKind,
    dataset: &str,
    axes: KernelAxes,
    beam: Arc<GaussianBeam>,
    settings: StoreSettings,
) -> KernelCacheStore {
    KernelCacheStore::new(
        kind,
        DatasetId::new(dataset),
        Arc::new(classification()),
        geometry(),
        axes,
        providers(beam),
        settings,
    )
    .unwrap_or_else(|e| panic!("fixture store: {}", e))
}
