//! Baseline Classification
//!
//! Heterogeneous arrays mix dishes of different sizes. A gridding kernel
//! depends on the antenna pair only through the two aperture models, so all
//! antennas with equal aperture (and model family) are folded into one
//! [`AntennaClassId`], and all antenna pairs into a dense set of
//! [`BaselineClassId`]s.
//!
//! ```text
//!   antennas:  [12 m, 12 m, 7 m]
//!   classes:    A0    A0    A1          D = 2
//!
//!   baseline classes (upper triangle, D·(D+1)/2 = 3):
//!        A0  A1
//!   A0 [ B0  B1 ]
//!   A1 [  ·  B2 ]
//!
//!   realized by antenna pairs: B0 (0-1), B1 (0-2, 1-2); B2 needs two 7 m dishes
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::key::{AntennaClassId, BaselineClassId, DatasetId};
use crate::types::{CacheError, CacheResult};

/// Response-model family of an antenna.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// Analytic uniformly-illuminated dish
    Airy,
    /// Tabulated radial voltage pattern
    Numeric,
    /// Sampled 2-D voltage pattern
    ImageBased,
    /// One preset shared by every antenna of a telescope
    CommonPreset,
}

/// Description of one physical antenna.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AntennaDescriptor {
    /// Aperture diameter in metres
    pub diameter_m: f64,
    /// Response-model family
    pub family: ModelFamily,
}

impl AntennaDescriptor {
    pub fn new(diameter_m: f64, family: ModelFamily) -> Self {
        Self { diameter_m, family }
    }

    pub fn airy(diameter_m: f64) -> Self {
        Self::new(diameter_m, ModelFamily::Airy)
    }

    /// Diameter rounded to a micrometre, so that values read back from
    /// catalogs with float noise still compare equal.
    fn class_signature(&self) -> (i64, ModelFamily) {
        ((self.diameter_m * 1.0e6).round() as i64, self.family)
    }
}

/// Output of a classification pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Class of each antenna, by antenna index
    antenna_class: Vec<AntennaClassId>,
    /// Representative descriptor of each class
    class_descriptors: Vec<AntennaDescriptor>,
    /// Baseline classes realized by at least one antenna pair
    realized: BTreeSet<BaselineClassId>,
}

impl Classification {
    /// Number of distinct antenna classes `D`.
    pub fn class_count(&self) -> usize {
        self.class_descriptors.len()
    }

    /// Size of the dense baseline-class range, `D·(D+1)/2`.
    pub fn baseline_count(&self) -> usize {
        let d = self.class_count();
        d * (d + 1) / 2
    }

    pub fn antenna_count(&self) -> usize {
        self.antenna_class.len()
    }

    pub fn antenna_class_of(&self, antenna: usize) -> Option<AntennaClassId> {
        self.antenna_class.get(antenna).copied()
    }

    pub fn descriptor(&self, class: AntennaClassId) -> Option<&AntennaDescriptor> {
        self.class_descriptors.get(class.0 as usize)
    }

    /// Baseline class of an (unordered) pair of antenna classes.
    pub fn baseline_class(&self, a: AntennaClassId, b: AntennaClassId) -> BaselineClassId {
        let d = self.class_count() as u32;
        let (i, j) = if a.0 <= b.0 { (a.0, b.0) } else { (b.0, a.0) };
        // rows 0..i of the upper triangle hold d, d-1, ... entries
        let row_start = i * d - i * i.saturating_sub(1) / 2;
        BaselineClassId(row_start + (j - i))
    }

    /// Baseline class of a pair of physical antennas.
    pub fn baseline_of_antennas(&self, ant1: usize, ant2: usize) -> Option<BaselineClassId> {
        let a = self.antenna_class_of(ant1)?;
        let b = self.antenna_class_of(ant2)?;
        Some(self.baseline_class(a, b))
    }

    /// The two antenna classes composing a baseline class, lower first.
    pub fn members(&self, baseline: BaselineClassId) -> Option<(AntennaClassId, AntennaClassId)> {
        let d = self.class_count() as u32;
        let mut next = 0u32;
        for i in 0..d {
            let row_len = d - i;
            if baseline.0 < next + row_len {
                return Some((AntennaClassId(i), AntennaClassId(i + baseline.0 - next)));
            }
            next += row_len;
        }
        None
    }

    /// Baseline classes realized by at least one physical antenna pair.
    pub fn realized_baselines(&self) -> impl Iterator<Item = BaselineClassId> + '_ {
        self.realized.iter().copied()
    }

    pub fn is_realized(&self, baseline: BaselineClassId) -> bool {
        self.realized.contains(&baseline)
    }
}

/// Classify a set of antennas.
pub fn classify(antennas: &[AntennaDescriptor]) -> CacheResult<Classification> {
    if antennas.is_empty() {
        return Err(CacheError::EmptyGeometry);
    }

    let mut signatures: Vec<(i64, ModelFamily)> = Vec::new();
    let mut class_descriptors = Vec::new();
    let mut antenna_class = Vec::with_capacity(antennas.len());
    let mut members_per_class: Vec<usize> = Vec::new();

    for ant in antennas {
        let sig = ant.class_signature();
        let id = match signatures.iter().position(|s| *s == sig) {
            Some(pos) => pos,
            None => {
                signatures.push(sig);
                class_descriptors.push(ant.clone());
                members_per_class.push(0);
                signatures.len() - 1
            }
        };
        members_per_class[id] += 1;
        antenna_class.push(AntennaClassId(id as u32));
    }

    let mut classification = Classification {
        antenna_class,
        class_descriptors,
        realized: BTreeSet::new(),
    };

    let d = classification.class_count();
    let mut realized = BTreeSet::new();
    for i in 0..d {
        for j in i..d {
            let possible = if i == j {
                members_per_class[i] >= 2
            } else {
                members_per_class[i] >= 1 && members_per_class[j] >= 1
            };
            if possible {
                let (a, b) = (AntennaClassId(i as u32), AntennaClassId(j as u32));
                realized.insert(classification.baseline_class(a, b));
            }
        }
    }
    // A single antenna still needs an autocorrelation kernel.
    if antennas.len() == 1 {
        realized.insert(BaselineClassId(0));
    }
    classification.realized = realized;

    tracing::debug!(
        antennas = antennas.len(),
        classes = d,
        baselines = classification.realized.len(),
        "classified antenna geometry"
    );
    Ok(classification)
}

/// Memoizing classifier keyed by dataset identity.
#[derive(Debug, Default)]
pub struct BaselineClassifier {
    current: Option<(DatasetId, Classification)>,
}

impl BaselineClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classification for `dataset`, recomputed only when the identity
    /// changes. Returns `(classification, recomputed)`.
    pub fn classify_for(
        &mut self,
        dataset: &DatasetId,
        antennas: &[AntennaDescriptor],
    ) -> CacheResult<(&Classification, bool)> {
        let stale = !matches!(&self.current, Some((id, _)) if id == dataset);
        if stale {
            let classification = classify(antennas)?;
            tracing::info!(
                dataset = %dataset,
                classes = classification.class_count(),
                "baseline classes rebuilt"
            );
            self.current = Some((dataset.clone(), classification));
        }
        match &self.current {
            Some((_, c)) => Ok((c, stale)),
            None => Err(CacheError::EmptyGeometry),
        }
    }

    pub fn current(&self) -> Option<&Classification> {
        self.current.as_ref().map(|(_, c)| c)
    }

    pub fn dataset(&self) -> Option<&DatasetId> {
        self.current.as_ref().map(|(id, _)| id)
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}
