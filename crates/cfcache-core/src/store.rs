//! # Kernel Cache Store
//!
//! A store maps [`CacheKey`]s to [`KernelCell`]s and fills cells on demand.
//! Two stores run side by side: the signal store holds peak-normalized
//! gridding kernels, the weight store holds integral-normalized weight
//! kernels.
//!
//! ```text
//!   fill(key)
//!     │ settled? ──yes──► return status
//!     ▼
//!   weight store, conjugate beams, derived channel?
//!     │ yes: fill(source) ─► ConjugateReuser ──────────────┐
//!     ▼ no                                                 │
//!   KernelSynthesizer ─► SupportFinder ─► crop ─► Normalizer
//!                                                          │
//!                          publish under write lock ◄──────┘
//!                          (first published result wins)
//! ```
//!
//! All numeric work happens without holding the cell lock, so distinct keys
//! can be filled concurrently from rayon workers.

use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::array::KernelArray;
use crate::baseline::{AntennaDescriptor, BaselineClassifier, Classification};
use crate::cell::{FillStatus, KernelCell, KernelMetadata};
use crate::config::CacheDirConfig;
use crate::conjugate::{role_of, ConjugateReuser, ConjugateRole};
use crate::grid::{GridGeometry, KernelAxes};
use crate::key::{CacheKey, DatasetId, StoreKind};
use crate::normalize::{NormalizeMode, NormalizeOutcome, Normalizer};
use crate::observe::{CacheMetrics, Counter};
use crate::persist::LoadReport;
use crate::providers::TermProviders;
use crate::resample::Resampler;
use crate::support::SupportSettings;
use crate::synth::{KernelSynthesizer, SynthesisSettings};
use crate::types::{CacheError, CacheResult, Complex};

/// Numeric settings of a store.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub support: SupportSettings,
    pub resample: Resampler,
    pub normalize: Normalizer,
    pub synthesis: SynthesisSettings,
}

/// Outcome of a batch fill.
#[derive(Debug, Default)]
pub struct FillReport {
    /// Keys that are filled after the batch
    pub filled: Vec<CacheKey>,
    /// Keys that settled as degenerate
    pub degenerate: Vec<CacheKey>,
    /// Keys whose fill returned an error; nothing was published for them
    pub failures: Vec<(CacheKey, CacheError)>,
}

impl FillReport {
    pub fn total(&self) -> usize {
        self.filled.len() + self.degenerate.len() + self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.degenerate.is_empty() && self.failures.is_empty()
    }

    fn record(&mut self, key: CacheKey, result: CacheResult<FillStatus>) {
        match result {
            Ok(FillStatus::Filled) => self.filled.push(key),
            Ok(FillStatus::Degenerate) => self.degenerate.push(key),
            Ok(FillStatus::Unfilled) => self.failures.push((key, CacheError::CellNotFilled(key))),
            Err(e) => self.failures.push((key, e)),
        }
    }
}

/// Per-key entry of a [`StoreSummary`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryRow {
    pub key: CacheKey,
    pub status: FillStatus,
    pub support: usize,
    pub side: usize,
    pub derived_from: Option<CacheKey>,
}

/// Snapshot of a store's contents.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSummary {
    pub kind: StoreKind,
    pub rows: Vec<SummaryRow>,
    pub memory_bytes: usize,
}

impl StoreSummary {
    pub fn count(&self, status: FillStatus) -> usize {
        self.rows.iter().filter(|r| r.status == status).count()
    }

    pub fn derived(&self) -> usize {
        self.rows.iter().filter(|r| r.derived_from.is_some()).count()
    }

    /// Largest support of any filled kernel.
    pub fn max_support(&self) -> usize {
        self.rows.iter().map(|r| r.support).max().unwrap_or(0)
    }
}

/// Lazily filled kernel cache for one store kind.
pub struct KernelCacheStore {
    pub(crate) kind: StoreKind,
    pub(crate) dataset: DatasetId,
    pub(crate) classification: Arc<Classification>,
    pub(crate) geometry: GridGeometry,
    pub(crate) axes: KernelAxes,
    providers: TermProviders,
    pub(crate) settings: StoreSettings,
    pub(crate) cells: RwLock<BTreeMap<CacheKey, KernelCell>>,
    progress: Counter,
    pub(crate) metrics: Arc<CacheMetrics>,
}

impl std::fmt::Debug for KernelCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelCacheStore")
            .field("kind", &self.kind)
            .field("dataset", &self.dataset)
            .field("cells", &self.len())
            .field("progress", &self.progress())
            .finish()
    }
}

impl KernelCacheStore {
    pub fn new(
        kind: StoreKind,
        dataset: DatasetId,
        classification: Arc<Classification>,
        geometry: GridGeometry,
        axes: KernelAxes,
        providers: TermProviders,
        settings: StoreSettings,
    ) -> CacheResult<Self> {
        geometry.validate()?;
        if axes.frequencies.is_empty() || axes.w_values.is_empty() || axes.pol_terms.is_empty() {
            return Err(CacheError::InvalidParameter(
                "kernel axes need at least one channel, w-plane and polarization term".into(),
            ));
        }
        if settings.synthesis.max_support == 0 {
            return Err(CacheError::InvalidParameter("max_support must be >= 1".into()));
        }
        Ok(Self {
            kind,
            dataset,
            classification,
            geometry,
            axes,
            providers,
            settings,
            cells: RwLock::new(BTreeMap::new()),
            progress: Counter::new(),
            metrics: Arc::new(CacheMetrics::new()),
        })
    }

    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    pub fn dataset(&self) -> &DatasetId {
        &self.dataset
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn axes(&self) -> &KernelAxes {
        &self.axes
    }

    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    /// Side of a cell with the largest allowed support.
    pub fn canonical_side(&self) -> usize {
        self.side_for(self.settings.synthesis.max_support)
    }

    fn side_for(&self, support: usize) -> usize {
        self.geometry.kernel_side(support, self.settings.synthesis.margin)
    }

    fn normalize_mode(&self) -> NormalizeMode {
        match self.kind {
            StoreKind::Signal => NormalizeMode::Peak,
            StoreKind::Weight => NormalizeMode::Integral,
        }
    }

    fn check_key(&self, key: &CacheKey) -> CacheResult<()> {
        self.axes.check(key)?;
        let baselines = self.classification.baseline_count();
        if key.baseline.0 as usize >= baselines {
            return Err(CacheError::AxisOutOfRange {
                axis: "baseline",
                index: key.baseline.0,
                len: baselines,
            });
        }
        Ok(())
    }

    /// Declare `key` with room for a kernel of `support_hint` grid pixels.
    ///
    /// Re-declaring with an equal or smaller hint is a no-op; a larger hint
    /// grows an unfilled placeholder.
    pub fn declare(&self, key: CacheKey, support_hint: usize) -> CacheResult<()> {
        self.check_key(&key)?;
        let support = support_hint.clamp(1, self.settings.synthesis.max_support);
        let side = self.side_for(support);
        let mut cells = self.cells.write();
        match cells.get_mut(&key) {
            None => {
                cells.insert(key, KernelCell::unfilled(side, self.geometry.sampling));
            }
            Some(cell) if !cell.status().is_settled() && cell.side() < side => {
                *cell = KernelCell::unfilled(side, self.geometry.sampling);
            }
            Some(_) => {}
        }
        Ok(())
    }

    /// Snapshot of the cell at `key`.
    pub fn get(&self, key: &CacheKey) -> CacheResult<KernelCell> {
        self.cells
            .read()
            .get(key)
            .cloned()
            .ok_or(CacheError::KeyNotFound(*key))
    }

    pub fn metadata(&self, key: &CacheKey) -> CacheResult<KernelMetadata> {
        self.cells
            .read()
            .get(key)
            .map(|c| *c.metadata())
            .ok_or(CacheError::KeyNotFound(*key))
    }

    pub fn status(&self, key: &CacheKey) -> Option<FillStatus> {
        self.cells.read().get(key).map(|c| c.status())
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.cells.read().contains_key(key)
    }

    /// Declared keys in key order.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.cells.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.cells.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.read().is_empty()
    }

    /// Number of cells this store has settled so far.
    pub fn progress(&self) -> u64 {
        self.progress.get()
    }

    /// Value of the normalized kernel at a fractional grid-pixel offset.
    pub fn lookup(&self, key: &CacheKey, offset: (f64, f64)) -> CacheResult<Complex> {
        let cells = self.cells.read();
        let cell = cells.get(key).ok_or(CacheError::KeyNotFound(*key))?;
        if !cell.status().is_settled() {
            return Err(CacheError::CellNotFilled(*key));
        }
        Ok(cell.sample_at(offset))
    }

    /// Fill `key`, declaring it first if needed.
    ///
    /// Settled cells are returned as is. Degenerate kernels and failed
    /// normalizations settle the cell as [`FillStatus::Degenerate`]; any
    /// other error leaves the cell unfilled.
    pub fn fill(&self, key: &CacheKey) -> CacheResult<FillStatus> {
        match self.status(key) {
            Some(status) if status.is_settled() => return Ok(status),
            Some(_) => {}
            None => self.declare(*key, self.settings.synthesis.max_support)?,
        }

        let started = Instant::now();
        let status = match self.compute(key) {
            Ok(cell) => self.publish(key, cell),
            Err(e) if e.is_degenerate() => {
                tracing::warn!(store = %self.kind, %key, error = %e, "kernel is degenerate");
                let side = self.status_side(key);
                let factor = match e {
                    CacheError::NormalizationFailure { divisor, .. } => divisor,
                    _ => 0.0,
                };
                self.publish(key, KernelCell::degenerate(side, self.geometry.sampling, factor))
            }
            Err(e) => {
                self.metrics.failed.inc();
                tracing::warn!(store = %self.kind, %key, error = %e, "fill failed");
                return Err(e);
            }
        };
        self.metrics
            .fill_latency_us
            .observe(started.elapsed().as_secs_f64() * 1.0e6);
        Ok(status)
    }

    fn status_side(&self, key: &CacheKey) -> usize {
        self.cells
            .read()
            .get(key)
            .map(|c| c.side())
            .unwrap_or_else(|| self.canonical_side())
    }

    /// Compute the cell for `key` without touching the map.
    fn compute(&self, key: &CacheKey) -> CacheResult<KernelCell> {
        self.check_key(key)?;
        if self.kind == StoreKind::Weight && self.settings.synthesis.conjugate_beams {
            if let ConjugateRole::Derived { source } = role_of(&self.axes, key) {
                return self.derive(key, &source);
            }
        }
        self.synthesize(key)
    }

    fn derive(&self, key: &CacheKey, source: &CacheKey) -> CacheResult<KernelCell> {
        match self.fill(source)? {
            FillStatus::Filled => {}
            _ => return Err(CacheError::DegenerateKernel { key: *key }),
        }
        let source_cell = self.get(source)?;
        let reuser = ConjugateReuser::new(
            self.settings.resample,
            self.settings.normalize,
            self.settings.synthesis.max_support,
            self.settings.synthesis.margin,
        );
        reuser.derive_from_conjugate(key, source, &source_cell, &self.axes, &self.geometry)
    }

    fn synthesize(&self, key: &CacheKey) -> CacheResult<KernelCell> {
        let synth = KernelSynthesizer::new(self.kind, self.settings.synthesis);
        let raw = synth.synthesize(
            key,
            &self.classification,
            &self.providers,
            &self.geometry,
            &self.axes,
        )?;

        let sampling = self.geometry.sampling;
        let margin_px = self.settings.synthesis.margin * sampling;
        let found = self
            .settings
            .support
            .finder(margin_px)
            .find_support(&raw.array, self.settings.support.threshold)
            .ok_or(CacheError::DegenerateKernel { key: *key })?;

        let support = found
            .radius
            .div_ceil(sampling)
            .max(self.settings.support.min_support)
            .min(self.settings.synthesis.max_support);
        let mut array: KernelArray = raw.array.recenter(self.side_for(support));

        match self.settings.normalize.normalize(
            &mut array,
            support * sampling,
            sampling,
            self.normalize_mode(),
        ) {
            NormalizeOutcome::Degenerate { divisor } => {
                Err(CacheError::NormalizationFailure { key: *key, divisor })
            }
            NormalizeOutcome::Normalized { divisor } => {
                tracing::debug!(
                    store = %self.kind,
                    %key,
                    support,
                    clamped = found.clamped,
                    norm = divisor.norm(),
                    "kernel synthesized"
                );
                Ok(KernelCell::filled(
                    array,
                    support,
                    sampling,
                    divisor.norm(),
                    raw.frequency_hz,
                    raw.w_value,
                )
                .with_conjugate(raw.conjugate_frequency_hz, raw.conjugate_pol))
            }
        }
    }

    /// Store a finished cell unless another fill got there first.
    fn publish(&self, key: &CacheKey, cell: KernelCell) -> FillStatus {
        let status = cell.status();
        let derived = cell.derived_from().is_some();
        {
            let mut cells = self.cells.write();
            if let Some(existing) = cells.get(key) {
                if existing.status().is_settled() {
                    return existing.status();
                }
            }
            cells.insert(*key, cell);
        }
        self.progress.inc();
        match status {
            FillStatus::Filled if derived => {
                self.metrics.filled.inc();
                self.metrics.derived.inc();
            }
            FillStatus::Filled => self.metrics.filled.inc(),
            FillStatus::Degenerate => self.metrics.degenerate.inc(),
            FillStatus::Unfilled => {}
        }
        status
    }

    /// Declare and fill `keys` in order. Failures are recorded per key.
    pub fn fill_all(&self, keys: &[CacheKey]) -> FillReport {
        let mut report = FillReport::default();
        let total = keys.len();
        for (i, key) in keys.iter().enumerate() {
            let result = self
                .declare(*key, self.settings.synthesis.max_support)
                .and_then(|_| self.fill(key));
            report.record(*key, result);
            if (i + 1) % 64 == 0 || i + 1 == total {
                tracing::info!(
                    store = %self.kind,
                    done = i + 1,
                    total,
                    "fill progress"
                );
            }
        }
        self.log_report(&report);
        report
    }

    /// Parallel [`fill_all`](Self::fill_all). Primary keys are filled before
    /// keys derived from a conjugate channel. The report keeps input order.
    pub fn fill_all_parallel(&self, keys: &[CacheKey]) -> FillReport {
        let derived = |k: &CacheKey| {
            self.kind == StoreKind::Weight
                && self.settings.synthesis.conjugate_beams
                && matches!(role_of(&self.axes, k), ConjugateRole::Derived { .. })
        };
        let run = |k: &CacheKey| {
            self.declare(*k, self.settings.synthesis.max_support)
                .and_then(|_| self.fill(k))
        };

        let mut results: Vec<Option<CacheResult<FillStatus>>> = keys
            .par_iter()
            .map(|k| if derived(k) { None } else { Some(run(k)) })
            .collect();
        results
            .par_iter_mut()
            .zip(keys.par_iter())
            .filter(|(slot, _)| slot.is_none())
            .for_each(|(slot, k)| *slot = Some(run(k)));

        let mut report = FillReport::default();
        for (key, result) in keys.iter().zip(results) {
            if let Some(result) = result {
                report.record(*key, result);
            }
        }
        self.log_report(&report);
        report
    }

    fn log_report(&self, report: &FillReport) {
        tracing::info!(
            store = %self.kind,
            filled = report.filled.len(),
            degenerate = report.degenerate.len(),
            failed = report.failures.len(),
            "fill batch complete"
        );
        for (key, err) in &report.failures {
            tracing::warn!(store = %self.kind, %key, error = %err, "key not filled");
        }
    }

    /// Bytes held by kernel samples.
    pub fn memory_usage(&self) -> usize {
        self.cells.read().values().map(|c| c.memory_bytes()).sum()
    }

    /// Per-key support table. Logged at info level.
    pub fn summary(&self) -> StoreSummary {
        let cells = self.cells.read();
        let rows: Vec<SummaryRow> = cells
            .iter()
            .map(|(key, cell)| SummaryRow {
                key: *key,
                status: cell.status(),
                support: cell.support(),
                side: cell.side(),
                derived_from: cell.derived_from(),
            })
            .collect();
        let memory_bytes = cells.values().map(|c| c.memory_bytes()).sum();
        drop(cells);

        let summary = StoreSummary {
            kind: self.kind,
            rows,
            memory_bytes,
        };
        tracing::info!(
            store = %self.kind,
            cells = summary.rows.len(),
            filled = summary.count(FillStatus::Filled),
            degenerate = summary.count(FillStatus::Degenerate),
            unfilled = summary.count(FillStatus::Unfilled),
            derived = summary.derived(),
            max_support = summary.max_support(),
            memory_mib = summary.memory_bytes as f64 / (1024.0 * 1024.0),
            "kernel cache summary"
        );
        for row in &summary.rows {
            tracing::debug!(
                store = %self.kind,
                key = %row.key,
                status = %row.status,
                support = row.support,
                side = row.side,
                "cell"
            );
        }
        summary
    }
}

/// Signal and weight stores built for one dataset and grid.
pub struct KernelCaches {
    classifier: BaselineClassifier,
    antenna_count: usize,
    axes: KernelAxes,
    providers: TermProviders,
    settings: StoreSettings,
    stores: Option<(KernelCacheStore, KernelCacheStore)>,
}

impl KernelCaches {
    pub fn new(axes: KernelAxes, providers: TermProviders, settings: StoreSettings) -> Self {
        Self {
            classifier: BaselineClassifier::new(),
            antenna_count: 0,
            axes,
            providers,
            settings,
            stores: None,
        }
    }

    /// Make sure both stores match `dataset`, `antennas` and `geometry`.
    ///
    /// Returns `true` when the stores were (re)built, which drops every
    /// cached kernel.
    pub fn ensure(
        &mut self,
        dataset: &DatasetId,
        antennas: &[AntennaDescriptor],
        geometry: &GridGeometry,
    ) -> CacheResult<bool> {
        if antennas.len() != self.antenna_count {
            self.classifier.reset();
        }
        let (classification, recomputed) = self.classifier.classify_for(dataset, antennas)?;
        let unchanged = !recomputed
            && matches!(
                &self.stores,
                Some((s, _)) if s.geometry == *geometry && s.dataset == *dataset
            );
        if unchanged {
            return Ok(false);
        }

        let classification = Arc::new(classification.clone());
        let build = |kind| {
            KernelCacheStore::new(
                kind,
                dataset.clone(),
                Arc::clone(&classification),
                *geometry,
                self.axes.clone(),
                self.providers.clone(),
                self.settings,
            )
        };
        let signal = build(StoreKind::Signal)?;
        let weight = build(StoreKind::Weight)?;
        self.stores = Some((signal, weight));
        self.antenna_count = antennas.len();
        tracing::info!(
            dataset = %dataset,
            baselines = classification.realized_baselines().count(),
            nx = geometry.nx,
            sampling = geometry.sampling,
            "kernel caches rebuilt"
        );
        Ok(true)
    }

    pub fn signal(&self) -> Option<&KernelCacheStore> {
        self.stores.as_ref().map(|(s, _)| s)
    }

    pub fn weight(&self) -> Option<&KernelCacheStore> {
        self.stores.as_ref().map(|(_, w)| w)
    }

    pub fn store(&self, kind: StoreKind) -> Option<&KernelCacheStore> {
        match kind {
            StoreKind::Signal => self.signal(),
            StoreKind::Weight => self.weight(),
        }
    }

    fn stores(&self) -> CacheResult<&(KernelCacheStore, KernelCacheStore)> {
        self.stores
            .as_ref()
            .ok_or_else(not_built)
    }

    /// Every key the current dataset needs: realized baselines × channels ×
    /// w-planes × polarization terms (× parallactic-angle bins).
    pub fn required_keys(&self) -> CacheResult<Vec<CacheKey>> {
        let (signal, _) = self.stores()?;
        let axes = &self.axes;
        let pa_bins: Vec<Option<u32>> = if axes.pa_bins.is_empty() {
            vec![None]
        } else {
            (0..axes.pa_bins.len() as u32).map(Some).collect()
        };
        let mut keys = Vec::new();
        for baseline in signal.classification.realized_baselines() {
            for channel in 0..axes.frequencies.len() as u32 {
                for w_plane in 0..axes.w_values.len() as u32 {
                    for pol in 0..axes.pol_terms.len() as u32 {
                        for pa in &pa_bins {
                            let key = CacheKey::new(baseline, channel, w_plane, pol);
                            keys.push(match pa {
                                Some(bin) => key.with_pa_bin(*bin),
                                None => key,
                            });
                        }
                    }
                }
            }
        }
        Ok(keys)
    }

    /// Declare every required key in both stores.
    pub fn declare_all(&self) -> CacheResult<usize> {
        let keys = self.required_keys()?;
        let (signal, weight) = self.stores()?;
        let hint = self.settings.synthesis.max_support;
        for key in &keys {
            signal.declare(*key, hint)?;
            weight.declare(*key, hint)?;
        }
        Ok(keys.len())
    }

    /// Fill every required key of both stores.
    pub fn fill_everything(&self, parallel: bool) -> CacheResult<(FillReport, FillReport)> {
        let keys = self.required_keys()?;
        let (signal, weight) = self.stores()?;
        Ok(if parallel {
            (signal.fill_all_parallel(&keys), weight.fill_all_parallel(&keys))
        } else {
            (signal.fill_all(&keys), weight.fill_all(&keys))
        })
    }

    /// Persist both stores under `root`.
    pub fn persist(&mut self, root: &std::path::Path) -> CacheResult<()> {
        let (signal, weight) = self
            .stores
            .as_mut()
            .ok_or_else(not_built)?;
        signal.persist(root)?;
        weight.persist(root)?;
        Ok(())
    }

    /// Load both stores from `root`.
    pub fn load(&mut self, root: &std::path::Path) -> CacheResult<(LoadReport, LoadReport)> {
        let (signal, weight) = self
            .stores
            .as_mut()
            .ok_or_else(not_built)?;
        Ok((signal.load(root)?, weight.load(root)?))
    }

    /// [`ensure`](Self::ensure), then restore freshly built stores from
    /// the on-disk cache when `cache.load_on_start` is set.
    ///
    /// A cache that cannot be read is logged and skipped; the stores stay
    /// empty and fill on demand.
    pub fn open(
        &mut self,
        dataset: &DatasetId,
        antennas: &[AntennaDescriptor],
        geometry: &GridGeometry,
        cache: &CacheDirConfig,
    ) -> CacheResult<bool> {
        let rebuilt = self.ensure(dataset, antennas, geometry)?;
        if !rebuilt || !cache.load_on_start {
            return Ok(rebuilt);
        }
        match self.load(&cache.root) {
            Ok((signal, weight)) => tracing::info!(
                dataset = %dataset,
                signal = signal.loaded,
                weight = weight.loaded,
                failures = signal.failures.len() + weight.failures.len(),
                "kernel caches restored"
            ),
            Err(e) => tracing::warn!(
                dataset = %dataset,
                root = %cache.root.display(),
                error = %e,
                "kernel cache not restored"
            ),
        }
        Ok(rebuilt)
    }
}

fn not_built() -> CacheError {
    CacheError::InvalidParameter("kernel caches not built; call ensure first".into())
}
