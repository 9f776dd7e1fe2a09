//! # Store Persistence
//!
//! Stores are written to a directory per dataset:
//!
//! ```text
//!   <root>/<dataset>/index.json              container manifest
//!   <root>/<dataset>/signal/bl0_ch3_w1_p0.json   cell record
//!   <root>/<dataset>/signal/bl0_ch3_w1_p0.cf64   samples (filled cells only)
//!   <root>/<dataset>/weight/...
//! ```
//!
//! Records are JSON. Samples are little-endian f64 `(re, im)` pairs in
//! row-major order. Floating-point metadata is stored as IEEE-754 bit
//! patterns so a round trip is exact.
//!
//! A missing or unreadable manifest fails the whole load. A bad record
//! only fails its own key, which is left declared but unfilled so it can be
//! synthesized again. Record and payload files of keys the store no longer
//! holds are removed on persist.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::array::KernelArray;
use crate::cell::{FillStatus, KernelCell, KernelMetadata};
use crate::grid::{GridGeometry, MuellerTerm};
use crate::key::{CacheKey, DatasetId, StoreKind};
use crate::store::KernelCacheStore;
use crate::types::{CacheError, CacheResult, Complex};

/// Version written into every manifest.
pub const FORMAT_VERSION: u32 = 1;

/// Name of the container manifest.
pub const INDEX_FILE: &str = "index.json";

const RECORD_EXT: &str = "json";
const PAYLOAD_EXT: &str = "cf64";

/// Keys and shape parameters of one persisted store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreManifest {
    pub kind: StoreKind,
    pub sampling: usize,
    pub margin: usize,
    pub max_support: usize,
    pub keys: Vec<CacheKey>,
}

/// Container manifest, one per dataset directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerManifest {
    pub format_version: u32,
    pub dataset: DatasetId,
    pub geometry: GridGeometry,
    pub stores: Vec<StoreManifest>,
}

impl ContainerManifest {
    pub fn new(dataset: DatasetId, geometry: GridGeometry) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            dataset,
            geometry,
            stores: Vec::new(),
        }
    }

    pub fn store(&self, kind: StoreKind) -> Option<&StoreManifest> {
        self.stores.iter().find(|s| s.kind == kind)
    }

    /// Insert or replace the entry for `entry.kind`.
    pub fn upsert(&mut self, entry: StoreManifest) {
        match self.stores.iter_mut().find(|s| s.kind == entry.kind) {
            Some(slot) => *slot = entry,
            None => self.stores.push(entry),
        }
    }
}

/// Metadata record of one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CellRecord {
    key: CacheKey,
    status: FillStatus,
    side: usize,
    sampling: usize,
    support: usize,
    norm_factor_bits: u64,
    frequency_bits: u64,
    w_value_bits: u64,
    #[serde(default)]
    conjugate_frequency_bits: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    conjugate_pol: Option<MuellerTerm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    derived_from: Option<CacheKey>,
    /// Complex samples in the payload file (0 when there is none)
    samples: usize,
}

impl CellRecord {
    fn from_cell(key: &CacheKey, cell: &KernelCell) -> Self {
        let meta = cell.metadata();
        let samples = match meta.status {
            FillStatus::Filled => cell.array().data().len(),
            _ => 0,
        };
        Self {
            key: *key,
            status: meta.status,
            side: meta.side,
            sampling: meta.sampling,
            support: meta.support,
            norm_factor_bits: meta.norm_factor.to_bits(),
            frequency_bits: meta.frequency_hz.to_bits(),
            w_value_bits: meta.w_value.to_bits(),
            conjugate_frequency_bits: meta.conjugate_frequency_hz.to_bits(),
            conjugate_pol: meta.conjugate_pol,
            derived_from: meta.derived_from,
            samples,
        }
    }

    fn metadata(&self) -> KernelMetadata {
        KernelMetadata {
            support: self.support,
            sampling: self.sampling,
            side: self.side,
            status: self.status,
            norm_factor: f64::from_bits(self.norm_factor_bits),
            derived_from: self.derived_from,
            frequency_hz: f64::from_bits(self.frequency_bits),
            w_value: f64::from_bits(self.w_value_bits),
            conjugate_frequency_hz: f64::from_bits(self.conjugate_frequency_bits),
            conjugate_pol: self.conjugate_pol,
        }
    }
}

/// Outcome of loading one store.
#[derive(Debug)]
pub struct LoadReport {
    pub kind: StoreKind,
    /// Keys restored from disk
    pub loaded: usize,
    /// Keys whose record could not be read; left unfilled
    pub failures: Vec<(CacheKey, CacheError)>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

fn persistence_error(path: &Path, reason: impl ToString) -> CacheError {
    CacheError::Persistence {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Directory holding every store of `dataset` under `root`.
///
/// Characters outside `[A-Za-z0-9._-]` are replaced so that any dataset
/// name maps to a single path component.
pub fn container_dir(root: &Path, dataset: &DatasetId) -> PathBuf {
    let name: String = dataset
        .as_str()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let name = if name.is_empty() || name == "." || name == ".." {
        format!("dataset{}", name.replace('.', "_"))
    } else {
        name
    };
    root.join(name)
}

/// Read `<dir>/index.json`.
pub fn read_manifest(dir: &Path) -> CacheResult<ContainerManifest> {
    let path = dir.join(INDEX_FILE);
    let file = File::open(&path).map_err(|e| persistence_error(&path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| persistence_error(&path, e))
}

/// Write `<dir>/index.json` through a temporary file and a rename.
pub fn write_manifest(dir: &Path, manifest: &ContainerManifest) -> CacheResult<()> {
    let path = dir.join(INDEX_FILE);
    let tmp = dir.join(format!("{}.tmp", INDEX_FILE));
    {
        let file = File::create(&tmp).map_err(|e| persistence_error(&tmp, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, manifest)?;
        writer.flush()?;
    }
    fs::rename(&tmp, &path).map_err(|e| persistence_error(&path, e))
}

fn record_path(store_dir: &Path, key: &CacheKey) -> PathBuf {
    store_dir.join(format!("{}.{}", key.file_stem(), RECORD_EXT))
}

fn payload_path(store_dir: &Path, key: &CacheKey) -> PathBuf {
    store_dir.join(format!("{}.{}", key.file_stem(), PAYLOAD_EXT))
}

/// Write the record (and payload, for filled cells) of one cell.
pub fn write_cell(store_dir: &Path, key: &CacheKey, cell: &KernelCell) -> CacheResult<()> {
    let record = CellRecord::from_cell(key, cell);
    let payload = payload_path(store_dir, key);

    if record.samples > 0 {
        let file = File::create(&payload).map_err(|e| persistence_error(&payload, e))?;
        let mut writer = BufWriter::new(file);
        for sample in cell.array().data() {
            writer.write_f64::<LittleEndian>(sample.re)?;
            writer.write_f64::<LittleEndian>(sample.im)?;
        }
        writer.flush()?;
    } else if payload.exists() {
        fs::remove_file(&payload).map_err(|e| persistence_error(&payload, e))?;
    }

    let path = record_path(store_dir, key);
    let file = File::create(&path).map_err(|e| persistence_error(&path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &record)?;
    writer.flush()?;
    Ok(())
}

/// Read one cell back. Records with an odd side, or a side above
/// `max_side`, are rejected before anything is allocated.
pub fn read_cell(store_dir: &Path, key: &CacheKey, max_side: usize) -> CacheResult<KernelCell> {
    let path = record_path(store_dir, key);
    let file = File::open(&path).map_err(|e| persistence_error(&path, e))?;
    let record: CellRecord =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| persistence_error(&path, e))?;
    if record.key != *key {
        return Err(persistence_error(
            &path,
            format!("record holds key {} instead of {}", record.key, key),
        ));
    }
    if record.side % 2 != 0 || record.side > max_side {
        return Err(persistence_error(
            &path,
            format!("side {} is odd or larger than {}", record.side, max_side),
        ));
    }

    let meta = record.metadata();
    match record.status {
        FillStatus::Unfilled => Ok(KernelCell::unfilled(record.side, record.sampling)),
        FillStatus::Degenerate => {
            Ok(KernelCell::from_parts(KernelArray::zeros(record.side), meta))
        }
        FillStatus::Filled => {
            let expected = record
                .side
                .checked_mul(record.side)
                .ok_or_else(|| persistence_error(&path, "kernel side overflows"))?;
            if record.samples != expected {
                return Err(persistence_error(
                    &path,
                    format!(
                        "{} samples recorded for a {}x{} kernel",
                        record.samples, record.side, record.side
                    ),
                ));
            }
            let data_path = payload_path(store_dir, key);
            let file = File::open(&data_path).map_err(|e| persistence_error(&data_path, e))?;
            let bytes = file.metadata()?.len();
            let expected_bytes = (expected as u64)
                .checked_mul(16)
                .ok_or_else(|| persistence_error(&data_path, "payload size overflows"))?;
            if bytes != expected_bytes {
                return Err(persistence_error(
                    &data_path,
                    format!("payload has {} bytes, expected {}", bytes, expected_bytes),
                ));
            }
            let mut reader = BufReader::new(file);
            let mut data = Vec::with_capacity(expected);
            for _ in 0..expected {
                let re = reader.read_f64::<LittleEndian>()?;
                let im = reader.read_f64::<LittleEndian>()?;
                data.push(Complex::new(re, im));
            }
            Ok(KernelCell::from_parts(KernelArray::from_vec(record.side, data)?, meta))
        }
    }
}

/// Remove record and payload files whose stem names a key outside `keep`.
/// Files that do not parse as a key are left alone.
fn prune_stale(store_dir: &Path, keep: &BTreeMap<CacheKey, KernelCell>) -> CacheResult<usize> {
    let mut removed = 0;
    let entries = fs::read_dir(store_dir).map_err(|e| persistence_error(store_dir, e))?;
    for entry in entries {
        let path = entry?.path();
        let ext = path.extension().and_then(|e| e.to_str());
        if !matches!(ext, Some(RECORD_EXT) | Some(PAYLOAD_EXT)) {
            continue;
        }
        let stale = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(CacheKey::parse_stem)
            .is_some_and(|key| !keep.contains_key(&key));
        if stale {
            fs::remove_file(&path).map_err(|e| persistence_error(&path, e))?;
            removed += 1;
        }
    }
    Ok(removed)
}

impl KernelCacheStore {
    /// Write every cell, placeholders included, and register the store in
    /// the container manifest. Returns the container directory.
    ///
    /// A container that belongs to another dataset (two names can sanitize
    /// to one directory) is never overwritten.
    pub fn persist(&mut self, root: &Path) -> CacheResult<PathBuf> {
        let dir = container_dir(root, &self.dataset);
        let mut manifest = match read_manifest(&dir) {
            Ok(m) if m.dataset != self.dataset => {
                return Err(persistence_error(
                    &dir.join(INDEX_FILE),
                    format!("container belongs to dataset {}", m.dataset),
                ));
            }
            Ok(m) if m.format_version == FORMAT_VERSION && m.geometry == self.geometry => m,
            // unreadable, older format or another grid: start over
            _ => ContainerManifest::new(self.dataset.clone(), self.geometry),
        };

        let store_dir = dir.join(self.kind.dir_name());
        fs::create_dir_all(&store_dir).map_err(|e| persistence_error(&store_dir, e))?;

        let cells = self.cells.get_mut();
        for (key, cell) in cells.iter() {
            write_cell(&store_dir, key, cell)?;
        }
        let pruned = prune_stale(&store_dir, cells)?;

        manifest.upsert(StoreManifest {
            kind: self.kind,
            sampling: self.geometry.sampling,
            margin: self.settings.synthesis.margin,
            max_support: self.settings.synthesis.max_support,
            keys: cells.keys().copied().collect(),
        });
        write_manifest(&dir, &manifest)?;

        tracing::info!(
            store = %self.kind,
            dataset = %self.dataset,
            cells = cells.len(),
            pruned,
            path = %dir.display(),
            "store persisted"
        );
        Ok(dir)
    }

    /// Replace the contents of the store with what was persisted under
    /// `root`.
    pub fn load(&mut self, root: &Path) -> CacheResult<LoadReport> {
        let dir = container_dir(root, &self.dataset);
        let manifest = read_manifest(&dir)?;
        let index = dir.join(INDEX_FILE);
        if manifest.format_version != FORMAT_VERSION {
            return Err(persistence_error(
                &index,
                format!("unsupported format version {}", manifest.format_version),
            ));
        }
        if manifest.dataset != self.dataset {
            return Err(persistence_error(
                &index,
                format!("container belongs to dataset {}", manifest.dataset),
            ));
        }
        if manifest.geometry != self.geometry {
            return Err(persistence_error(&index, "grid geometry differs from this store"));
        }
        let entry = manifest.store(self.kind).ok_or_else(|| {
            persistence_error(&index, format!("no {} store in container", self.kind))
        })?;

        let store_dir = dir.join(self.kind.dir_name());
        let placeholder_side = self.canonical_side();
        let mut cells = BTreeMap::new();
        let mut report = LoadReport {
            kind: self.kind,
            loaded: 0,
            failures: Vec::new(),
        };
        for key in &entry.keys {
            let result = read_cell(&store_dir, key, placeholder_side).and_then(|cell| {
                if cell.sampling() != self.geometry.sampling {
                    Err(persistence_error(
                        &record_path(&store_dir, key),
                        format!("sampling {} does not match grid", cell.sampling()),
                    ))
                } else {
                    Ok(cell)
                }
            });
            match result {
                Ok(cell) => {
                    report.loaded += 1;
                    cells.insert(*key, cell);
                }
                Err(e) => {
                    tracing::warn!(store = %self.kind, %key, error = %e, "cell record not loaded");
                    let cell = KernelCell::unfilled(placeholder_side, self.geometry.sampling);
                    cells.insert(*key, cell);
                    report.failures.push((*key, e));
                }
            }
        }

        *self.cells.get_mut() = cells;
        self.metrics.loaded.inc_by(report.loaded as u64);
        tracing::info!(
            store = %self.kind,
            dataset = %self.dataset,
            loaded = report.loaded,
            failed = report.failures.len(),
            "store loaded"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::BaselineClassId;
    use crate::store::StoreSettings;
    use crate::testing::{self, GaussianBeam};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn key(baseline: u32, channel: u32, w_plane: u32) -> CacheKey {
        CacheKey::new(BaselineClassId(baseline), channel, w_plane, 0)
    }

    /// Two filled, one degenerate and one unfilled cell.
    fn populated(kind: StoreKind) -> KernelCacheStore {
        let store = testing::store(kind, Arc::new(GaussianBeam::dead_at(1.1e9)));
        store.fill(&key(0, 0, 0)).unwrap();
        store.fill(&key(1, 1, 1)).unwrap();
        store.fill(&key(0, 2, 0)).unwrap();
        store.declare(key(1, 0, 1), 3).unwrap();
        store
    }

    #[test]
    fn test_round_trip_is_exact() {
        let dir = TempDir::new().unwrap();
        for kind in [StoreKind::Signal, StoreKind::Weight] {
            let mut original = populated(kind);
            original.persist(dir.path()).unwrap();

            let mut restored = testing::store(kind, Arc::new(GaussianBeam::default()));
            let report = restored.load(dir.path()).unwrap();
            assert_eq!(report.loaded, 4);
            assert!(report.is_complete());
            assert_eq!(restored.keys(), original.keys());
            for k in original.keys() {
                assert_eq!(restored.get(&k).unwrap(), original.get(&k).unwrap(), "{}", k);
            }
            assert_eq!(restored.status(&key(0, 2, 0)), Some(FillStatus::Degenerate));
            assert_eq!(restored.status(&key(1, 0, 1)), Some(FillStatus::Unfilled));
        }

        let container = container_dir(dir.path(), &DatasetId::new("fixture-ms"));
        let manifest = read_manifest(&container).unwrap();
        assert_eq!(manifest.stores.len(), 2);
        assert_eq!(manifest.store(StoreKind::Weight).unwrap().keys.len(), 4);
    }

    #[test]
    fn test_unfilled_cell_has_no_payload() {
        let dir = TempDir::new().unwrap();
        let mut store = populated(StoreKind::Signal);
        let container = store.persist(dir.path()).unwrap();
        let store_dir = container.join("signal");
        assert!(record_path(&store_dir, &key(1, 0, 1)).exists());
        assert!(!payload_path(&store_dir, &key(1, 0, 1)).exists());
        assert!(!payload_path(&store_dir, &key(0, 2, 0)).exists());
        assert!(payload_path(&store_dir, &key(0, 0, 0)).exists());
    }

    #[test]
    fn test_corrupt_record_is_key_local() {
        let dir = TempDir::new().unwrap();
        let mut store = populated(StoreKind::Signal);
        let container = store.persist(dir.path()).unwrap();
        let store_dir = container.join("signal");

        // truncate one payload, garble one record
        let payload = payload_path(&store_dir, &key(0, 0, 0));
        let bytes = fs::read(&payload).unwrap();
        fs::write(&payload, &bytes[..bytes.len() / 2]).unwrap();
        fs::write(record_path(&store_dir, &key(0, 2, 0)), b"{ not json").unwrap();

        let mut restored = testing::store(StoreKind::Signal, Arc::new(GaussianBeam::default()));
        let report = restored.load(dir.path()).unwrap();
        assert_eq!(report.loaded, 2);
        let failed: Vec<CacheKey> = report.failures.iter().map(|(k, _)| *k).collect();
        assert_eq!(failed, vec![key(0, 0, 0), key(0, 2, 0)]);
        assert_eq!(restored.status(&key(0, 0, 0)), Some(FillStatus::Unfilled));
        assert_eq!(restored.status(&key(1, 1, 1)), Some(FillStatus::Filled));

        // the failed key can be synthesized again
        assert_eq!(restored.fill(&key(0, 0, 0)).unwrap(), FillStatus::Filled);
    }

    fn set_side(path: &Path, side: u64) {
        let bytes = fs::read(path).unwrap();
        let mut record: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        record["side"] = serde_json::json!(side);
        fs::write(path, serde_json::to_vec(&record).unwrap()).unwrap();
    }

    #[test]
    fn test_implausible_side_is_key_local() {
        let dir = TempDir::new().unwrap();
        let mut store = populated(StoreKind::Signal);
        let container = store.persist(dir.path()).unwrap();
        let store_dir = container.join("signal");

        // a degenerate record with a 2^32 side, a filled one with an odd side
        set_side(&record_path(&store_dir, &key(0, 2, 0)), 1u64 << 32);
        set_side(&record_path(&store_dir, &key(0, 0, 0)), 47);

        let mut restored = testing::store(StoreKind::Signal, Arc::new(GaussianBeam::default()));
        let report = restored.load(dir.path()).unwrap();
        assert_eq!(report.loaded, 2);
        let failed: Vec<CacheKey> = report.failures.iter().map(|(k, _)| *k).collect();
        assert_eq!(failed, vec![key(0, 0, 0), key(0, 2, 0)]);
        assert!(report
            .failures
            .iter()
            .all(|(_, e)| matches!(e, CacheError::Persistence { .. })));

        let placeholder = restored.metadata(&key(0, 2, 0)).unwrap();
        assert_eq!(placeholder.status, FillStatus::Unfilled);
        assert_eq!(placeholder.side, restored.canonical_side());
        assert_eq!(restored.status(&key(1, 1, 1)), Some(FillStatus::Filled));
    }

    #[test]
    fn test_persist_prunes_records_of_dropped_keys() {
        let dir = TempDir::new().unwrap();
        let mut full = populated(StoreKind::Signal);
        let container = full.persist(dir.path()).unwrap();
        let store_dir = container.join("signal");
        fs::write(store_dir.join("notes.json"), b"{}").unwrap();

        let mut smaller = testing::store(StoreKind::Signal, Arc::new(GaussianBeam::default()));
        smaller.fill(&key(1, 1, 1)).unwrap();
        smaller.persist(dir.path()).unwrap();

        assert!(!record_path(&store_dir, &key(0, 0, 0)).exists());
        assert!(!payload_path(&store_dir, &key(0, 0, 0)).exists());
        assert!(!record_path(&store_dir, &key(1, 0, 1)).exists());
        assert!(record_path(&store_dir, &key(1, 1, 1)).exists());
        assert!(store_dir.join("notes.json").exists());

        let mut restored = testing::store(StoreKind::Signal, Arc::new(GaussianBeam::default()));
        let report = restored.load(dir.path()).unwrap();
        assert_eq!(report.loaded, 1);
        assert_eq!(restored.keys(), vec![key(1, 1, 1)]);
    }

    #[test]
    fn test_other_dataset_container_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let store = |name: &str| {
            testing::build(
                StoreKind::Signal,
                name,
                testing::axes(),
                Arc::new(GaussianBeam::default()),
                StoreSettings::default(),
            )
        };
        assert_eq!(
            container_dir(dir.path(), &DatasetId::new("obs/a")),
            container_dir(dir.path(), &DatasetId::new("obs_a"))
        );

        let mut first = store("obs/a");
        first.fill(&key(0, 0, 0)).unwrap();
        first.persist(dir.path()).unwrap();

        let mut second = store("obs_a");
        second.fill(&key(1, 1, 1)).unwrap();
        assert!(matches!(
            second.persist(dir.path()),
            Err(CacheError::Persistence { .. })
        ));

        let mut restored = store("obs/a");
        let report = restored.load(dir.path()).unwrap();
        assert!(report.is_complete());
        assert_eq!(restored.keys(), vec![key(0, 0, 0)]);
        assert_eq!(restored.get(&key(0, 0, 0)).unwrap(), first.get(&key(0, 0, 0)).unwrap());
    }

    #[test]
    fn test_pa_key_round_trip() {
        let dir = TempDir::new().unwrap();
        let settings = StoreSettings::default();
        let mut store = testing::build(
            StoreKind::Weight,
            "fixture-ms",
            testing::axes_with_pa(),
            Arc::new(GaussianBeam::elongated(1.0)),
            settings,
        );
        let k = key(0, 1, 0).with_pa_bin(1);
        assert_eq!(store.fill(&k).unwrap(), FillStatus::Filled);
        let container = store.persist(dir.path()).unwrap();
        assert!(container.join("weight").join("bl0_ch1_w0_p0_pa1.json").exists());

        let mut restored = testing::build(
            StoreKind::Weight,
            "fixture-ms",
            testing::axes_with_pa(),
            Arc::new(GaussianBeam::default()),
            settings,
        );
        let report = restored.load(dir.path()).unwrap();
        assert_eq!(report.loaded, 1);
        assert_eq!(restored.get(&k).unwrap(), store.get(&k).unwrap());
        let meta = restored.metadata(&k).unwrap();
        assert_eq!(meta.conjugate_pol, Some(MuellerTerm::new(3, 3)));
        assert_eq!(meta.conjugate_frequency_hz, 1.0e9);
    }

    #[test]
    fn test_missing_index_fails_whole_store() {
        let dir = TempDir::new().unwrap();
        let mut store = testing::store(StoreKind::Signal, Arc::new(GaussianBeam::default()));
        assert!(matches!(
            store.load(dir.path()),
            Err(CacheError::Persistence { .. })
        ));

        let mut populated = populated(StoreKind::Signal);
        let container = populated.persist(dir.path()).unwrap();
        fs::write(container.join(INDEX_FILE), b"[]").unwrap();
        let err = store.load(dir.path()).unwrap_err();
        assert!(!err.is_key_local());
    }

    #[test]
    fn test_mismatched_container_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut signal = populated(StoreKind::Signal);
        signal.persist(dir.path()).unwrap();

        // no weight store was written
        let mut weight = testing::store(StoreKind::Weight, Arc::new(GaussianBeam::default()));
        assert!(matches!(weight.load(dir.path()), Err(CacheError::Persistence { .. })));

        // another grid
        let mut other = KernelCacheStore::new(
            StoreKind::Signal,
            DatasetId::new("fixture-ms"),
            Arc::new(testing::classification()),
            GridGeometry::new(128, 128, 1.0e-3, 4),
            testing::axes(),
            testing::providers(Arc::new(GaussianBeam::default())),
            StoreSettings::default(),
        )
        .unwrap();
        assert!(matches!(other.load(dir.path()), Err(CacheError::Persistence { .. })));
    }

    #[test]
    fn test_container_dir_sanitizes_names() {
        let root = Path::new("/cache");
        assert_eq!(
            container_dir(root, &DatasetId::new("obs/2024 run.ms")),
            PathBuf::from("/cache/obs_2024_run.ms")
        );
        assert_eq!(container_dir(root, &DatasetId::new("..")), PathBuf::from("/cache/dataset__"));
    }
}
