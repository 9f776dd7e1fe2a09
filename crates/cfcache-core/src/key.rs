//! Cache key model
//!
//! Every kernel in a store is addressed by a [`CacheKey`]: the baseline class
//! of the antenna pair, the frequency channel, the w-plane, the polarization
//! (Mueller) term and, optionally, a parallactic-angle bin.
//!
//! ```text
//!   CacheKey
//!   ├── baseline  BaselineClassId   (dense, D·(D+1)/2 values)
//!   ├── channel   u32               (index into KernelAxes::frequencies)
//!   ├── w_plane   u32               (index into KernelAxes::w_values)
//!   ├── pol_term  u32               (index into KernelAxes::pol_terms)
//!   └── pa_bin    Option<u32>       (index into KernelAxes::pa_bins)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an antenna class (equal aperture size and model family).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AntennaClassId(pub u32);

impl fmt::Display for AntennaClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}", self.0)
    }
}

/// Identifier of a baseline class (unordered pair of antenna classes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BaselineClassId(pub u32);

impl fmt::Display for BaselineClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// Identity of the dataset a store was built for.
///
/// A change of identity invalidates the antenna classification and with it
/// every cached kernel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetId(pub String);

impl DatasetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which of the two parallel stores a kernel belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Gridding kernels, peak-normalized
    Signal,
    /// Weight kernels, integral-normalized
    Weight,
}

impl StoreKind {
    /// Directory name used by the on-disk container.
    pub const fn dir_name(&self) -> &'static str {
        match self {
            StoreKind::Signal => "signal",
            StoreKind::Weight => "weight",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Composite key of one cached kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub baseline: BaselineClassId,
    pub channel: u32,
    pub w_plane: u32,
    pub pol_term: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pa_bin: Option<u32>,
}

impl CacheKey {
    pub fn new(baseline: BaselineClassId, channel: u32, w_plane: u32, pol_term: u32) -> Self {
        Self {
            baseline,
            channel,
            w_plane,
            pol_term,
            pa_bin: None,
        }
    }

    /// Attach a parallactic-angle bin.
    pub fn with_pa_bin(mut self, pa_bin: u32) -> Self {
        self.pa_bin = Some(pa_bin);
        self
    }

    /// Same key at another frequency channel.
    pub fn at_channel(mut self, channel: u32) -> Self {
        self.channel = channel;
        self
    }

    /// Stable file-name stem, e.g. `bl3_ch0_w2_p0` or `bl3_ch0_w2_p0_pa5`.
    pub fn file_stem(&self) -> String {
        match self.pa_bin {
            Some(pa) => format!(
                "bl{}_ch{}_w{}_p{}_pa{}",
                self.baseline.0, self.channel, self.w_plane, self.pol_term, pa
            ),
            None => format!(
                "bl{}_ch{}_w{}_p{}",
                self.baseline.0, self.channel, self.w_plane, self.pol_term
            ),
        }
    }

    /// Inverse of [`CacheKey::file_stem`].
    pub fn parse_stem(stem: &str) -> Option<Self> {
        let mut key = CacheKey::new(BaselineClassId(0), 0, 0, 0);
        let mut seen = 0u8;
        for part in stem.split('_') {
            if let Some(v) = part.strip_prefix("bl") {
                key.baseline = BaselineClassId(v.parse().ok()?);
                seen |= 1;
            } else if let Some(v) = part.strip_prefix("ch") {
                key.channel = v.parse().ok()?;
                seen |= 2;
            } else if let Some(v) = part.strip_prefix("pa") {
                key.pa_bin = Some(v.parse().ok()?);
            } else if let Some(v) = part.strip_prefix('w') {
                key.w_plane = v.parse().ok()?;
                seen |= 4;
            } else if let Some(v) = part.strip_prefix('p') {
                key.pol_term = v.parse().ok()?;
                seen |= 8;
            } else {
                return None;
            }
        }
        (seen == 0b1111).then_some(key)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} ch={} w={} pol={}",
            self.baseline, self.channel, self.w_plane, self.pol_term
        )?;
        if let Some(pa) = self.pa_bin {
            write!(f, " pa={}", pa)?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stem_round_trip() {
        let key = CacheKey::new(BaselineClassId(3), 7, 2, 1);
        assert_eq!(key.file_stem(), "bl3_ch7_w2_p1");
        assert_eq!(CacheKey::parse_stem(&key.file_stem()), Some(key));

        let with_pa = key.with_pa_bin(12);
        assert_eq!(with_pa.file_stem(), "bl3_ch7_w2_p1_pa12");
        assert_eq!(CacheKey::parse_stem(&with_pa.file_stem()), Some(with_pa));
    }

    #[test]
    fn test_parse_stem_rejects_garbage() {
        assert_eq!(CacheKey::parse_stem("bl1_ch2_w3"), None);
        assert_eq!(CacheKey::parse_stem("bl1_ch2_w3_p4_zz"), None);
        assert_eq!(CacheKey::parse_stem("blx_ch2_w3_p4"), None);
    }

    #[test]
    fn test_key_ordering_is_lexicographic() {
        let a = CacheKey::new(BaselineClassId(0), 1, 0, 0);
        let b = CacheKey::new(BaselineClassId(0), 0, 5, 0);
        let c = CacheKey::new(BaselineClassId(1), 0, 0, 0);
        let mut keys = vec![c, a, b];
        keys.sort();
        assert_eq!(keys, vec![b, a, c]);
    }

    #[test]
    fn test_display() {
        let key = CacheKey::new(BaselineClassId(2), 1, 0, 3).with_pa_bin(4);
        assert_eq!(key.to_string(), "[B2 ch=1 w=0 pol=3 pa=4]");
        assert_eq!(StoreKind::Weight.to_string(), "weight");
    }
}
