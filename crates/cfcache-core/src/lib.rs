//! # Gridding-Kernel Cache
//!
//! Synthesis and caching of the convolution kernels an aperture-synthesis
//! gridder applies to each visibility. A kernel depends on the baseline
//! class, frequency channel, w-plane and polarization term; computing one
//! takes an FFT of a sky-domain screen, so each is built once per dataset
//! and reused.
//!
//! ## Overview
//!
//! - **Classification**: antennas with the same dish model share a class;
//!   unordered class pairs give baseline classes ([`baseline`])
//! - **Synthesis**: beam × beam × taper × w-phase screen, then a centered
//!   2-D FFT ([`synth`], [`providers`])
//! - **Support search**: radial scan for the threshold crossing ([`support`])
//! - **Normalization**: peak for signal kernels, integral for weight
//!   kernels ([`normalize`])
//! - **Conjugate reuse**: weight kernels of a mirrored channel pair are
//!   resampled from one another ([`conjugate`], [`resample`])
//! - **Stores**: a concurrent key → kernel map per store kind, with
//!   on-disk persistence ([`store`], [`persist`])
//!
//! ## Fill Flow
//!
//! ```text
//! key → screen(l,m) → FFT → support radius → trim/recenter → normalize → cell
//!                                    (weight, conjugate mode) ↘ resample partner
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use cfcache_core::baseline::{classify, AntennaDescriptor};
//! use cfcache_core::providers::{ResponseCatalog, TermProviders};
//! use cfcache_core::{CacheConfig, DatasetId, KernelCaches};
//!
//! let config = CacheConfig::load().expect("configuration");
//! let antennas = vec![AntennaDescriptor::airy(12.0), AntennaDescriptor::airy(7.0)];
//! let catalog = ResponseCatalog::airy_from(&classify(&antennas).expect("antennas"));
//!
//! let mut caches = KernelCaches::new(
//!     config.axes.clone(),
//!     TermProviders::standard(catalog),
//!     config.store_settings(),
//! );
//! caches
//!     .open(&DatasetId::new("obs.ms"), &antennas, &config.grid, &config.cache)
//!     .expect("stores");
//! let (signal, weight) = caches.fill_everything(true).expect("fill");
//! println!("{} signal, {} weight kernels", signal.filled.len(), weight.filled.len());
//! caches.persist(&config.cache.root).expect("persist");
//! ```

pub mod array;
pub mod baseline;
pub mod cell;
pub mod config;
pub mod conjugate;
pub mod fft_utils;
pub mod grid;
pub mod key;
pub mod normalize;
pub mod observe;
pub mod persist;
pub mod providers;
pub mod resample;
pub mod store;
pub mod support;
pub mod synth;
pub mod types;

#[cfg(test)]
mod testing;

pub use array::KernelArray;
pub use baseline::{AntennaDescriptor, BaselineClassifier, Classification};
pub use cell::{FillStatus, KernelCell, KernelMetadata};
pub use config::{CacheConfig, ConfigError};
pub use grid::{GridGeometry, KernelAxes, MuellerTerm};
pub use key::{AntennaClassId, BaselineClassId, CacheKey, DatasetId, StoreKind};
pub use persist::LoadReport;
pub use store::{FillReport, KernelCacheStore, KernelCaches, StoreSettings, StoreSummary};
pub use types::{CacheError, CacheResult, Complex};
