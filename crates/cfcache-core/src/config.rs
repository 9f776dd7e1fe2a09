//! # Configuration
//!
//! YAML configuration for a kernel cache: grid, axes, support search,
//! resampling, normalization, synthesis, on-disk cache location and logging.
//!
//! ## Configuration Search Path
//!
//! Configuration is loaded from the first file found:
//! 1. Path specified via `CFCACHE_CONFIG` environment variable
//! 2. `./cfcache.yaml` (current directory)
//! 3. `~/.config/cfcache/config.yaml` (user config)
//! 4. `/etc/cfcache/config.yaml` (system config)
//!
//! ## Example Configuration
//!
//! ```yaml
//! grid:
//!   nx: 2048
//!   ny: 2048
//!   cell_size_rad: 4.8e-6
//!   sampling: 20
//!
//! axes:
//!   frequencies: [1.0e9, 1.1e9, 1.2e9]
//!   reference_frequency: 1.1e9
//!   w_values: [0.0, 250.0, 500.0]
//!
//! support:
//!   threshold: 1.0e-3
//!
//! synthesis:
//!   max_support: 16
//!   conjugate_beams: true
//!
//! cache:
//!   root: "/scratch/cf"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::grid::{GridGeometry, KernelAxes};
use crate::normalize::Normalizer;
use crate::observe::LogConfig;
use crate::resample::Resampler;
use crate::store::StoreSettings;
use crate::support::SupportSettings;
use crate::synth::SynthesisSettings;

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "CFCACHE_CONFIG";

/// Error type for configuration operations.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Configuration file not found
    NotFound(String),
    /// Failed to read or write configuration file
    ReadError(String),
    /// Failed to parse configuration
    ParseError(String),
    /// Invalid configuration value
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(msg) => write!(f, "config not found: {}", msg),
            ConfigError::ReadError(msg) => write!(f, "failed to read config: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "failed to parse config: {}", msg),
            ConfigError::ValidationError(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// On-disk cache location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheDirConfig {
    /// Directory holding one container per dataset
    pub root: PathBuf,
    /// Try loading persisted stores before synthesizing
    pub load_on_start: bool,
}

impl Default for CacheDirConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./cfcache"),
            load_on_start: true,
        }
    }
}

/// Complete cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CacheConfig {
    pub grid: GridGeometry,
    pub axes: KernelAxes,
    pub support: SupportSettings,
    pub resample: Resampler,
    pub normalize: Normalizer,
    pub synthesis: SynthesisSettings,
    pub cache: CacheDirConfig,
    pub logging: LogConfig,
}

impl CacheConfig {
    /// Load configuration from the default search path.
    ///
    /// Returns the default configuration if no file is found.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(ConfigError::NotFound(format!(
                    "{} points at {}",
                    CONFIG_ENV,
                    path.display()
                )));
            }
            return Self::load_from(&path);
        }

        for path in Self::config_search_paths() {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading configuration");
                return Self::load_from(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load and validate configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))
    }

    /// Configuration search paths, environment variable excluded.
    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./cfcache.yaml")];
        if let Some(dirs) = directories::ProjectDirs::from("", "", "cfcache") {
            paths.push(dirs.config_dir().join("config.yaml"));
        }
        paths.push(PathBuf::from("/etc/cfcache/config.yaml"));
        paths
    }

    /// Settings shared by the signal and weight stores.
    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            support: self.support,
            resample: self.resample,
            normalize: self.normalize,
            synthesis: self.synthesis,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.grid
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        let axes = &self.axes;
        if axes.frequencies.is_empty() || axes.w_values.is_empty() || axes.pol_terms.is_empty() {
            return Err(ConfigError::ValidationError(
                "axes need at least one frequency, w value and polarization term".to_string(),
            ));
        }
        if self.axes.frequencies.iter().any(|f| !(f.is_finite() && *f > 0.0)) {
            return Err(ConfigError::ValidationError(
                "frequencies must be positive".to_string(),
            ));
        }
        if !(self.axes.reference_frequency.is_finite() && self.axes.reference_frequency > 0.0) {
            return Err(ConfigError::ValidationError(
                "reference_frequency must be positive".to_string(),
            ));
        }
        if !(self.support.threshold > 0.0 && self.support.threshold < 1.0) {
            return Err(ConfigError::ValidationError(
                "support threshold must be in (0, 1)".to_string(),
            ));
        }
        let increment = self.support.angular_increment;
        if !(increment > 0.0 && increment <= std::f64::consts::PI) {
            return Err(ConfigError::ValidationError(
                "angular_increment must be in (0, pi]".to_string(),
            ));
        }
        let max_support = self.synthesis.max_support;
        if max_support == 0 || self.support.min_support > max_support {
            return Err(ConfigError::ValidationError(
                "need 1 <= min_support <= max_support".to_string(),
            ));
        }
        if self.resample.lobes == 0 {
            return Err(ConfigError::ValidationError("resample lobes must be >= 1".to_string()));
        }
        if !(self.normalize.epsilon >= 0.0) {
            return Err(ConfigError::ValidationError(
                "normalize epsilon must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Generate example configuration YAML.
    pub fn example_yaml() -> String {
        let config = Self {
            synthesis: SynthesisSettings {
                conjugate_beams: true,
                ..Default::default()
            },
            ..Default::default()
        };
        serde_yaml::to_string(&config).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::MuellerTerm;
    use crate::observe::{LogFormat, LogLevel};
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.root, PathBuf::from("./cfcache"));
        assert!(!config.synthesis.conjugate_beams);
        assert_eq!(config.store_settings(), StoreSettings::default());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
grid:
  nx: 1024
  ny: 1024
  cell_size_rad: 5.0e-6
  sampling: 8

axes:
  frequencies: [1.0e9, 1.2e9]
  reference_frequency: 1.1e9
  w_values: [0.0, 300.0]
  pol_terms:
    - { row: 0, col: 0 }
    - { row: 3, col: 3 }

support:
  threshold: 1.0e-4

synthesis:
  max_support: 12
  conjugate_beams: true

cache:
  root: /scratch/cf

logging:
  level: debug
  format: json
"#;
        let config = CacheConfig::parse(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.grid.sampling, 8);
        assert_eq!(config.axes.frequencies, vec![1.0e9, 1.2e9]);
        assert_eq!(config.axes.pol_terms[1], MuellerTerm::new(3, 3));
        assert_eq!(config.support.threshold, 1.0e-4);
        // unspecified fields keep their defaults
        assert_eq!(config.support.min_support, SupportSettings::default().min_support);
        assert_eq!(config.synthesis.max_support, 12);
        assert_eq!(config.synthesis.margin, SynthesisSettings::default().margin);
        assert!(config.synthesis.conjugate_beams);
        assert_eq!(config.cache.root, PathBuf::from("/scratch/cf"));
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.store_settings().synthesis.max_support, 12);
    }

    #[test]
    fn test_validation() {
        let mut config = CacheConfig::default();
        config.support.threshold = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let mut config = CacheConfig::default();
        config.grid.sampling = 0;
        assert!(config.validate().is_err());

        let mut config = CacheConfig::default();
        config.axes.frequencies.clear();
        assert!(config.validate().is_err());

        let mut config = CacheConfig::default();
        config.support.min_support = config.synthesis.max_support + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cfcache.yaml");
        let mut config = CacheConfig::default();
        config.axes.w_values = vec![0.0, 125.0, 250.0];
        config.synthesis.conjugate_beams = true;
        config.logging = LogConfig::production();
        config.save(&path).unwrap();

        let loaded = CacheConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "grid: [1, 2").unwrap();
        assert!(matches!(CacheConfig::load_from(&path), Err(ConfigError::ParseError(_))));
        assert!(matches!(
            CacheConfig::load_from(&dir.path().join("missing.yaml")),
            Err(ConfigError::ReadError(_))
        ));
    }

    #[test]
    fn test_example_yaml() {
        let yaml = CacheConfig::example_yaml();
        assert!(yaml.contains("synthesis:"));
        assert!(yaml.contains("conjugate_beams: true"));
        assert!(CacheConfig::parse(&yaml).is_ok());
    }

    #[test]
    fn test_config_search_paths() {
        let paths = CacheConfig::config_search_paths();
        assert!(paths[0].ends_with("cfcache.yaml"));
        assert!(paths.last().unwrap().starts_with("/etc/cfcache"));
    }
}
