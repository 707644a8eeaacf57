//! Configuration management for the A2DP offload session manager
//!
//! Platform integrators describe the offload feature flags, AAC encoder shape
//! selection, per-codec encoder latency offsets and the Bluetooth IPC library
//! names in a TOML file. Every field has a default so a partial (or missing)
//! file is always usable.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Standard configuration paths
pub const CONFIG_DIR: &str = "/vendor/etc/a2dp-offload";
pub const USER_CONFIG_DIR: &str = "/data/vendor/a2dp-offload";
pub const CONFIG_FILE: &str = "offload.toml";

/// Main offload configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OffloadConfig {
    #[serde(default)]
    pub offload: OffloadSettings,

    #[serde(default)]
    pub aac: AacSettings,

    #[serde(default)]
    pub latency: LatencyOverrides,

    #[serde(default)]
    pub libraries: LibraryConfig,
}

/// Feature switches for the offload path as a whole
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffloadSettings {
    /// Platform advertises A2DP offload support
    #[serde(default = "default_true")]
    pub supported: bool,

    /// Offload was switched off by the integrator or the user
    #[serde(default)]
    pub disabled: bool,
}

impl Default for OffloadSettings {
    fn default() -> Self {
        Self {
            supported: true,
            disabled: false,
        }
    }
}

/// Selects which AAC encoder configuration shape the stack reports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AacSettings {
    /// Stack appends the frame-size control pair
    #[serde(default)]
    pub frame_control: bool,

    /// Stack appends the frame-size control and the VBR control pair.
    /// Takes precedence over `frame_control`.
    #[serde(default)]
    pub vbr_control: bool,
}

/// Per-codec encoder latency offsets in milliseconds.
///
/// The offsets replace the built-in encoder latency only when all six are set,
/// mirroring how the platform's A/V sync tuning is delivered as one tuple.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyOverrides {
    #[serde(default)]
    pub sbc: Option<u32>,
    #[serde(default)]
    pub aptx: Option<u32>,
    #[serde(default)]
    pub aptx_hd: Option<u32>,
    #[serde(default)]
    pub aac: Option<u32>,
    #[serde(default)]
    pub celt: Option<u32>,
    #[serde(default)]
    pub ldac: Option<u32>,
}

impl LatencyOverrides {
    /// Offsets as one complete tuple (sbc, aptx, aptx_hd, aac, celt, ldac)
    pub fn complete(&self) -> Option<[u32; 6]> {
        Some([
            self.sbc?,
            self.aptx?,
            self.aptx_hd?,
            self.aac?,
            self.celt?,
            self.ldac?,
        ])
    }
}

/// Bluetooth IPC library names bound by the integrating process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryConfig {
    #[serde(default = "default_source_library")]
    pub source: String,

    #[serde(default = "default_sink_library")]
    pub sink: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            source: default_source_library(),
            sink: default_sink_library(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_source_library() -> String {
    "btaudio_offload_if.so".to_string()
}

fn default_sink_library() -> String {
    "libbthost_if_sink.so".to_string()
}

impl OffloadConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load_default() -> Result<Self, ConfigError> {
        // User config first, then the vendor image
        let user_config = Path::new(USER_CONFIG_DIR).join(CONFIG_FILE);
        if user_config.exists() {
            return Self::load(&user_config);
        }

        let system_config = Path::new(CONFIG_DIR).join(CONFIG_FILE);
        if system_config.exists() {
            return Self::load(&system_config);
        }

        tracing::warn!("No offload configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        tracing::info!("Offload configuration saved to {}", path.display());
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.libraries.source.is_empty() || self.libraries.sink.is_empty() {
            return Err(ConfigError::Invalid(
                "IPC library names must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Offload is usable only when supported and not disabled
    pub fn is_offload_enabled(&self) -> bool {
        self.offload.supported && !self.offload.disabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = OffloadConfig::default();
        assert!(config.is_offload_enabled());
        assert!(!config.aac.frame_control);
        assert!(!config.aac.vbr_control);
        assert_eq!(config.latency.complete(), None);
        assert_eq!(config.libraries.source, "btaudio_offload_if.so");
    }

    #[test]
    fn test_disabled_offload() {
        let mut config = OffloadConfig::default();
        config.offload.disabled = true;
        assert!(!config.is_offload_enabled());

        config.offload.disabled = false;
        config.offload.supported = false;
        assert!(!config.is_offload_enabled());
    }

    #[test]
    fn test_load_partial_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let config_content = r#"
[aac]
vbr_control = true

[latency]
sbc = 12
"#;
        write!(temp_file, "{}", config_content).unwrap();

        let config = OffloadConfig::load(temp_file.path()).unwrap();
        assert!(config.aac.vbr_control);
        assert!(!config.aac.frame_control);
        assert_eq!(config.latency.sbc, Some(12));
        // A single offset is not a complete tuple
        assert_eq!(config.latency.complete(), None);
        assert!(config.is_offload_enabled());
    }

    #[test]
    fn test_complete_latency_tuple() {
        let overrides = LatencyOverrides {
            sbc: Some(1),
            aptx: Some(2),
            aptx_hd: Some(3),
            aac: Some(4),
            celt: Some(5),
            ldac: Some(6),
        };
        assert_eq!(overrides.complete(), Some([1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn test_load_missing_file() {
        let err = OffloadConfig::load(Path::new("/nonexistent/offload.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_invalid_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "[libraries]\nsource = \"\"\n").unwrap();
        let err = OffloadConfig::load(temp_file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "[offload\n").unwrap();
        let err = OffloadConfig::load(temp_file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }

    #[test]
    fn test_save_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let mut config = OffloadConfig::default();
        config.aac.frame_control = true;
        config.latency.ldac = Some(35);

        config.save(&path).unwrap();

        let loaded = OffloadConfig::load(&path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::NotFound(PathBuf::from("/vendor/etc/a2dp-offload/offload.toml"));
        assert!(format!("{}", err).contains("not found"));

        let err = ConfigError::Invalid("bad".to_string());
        assert!(format!("{}", err).contains("Invalid"));
    }
}
