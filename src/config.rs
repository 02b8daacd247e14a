//! User settings persisted as TOML in the platform config directory.
//!
//! A missing file means defaults. A malformed file is logged and also falls
//! back to defaults so a bad edit never keeps the viewer from starting.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analysis::client::ClientConfig;

const APP_DIR: &str = "photo-lens";
const SETTINGS_FILE: &str = "settings.toml";
const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Errors from reading or writing the settings file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No suitable config directory available")]
    NoConfigDir,
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
}

/// Debounce delays offered in the toolbar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayPreset {
    millis: u64,
}

impl DelayPreset {
    pub const ALL: [DelayPreset; 5] = [
        DelayPreset { millis: 500 },
        DelayPreset { millis: 1000 },
        DelayPreset { millis: 2000 },
        DelayPreset { millis: 3000 },
        DelayPreset { millis: 5000 },
    ];

    pub const DEFAULT: DelayPreset = DelayPreset { millis: 2000 };

    /// Match a delay in seconds against the presets
    pub fn from_secs(secs: f64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|preset| (preset.secs() - secs).abs() < 1e-6)
    }

    pub fn secs(self) -> f64 {
        self.millis as f64 / 1000.0
    }

    pub fn duration(self) -> Duration {
        Duration::from_millis(self.millis)
    }
}

impl fmt::Display for DelayPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}s", self.secs())
    }
}

/// Viewer and analyzer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Debounce before an automatic analysis, in seconds
    pub analysis_delay_secs: f64,
    /// Cache file location; the platform cache dir when unset
    pub cache_path: Option<PathBuf>,
    pub model: String,
    pub max_tokens: u32,
    pub api_base: String,
    pub request_timeout_secs: u64,
    /// Drop cache entries older than this many days at startup
    pub evict_after_days: Option<u32>,
    /// Long edge of the displayed bitmap, in pixels
    pub preview_max_edge: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            analysis_delay_secs: DelayPreset::DEFAULT.secs(),
            cache_path: None,
            model: "gpt-4o-mini".to_string(),
            max_tokens: 800,
            api_base: "https://api.openai.com/v1".to_string(),
            request_timeout_secs: 60,
            evict_after_days: None,
            preview_max_edge: 2048,
        }
    }
}

impl Settings {
    /// Default settings file: `<config_dir>/photo-lens/settings.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load settings from the default location, falling back to defaults on any failure
    pub fn load() -> Settings {
        let loaded = Self::default_path().and_then(|path| Self::load_from(&path));
        match loaded {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("⚠️  Using default settings: {}", e);
                Settings::default()
            }
        }
    }

    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Settings, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No settings file at {}, using defaults", path.display());
                return Ok(Settings::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write settings to `path`, creating the parent directory
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let data = toml::to_string_pretty(self).map_err(|source| ConfigError::SerializeToml {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, data).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Persist to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::default_path()?)
    }

    /// The configured debounce delay; values outside the presets fall back to 2s
    pub fn delay(&self) -> DelayPreset {
        DelayPreset::from_secs(self.analysis_delay_secs).unwrap_or_else(|| {
            tracing::warn!(
                "Unsupported analysis delay {}s, using {}",
                self.analysis_delay_secs,
                DelayPreset::DEFAULT
            );
            DelayPreset::DEFAULT
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            api_base: self.api_base.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

/// API key from the environment, after loading any `.env` file
pub fn api_key() -> Option<String> {
    dotenv::dotenv().ok();
    std::env::var(API_KEY_VAR)
        .ok()
        .filter(|key| !key.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("settings.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.delay(), DelayPreset::DEFAULT);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "analysis_delay_secs = 0.5\nevict_after_days = 30\n").unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.delay().duration(), Duration::from_millis(500));
        assert_eq!(settings.evict_after_days, Some(30));
        assert_eq!(settings.model, "gpt-4o-mini");
        assert_eq!(settings.max_tokens, 800);
    }

    #[test]
    fn test_unsupported_delay_falls_back() {
        let settings = Settings {
            analysis_delay_secs: 7.0,
            ..Settings::default()
        };
        assert_eq!(settings.delay(), DelayPreset::DEFAULT);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "analysis_delay_secs = [").unwrap();
        assert!(matches!(
            Settings::load_from(&path),
            Err(ConfigError::ParseToml { .. })
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");
        let settings = Settings {
            analysis_delay_secs: 3.0,
            cache_path: Some(dir.path().join("cache.json")),
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_preset_labels() {
        let labels: Vec<String> = DelayPreset::ALL.iter().map(|p| p.to_string()).collect();
        assert_eq!(labels, vec!["0.5s", "1.0s", "2.0s", "3.0s", "5.0s"]);
    }

    #[test]
    fn test_client_config() {
        let config = Settings::default().client_config();
        assert_eq!(config.api_base, "https://api.openai.com/v1");
        assert_eq!(config.timeout, Duration::from_secs(60));
    }
}
