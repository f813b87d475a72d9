//! TOML configuration for the command-line front end and chart defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::solar_time::STANDARD_MERIDIAN;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "ziwei.toml";

const fn default_true() -> bool {
    true
}

fn default_longitude() -> f64 {
    STANDARD_MERIDIAN
}

fn default_locale() -> String {
    "zh-CN".to_string()
}

fn default_filter() -> String {
    "info".to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct ZiweiConfig {
    #[serde(default)]
    pub chart: ChartConfig,
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChartConfig {
    /// Birthplace longitude used when neither a longitude nor a city is given.
    #[serde(default = "default_longitude")]
    pub default_longitude: f64,
    #[serde(default = "default_true")]
    pub fix_leap_month: bool,
    #[serde(default = "default_locale")]
    pub locale: String,
}

impl Default for ChartConfig {
    fn default() -> Self {
        ChartConfig {
            default_longitude: default_longitude(),
            fix_leap_month: true,
            locale: default_locale(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct KnowledgeBaseConfig {
    /// JSON records replacing the built-in knowledge base.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            filter: default_filter(),
        }
    }
}

impl ZiweiConfig {
    /// Reads `path`. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(ZiweiConfig::default());
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ZiweiConfig::load(dir.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        assert_eq!(config, ZiweiConfig::default());
        assert_eq!(config.chart.default_longitude, 120.0);
        assert!(config.chart.fix_leap_month);
        assert_eq!(config.chart.locale, "zh-CN");
        assert_eq!(config.log.filter, "info");
        assert!(config.knowledge_base.path.is_none());
    }

    #[test]
    fn test_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[chart]\ndefault_longitude = 104.06\n\n[knowledge_base]\npath = \"kb.json\"").unwrap();

        let config = ZiweiConfig::load(file.path()).unwrap();
        assert_eq!(config.chart.default_longitude, 104.06);
        assert!(config.chart.fix_leap_month);
        assert_eq!(config.knowledge_base.path, Some(PathBuf::from("kb.json")));
        assert_eq!(config.log, LogConfig::default());
    }

    #[test]
    fn test_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[chart]\nfix_leap_month = \"sometimes\"").unwrap();

        let err = ZiweiConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(err.path(), file.path());
    }
}
