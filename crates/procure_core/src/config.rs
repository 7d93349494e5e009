//! Process configuration loaded from TOML.
//!
//! # Responsibility
//! - Describe where the database and logs live and how verbose logging is.
//! - Fill missing fields with defaults so an empty file is valid.
//!
//! # Invariants
//! - Business settings (VAT rate, PO numbering, security policy) live in the
//!   `settings` table, not here.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_DB_FILE_NAME: &str = "procure.sqlite3";
const DEFAULT_CACHE_TTL_SECS: u64 = 60;

/// Configuration load failure.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}

/// Runtime configuration for the `procure` process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Directory for rolling log files. Logging is off when absent.
    pub log_dir: Option<PathBuf>,
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Lifetime of cached dashboard lookups.
    pub cache_ttl_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE_NAME),
            log_dir: None,
            log_level: crate::logging::default_log_level().to_string(),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

impl AppConfig {
    /// Parses configuration text.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Loads configuration from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `path` when given, otherwise returns defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError};
    use std::io::Write;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn empty_text_yields_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn fields_override_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
db_path = "/var/lib/procure/po.sqlite3"
log_dir = "/var/log/procure"
log_level = "warn"
cache_ttl_secs = 5
"#,
        )
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/var/lib/procure/po.sqlite3"));
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/procure")));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.cache_ttl_secs, 5);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(AppConfig::from_toml_str("db_pth = \"x\"").is_err());
    }

    #[test]
    fn load_reports_path_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let err = AppConfig::load(&missing).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("missing.toml"));

        let broken = dir.path().join("broken.toml");
        let mut file = std::fs::File::create(&broken).unwrap();
        file.write_all(b"cache_ttl_secs = \"soon\"").unwrap();
        let err = AppConfig::load(&broken).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
