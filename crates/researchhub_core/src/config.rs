//! Stack configuration.
//!
//! # Responsibility
//! - Describe every backend handle the services receive: ordered primary
//!   document replicas, the cache, the graph index.
//! - Parse and validate the TOML configuration file.
//!
//! # Invariants
//! - At least one primary backend; the first one is the source of truth.
//! - Backend names are unique and log-safe tokens.
//! - TTLs are strictly positive.

use crate::db::OpenOptions;
use crate::logging::LoggingConfig;
use crate::service::CacheSettings;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

static BACKEND_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]{0,31}$").expect("valid backend name regex"));

const DEFAULT_TTL_SECS: u64 = 60;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

/// Full stack configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackConfig {
    /// Primary document backends in probe order.
    pub primary: Vec<BackendConfig>,
    pub cache: CacheConfig,
    pub graph: GraphConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    pub name: String,
    /// Database file, or `:memory:`.
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default = "default_cache_name")]
    pub name: String,
    pub path: PathBuf,
    #[serde(default = "default_ttl_secs")]
    pub researcher_ttl_secs: u64,
    #[serde(default = "default_ttl_secs")]
    pub analytics_ttl_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphConfig {
    #[serde(default = "default_graph_name")]
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl StackConfig {
    /// Reads, parses and validates a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.primary.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one [[primary]] backend is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let names = self
            .primary
            .iter()
            .map(|backend| backend.name.as_str())
            .chain([self.cache.name.as_str(), self.graph.name.as_str()]);
        for name in names {
            if !BACKEND_NAME_RE.is_match(name) {
                return Err(ConfigError::Invalid(format!(
                    "backend name `{name}` must match {}",
                    BACKEND_NAME_RE.as_str()
                )));
            }
            if !seen.insert(name) {
                return Err(ConfigError::Invalid(format!(
                    "backend name `{name}` is used more than once"
                )));
            }
        }

        if self.cache.researcher_ttl_secs == 0 || self.cache.analytics_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "cache TTLs must be greater than zero".to_string(),
            ));
        }
        if self.storage.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "storage.busy_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn open_options(&self) -> OpenOptions {
        OpenOptions {
            busy_timeout: Duration::from_millis(self.storage.busy_timeout_ms),
        }
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            researcher_ttl: Duration::from_secs(self.cache.researcher_ttl_secs),
            analytics_ttl: Duration::from_secs(self.cache.analytics_ttl_secs),
        }
    }
}

fn default_ttl_secs() -> u64 {
    DEFAULT_TTL_SECS
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

fn default_cache_name() -> String {
    "cache".to_string()
}

fn default_graph_name() -> String {
    "graph".to_string()
}
