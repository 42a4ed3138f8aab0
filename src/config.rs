//! Bridge configuration, loaded from a TOML file
//!
//! ```toml
//! [logging]
//! level = "debug"
//! json = false
//!
//! [callbacks]
//! catch_panics = true
//!
//! [consistency]
//! abort_on_detached = false
//! ```

use jbridge_runtime::logging::{self, LogConfig};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Environment variable naming a configuration file
pub const CONFIG_ENV: &str = "JBRIDGE_CONFIG";

static CONFIG: OnceCell<BridgeConfig> = OnceCell::new();

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub callbacks: CallbackConfig,

    #[serde(default)]
    pub consistency: ConsistencyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default = "default_false")]
    pub json: bool,

    #[serde(default)]
    pub file: Option<String>,

    #[serde(default = "default_false")]
    pub spans: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackConfig {
    /// Turn panics of native callables into `RuntimeException`s
    #[serde(default = "default_true")]
    pub catch_panics: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyConfig {
    /// Abort the process when a native function runs on a thread without
    /// an execution handle
    #[serde(default = "default_false")]
    pub abort_on_detached: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            file: None,
            spans: false,
        }
    }
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self { catch_panics: true }
    }
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            abort_on_detached: false,
        }
    }
}

fn default_true() -> bool { true }
fn default_false() -> bool { false }
fn default_level() -> String { "info".to_string() }

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// File named by `JBRIDGE_CONFIG`, defaults when unset
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    /// Logging settings in the runtime's terms
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: logging::parse_level(&self.logging.level).unwrap_or(logging::Level::INFO),
            log_path: self.logging.file.clone(),
            json_format: self.logging.json,
            show_spans: self.logging.spans,
        }
    }

    /// Make this the process-wide configuration (first call wins)
    ///
    /// Returns `false` if a configuration was already installed.
    pub fn install(self) -> bool {
        let installed = CONFIG.set(self).is_ok();
        if installed {
            info!(target: "bridge", "bridge configuration installed");
        }
        installed
    }
}

/// Process-wide configuration; defaults until one is installed
pub fn current() -> &'static BridgeConfig {
    CONFIG.get_or_init(BridgeConfig::default)
}
