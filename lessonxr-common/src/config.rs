//! Bootstrap configuration loading and path resolution
//!
//! Configuration comes from a TOML bootstrap file. Priority for every value:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is never fatal: a warning is logged and defaults apply.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the TOML config file
pub const CONFIG_ENV_VAR: &str = "LESSONXR_CONFIG";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Directory holding `<chapter>/<topic>.json` lesson records
    #[serde(default)]
    pub content_root: Option<PathBuf>,

    /// Base URL of a remote content store (used when no content root is set)
    #[serde(default)]
    pub content_url: Option<String>,

    /// File backing the short-lived "activeLesson" slot
    #[serde(default)]
    pub session_cache_path: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Player tuning table, deserialized by the player crate
    #[serde(default)]
    pub player: toml::Table,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TomlConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the config file if it exists, otherwise fall back to defaults
    ///
    /// Parse errors are reported; a missing file is not.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                Self::load(path)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
            }
            Some(path) => {
                warn!(
                    "Config file {} not found, using built-in defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => {
                info!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Resolves which config file a module should read
pub struct ConfigResolver {
    module_name: String,
}

impl ConfigResolver {
    /// Create a resolver for `module_name` (file name stem, e.g. "player")
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
        }
    }

    /// Resolve the config file path
    ///
    /// CLI argument → `LESSONXR_CONFIG` → `<config_dir>/lessonxr/<module>.toml`
    /// (only if that file exists).
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = cli_arg {
            return Some(path.to_path_buf());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        self.default_path().filter(|p| p.exists())
    }

    /// Platform default config path for this module
    pub fn default_path(&self) -> Option<PathBuf> {
        dirs::config_dir().map(|d| {
            d.join("lessonxr")
                .join(format!("{}.toml", self.module_name))
        })
    }
}

/// Resolve an optional path setting following CLI → ENV → TOML priority
pub fn resolve_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_value: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    toml_value.map(Path::to_path_buf)
}

/// Default location of the session cache file
pub fn default_session_cache_path() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join("lessonxr"))
        .unwrap_or_else(|| std::env::temp_dir().join("lessonxr"))
        .join("active_lesson.json")
}
