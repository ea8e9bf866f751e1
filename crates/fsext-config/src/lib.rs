//! # fsext-config
//!
//! Configuration management for fs-ext.
//!
//! Loads configuration from:
//! 1. `~/.fsext/config.toml` (global)
//! 2. `.fsext/config.toml` (project-local, overrides global)
//! 3. Environment variables (highest priority)

pub mod logging;
pub mod testing;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard};
use tracing::debug;

/// Default filesystem queried by `statvfs` when no path is given.
pub const DEFAULT_STATVFS_PATH: &str = "/";

/// Matches the Linux `MAXSYMLINKS` limit.
pub const DEFAULT_MAX_LINK_HOPS: u32 = 40;

/// Global config instance
static CONFIG: Lazy<RwLock<Config>> =
    Lazy::new(|| RwLock::new(Config::load().unwrap_or_default()));

/// Get global config (read-only)
pub fn config() -> RwLockReadGuard<'static, Config> {
    // A poisoned lock still holds a fully written Config.
    CONFIG.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Reload config from disk
pub fn reload() -> Result<(), ConfigError> {
    let new_config = Config::load()?;
    let mut guard = CONFIG.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = new_config;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML render error: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub lock: LockConfig,
    pub statvfs: StatvfsConfig,
    pub stat: StatConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // 1. Global config (~/.fsext/config.toml)
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                debug!("Loading global config from {:?}", global_path);
                config = Self::from_file(&global_path)?;
            }
        }

        // 2. Project config (.fsext/config.toml) overrides global
        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from {:?}", project_path);
            let project_config = Self::from_file(&project_path)?;
            config.merge(project_config);
        }

        // 3. Environment overrides
        config.apply_env_overrides();

        Ok(config)
    }

    /// Parse a single config file without applying any overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Global config path: ~/.fsext/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".fsext/config.toml"))
    }

    /// Project config path, relative to the working directory.
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".fsext/config.toml")
    }

    /// Merge a project config over this one. Only values that differ from
    /// the defaults replace what is already loaded.
    pub fn merge(&mut self, other: Config) {
        let defaults = Config::default();
        if other.logging.level != defaults.logging.level {
            self.logging.level = other.logging.level;
        }
        if other.lock.default_mode != defaults.lock.default_mode {
            self.lock.default_mode = other.lock.default_mode;
        }
        if other.statvfs.default_path != defaults.statvfs.default_path {
            self.statvfs.default_path = other.statvfs.default_path;
        }
        if other.stat.max_link_hops != defaults.stat.max_link_hops {
            self.stat.max_link_hops = other.stat.max_link_hops;
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup("FSEXT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(mode) = lookup("FSEXT_LOCK_MODE") {
            self.lock.default_mode = mode;
        }
        if let Some(path) = lookup("FSEXT_STATVFS_PATH") {
            self.statvfs.default_path = PathBuf::from(path);
        }
        if let Some(hops) = lookup("FSEXT_MAX_LINK_HOPS") {
            if let Ok(n) = hops.parse() {
                self.stat.max_link_hops = n;
            }
        }
    }

    /// Render this config as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Generate default config TOML string
    pub fn default_toml() -> String {
        // Config contains only strings, paths and integers.
        Config::default().to_toml().unwrap_or_default()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when neither FSEXT_LOG nor RUST_LOG is set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Lock command configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Mode symbol used when `--mode` is omitted: sh, ex, shnb, exnb
    pub default_mode: String,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            default_mode: "ex".to_string(),
        }
    }
}

/// Filesystem statistics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatvfsConfig {
    /// Path queried when none is given
    pub default_path: PathBuf,
}

impl Default for StatvfsConfig {
    fn default() -> Self {
        Self {
            default_path: PathBuf::from(DEFAULT_STATVFS_PATH),
        }
    }
}

/// Ownership-extended stat configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatConfig {
    /// Symbolic links followed before giving up with ELOOP
    pub max_link_hops: u32,
}

impl Default for StatConfig {
    fn default() -> Self {
        Self {
            max_link_hops: DEFAULT_MAX_LINK_HOPS,
        }
    }
}
