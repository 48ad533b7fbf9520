//! Application configuration management.
//!
//! Settings are layered with figment, later layers winning:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config PATH`, or `config.toml` in the platform config dir)
//! 3. `STACKCACHE_*` environment variables
//! 4. command-line flags, applied by the caller
//!
//! ```toml
//! store_path = "/work/infra/.stacks/cache"
//! exclude = ["outputs", ".terraform"]
//! follow_symlinks = false
//! io_threads = 4
//! busy_timeout_ms = 5000
//! ```

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CacheCoordinator;
use crate::fingerprint::{FingerprintConfig, Fingerprinter};
use crate::store::KeyValueStore;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "STACKCACHE_";

/// Directory name excluded from fingerprints unless configured otherwise.
pub const DEFAULT_OUTPUT_DIR: &str = "outputs";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Store file location. `None` uses the platform cache directory.
    pub store_path: Option<PathBuf>,

    /// Directory names that never contribute to a fingerprint.
    pub exclude: Vec<String>,

    /// Descend into symlinked directories while fingerprinting.
    pub follow_symlinks: bool,

    /// Threads used to digest files.
    pub io_threads: usize,

    /// Milliseconds a store call waits for another process's lock.
    pub busy_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: None,
            exclude: vec![DEFAULT_OUTPUT_DIR.to_string()],
            follow_symlinks: false,
            io_threads: 4,
            busy_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Load configuration from `explicit_path`, or from the default file,
    /// plus the environment.
    ///
    /// A file named explicitly must be valid; a broken default file only
    /// logs a warning and falls back to defaults.
    ///
    /// # Errors
    ///
    /// Fails if the explicitly named file cannot be read or parsed.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::try_load_from_path(path);
        }

        let result = match Self::config_path() {
            Ok(path) => Self::try_load_from_path(&path),
            Err(e) => {
                log::debug!("No default config location: {:#}", e);
                Self::figment_base()
                    .merge(Self::env())
                    .extract()
                    .context("Invalid configuration in environment")
            }
        };

        match result {
            Ok(config) => Ok(config),
            Err(e) => {
                log::warn!("Failed to load config, using defaults: {:#}", e);
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from `path` plus the environment, falling back to defaults.
    pub fn load_from_path(path: impl AsRef<Path>) -> Self {
        match Self::try_load_from_path(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        }
    }

    /// Load configuration from `path` plus the environment.
    ///
    /// A missing file is not an error; its layer is simply empty.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, is not valid TOML, or holds a
    /// value of the wrong type.
    pub fn try_load_from_path(path: &Path) -> Result<Self> {
        let mut figment = Self::figment_base();
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            // Syntax errors from toml carry line and column; figment's do not.
            toml::from_str::<toml::Table>(&content)
                .with_context(|| format!("Invalid TOML in {}", path.display()))?;
            figment = figment.merge(Toml::string(&content));
        }

        let config: Self = figment
            .merge(Self::env())
            .extract()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        log::debug!("Loaded configuration (file: {})", path.display());
        Ok(config)
    }

    fn figment_base() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
    }

    fn env() -> Env {
        Env::prefixed(ENV_PREFIX)
    }

    /// Default platform-specific configuration file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Resolve the store file location.
    pub fn resolved_store_path(&self) -> Result<PathBuf> {
        match &self.store_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.cache_dir().join("cache.db")),
        }
    }

    /// Fingerprint settings derived from this configuration.
    #[must_use]
    pub fn fingerprint_config(&self) -> FingerprintConfig {
        FingerprintConfig::new(
            self.exclude.iter().cloned(),
            self.follow_symlinks,
            self.io_threads,
        )
    }

    /// Store handle for the configured location.
    pub fn open_store(&self) -> Result<KeyValueStore> {
        let path = self.resolved_store_path()?;
        Ok(KeyValueStore::open(path)
            .with_busy_timeout(Duration::from_millis(self.busy_timeout_ms)))
    }

    /// Coordinator wired from this configuration.
    pub fn coordinator(&self) -> Result<CacheCoordinator> {
        Ok(CacheCoordinator::new(
            self.open_store()?,
            Fingerprinter::new(self.fingerprint_config()),
        ))
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "stacks", "stackcache")
            .ok_or_else(|| anyhow::anyhow!("Failed to determine project directories"))
    }
}
