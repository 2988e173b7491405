//! Configuration service implementation.
//!
//! Loads [`ClientConfig`] from `config.toml` (platform config directory or an
//! explicit path) and applies environment overrides.

use crate::paths::StoryboardPaths;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use storyboard_core::config::ClientConfig;
use storyboard_core::{Result, StoryboardError};

/// Overrides `server_url` from the environment.
pub const SERVER_URL_ENV: &str = "STORYBOARD_SERVER_URL";

/// Loads and caches the client configuration.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: Option<PathBuf>,
    config: Arc<RwLock<Option<ClientConfig>>>,
}

impl ConfigService {
    /// Uses the default config file location.
    pub fn new() -> Self {
        Self {
            path: None,
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Uses an explicit config file.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Gets the configuration, loading from file if not cached.
    ///
    /// A missing or empty file yields the defaults. A malformed file is an
    /// error rather than being silently replaced.
    pub fn get_config(&self) -> Result<ClientConfig> {
        {
            let cached = self.config.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(config) = cached.as_ref() {
                return Ok(config.clone());
            }
        }

        let mut loaded = match self.resolve_path() {
            Some(path) => Self::load_file(&path)?,
            None => {
                tracing::warn!("[ConfigService] no config directory; using defaults");
                ClientConfig::default()
            }
        };
        apply_env_overrides(&mut loaded, std::env::var(SERVER_URL_ENV).ok());

        let mut cache = self.config.write().unwrap_or_else(PoisonError::into_inner);
        *cache = Some(loaded.clone());
        Ok(loaded)
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut cache = self.config.write().unwrap_or_else(PoisonError::into_inner);
        *cache = None;
    }

    fn resolve_path(&self) -> Option<PathBuf> {
        match &self.path {
            Some(path) => Some(path.clone()),
            None => StoryboardPaths::config_file().ok(),
        }
    }

    fn load_file(path: &Path) -> Result<ClientConfig> {
        if !path.exists() {
            tracing::debug!("[ConfigService] {} not found; using defaults", path.display());
            return Ok(ClientConfig::default());
        }
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(ClientConfig::default());
        }
        toml::from_str(&content).map_err(|err| {
            StoryboardError::config(format!("{}: {}", path.display(), err))
        })
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_env_overrides(config: &mut ClientConfig, server_url: Option<String>) {
    if let Some(url) = server_url.filter(|url| !url.trim().is_empty()) {
        config.server_url = url.trim().to_string();
    }
}
