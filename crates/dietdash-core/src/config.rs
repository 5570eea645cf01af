//! Application configuration management.
//!
//! Configuration is stored at `~/.config/dietdash/config.json` and holds
//! the backend URL, the session store backend and the near-expiry window.
//! `DIETDASH_API_URL` overrides the configured backend URL.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::api::client::DEFAULT_BASE_URL;
use crate::auth::token::NEAR_EXPIRY_MINUTES;
use crate::auth::{FileStore, KeyringStore, MemoryStore, SessionStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "dietdash";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding `api_base_url`
pub const API_URL_ENV: &str = "DIETDASH_API_URL";

/// Where the session token lives between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    File,
    Keyring,
    /// Nothing survives the process
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub store: StoreBackend,
    pub near_expiry_minutes: Option<i64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Backend URL: environment first, then config, then the default
    pub fn base_url(&self) -> String {
        self.resolve_base_url(std::env::var(API_URL_ENV).ok())
    }

    fn resolve_base_url(&self, env_value: Option<String>) -> String {
        env_value
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn near_expiry_minutes(&self) -> i64 {
        self.near_expiry_minutes
            .filter(|m| *m > 0)
            .unwrap_or(NEAR_EXPIRY_MINUTES)
    }

    /// Open the configured session store
    pub fn open_store(&self) -> Result<Arc<dyn SessionStore>> {
        Ok(match self.store {
            StoreBackend::File => Arc::new(FileStore::new(self.cache_dir()?)),
            StoreBackend::Keyring => Arc::new(KeyringStore::new()),
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
        })
    }
}
