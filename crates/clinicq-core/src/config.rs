//! Application configuration management.
//!
//! This module handles loading and saving the client configuration, which
//! holds the API base URL, the credential backend and the last used username.
//!
//! Configuration is stored at `~/.config/clinicq/config.json`. The base URL
//! and backend can be overridden with `CLINICQ_API_BASE_URL` and
//! `CLINICQ_CREDENTIAL_BACKEND`.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::{CredentialStore, FileStore, KeyringStore, MemoryStore};

/// Application name used for config/data directory paths
const APP_NAME: &str = "clinicq";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Credential file name in the data directory
const CREDENTIALS_FILE: &str = "credentials.json";

const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/";

const BASE_URL_ENV: &str = "CLINICQ_API_BASE_URL";
const BACKEND_ENV: &str = "CLINICQ_CREDENTIAL_BACKEND";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    /// Per-request timeout. `None` leaves requests unbounded.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: None,
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: None,
        }
    }
}

/// Where session credentials are persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl FromStr for CredentialBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "keyring" => Ok(Self::Keyring),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow!("Unknown credential backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub credential_backend: CredentialBackend,
    pub last_username: Option<String>,
}

impl Config {
    /// Load the config file (defaults when absent) and apply env overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_env_overrides()?;
        debug!(base_url = %config.api.base_url, backend = ?config.credential_backend, "Config loaded");
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            if !base_url.trim().is_empty() {
                self.api.base_url = base_url;
            }
        }
        if let Ok(backend) = std::env::var(BACKEND_ENV) {
            self.credential_backend = backend.parse()?;
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Build the credential store selected by `credential_backend`
    pub fn credential_store(&self) -> Result<Arc<dyn CredentialStore>> {
        let store: Arc<dyn CredentialStore> = match self.credential_backend {
            CredentialBackend::File => {
                Arc::new(FileStore::new(self.data_dir()?.join(CREDENTIALS_FILE)))
            }
            CredentialBackend::Keyring => Arc::new(KeyringStore::new()),
            CredentialBackend::Memory => Arc::new(MemoryStore::new()),
        };
        Ok(store)
    }
}
