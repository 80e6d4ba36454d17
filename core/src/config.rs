// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use davsync_dav::DavConfig;

use crate::error::SyncError;
use crate::types::CollectionType;

/// The name of the application.
pub const APP_NAME: &str = "davsync";

/// File name of the local store inside the state directory.
const DATABASE_FILE: &str = "davsync.db";

/// Configuration for davsync.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// Directory for storing application state.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    /// Accounts to synchronize.
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,

    /// Reconciliation settings shared by all accounts.
    #[serde(default)]
    pub sync: SyncSettings,

    /// File the configuration was loaded from.
    #[serde(skip)]
    source: Option<PathBuf>,
}

/// One remote account.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct AccountConfig {
    /// Unique account name, used as the account key in the local store.
    pub name: String,

    /// Server connection.
    pub server: DavConfig,

    /// Collection types synchronized for this account.
    #[serde(default = "default_types")]
    pub types: Vec<CollectionType>,

    /// URLs of remote collections not selected for synchronization.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// URLs of remote collections whose local changes are never pushed.
    #[serde(default)]
    pub read_only: Vec<String>,
}

/// Reconciliation settings.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SyncSettings {
    /// Overwrite the local collection color with the remote one.
    #[serde(default = "default_true")]
    pub update_color: bool,

    /// Number of collections whose items are reconciled at the same time.
    #[serde(default = "default_max_concurrent_collections")]
    pub max_concurrent_collections: usize,

    /// Number of items downloaded per multiget request.
    #[serde(default = "default_download_batch_size")]
    pub download_batch_size: usize,

    /// Keep local edits of items whose remote copy vanished.
    #[serde(default = "default_true")]
    pub keep_orphaned_edits: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            update_color: true,
            max_concurrent_collections: default_max_concurrent_collections(),
            download_batch_size: default_download_batch_size(),
            keep_orphaned_edits: true,
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_max_concurrent_collections() -> usize {
    1
}

const fn default_download_batch_size() -> usize {
    10
}

fn default_types() -> Vec<CollectionType> {
    CollectionType::ALL.to_vec()
}

impl Config {
    /// Loads and normalizes the configuration from a TOML file.
    pub async fn load(path: &Path) -> Result<Self, SyncError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            SyncError::Config(format!(
                "Failed to read config file at {}: {e}",
                path.display()
            ))
        })?;

        let mut config = Self::from_toml(&content)?;
        config.source = Some(path.to_path_buf());
        config.normalize()?;
        Ok(config)
    }

    /// Parses the configuration without normalizing it.
    pub fn from_toml(content: &str) -> Result<Self, SyncError> {
        toml::from_str(content).map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Re-reads the file this configuration was loaded from.
    pub async fn reload(&mut self) -> Result<(), SyncError> {
        let path = self
            .source
            .clone()
            .ok_or_else(|| SyncError::Config("Configuration was not loaded from a file".into()))?;

        tracing::info!(path = %path.display(), "reloading configuration");
        *self = Self::load(&path).await?;
        Ok(())
    }

    /// Normalize the configuration.
    pub fn normalize(&mut self) -> Result<(), SyncError> {
        match &self.state_dir {
            Some(a) => self.state_dir = Some(expand_path(a)?),
            None => match get_state_dir() {
                Ok(a) => self.state_dir = Some(a.join(APP_NAME)),
                Err(e) => tracing::warn!(err = %e, "failed to get state directory"),
            },
        }

        if self.sync.max_concurrent_collections == 0 {
            self.sync.max_concurrent_collections = 1;
        }
        if self.sync.download_batch_size == 0 {
            self.sync.download_batch_size = default_download_batch_size();
        }

        let mut names = HashSet::new();
        for account in &mut self.accounts {
            if account.name.trim().is_empty() {
                return Err(SyncError::Config("Account name must not be empty".into()));
            }
            if !names.insert(account.name.clone()) {
                return Err(SyncError::Config(format!(
                    "Duplicate account name: {}",
                    account.name
                )));
            }

            let mut seen = HashSet::new();
            account.types.retain(|t| seen.insert(*t));
        }

        Ok(())
    }

    /// Looks up an account by name.
    pub fn account(&self, name: &str) -> Option<&AccountConfig> {
        self.accounts.iter().find(|a| a.name == name)
    }

    /// Path of the local store, `None` for an in-memory store.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.state_dir.as_ref().map(|dir| dir.join(DATABASE_FILE))
    }
}

/// Handle tilde (~) and environment variables in the path
fn expand_path(path: &Path) -> Result<PathBuf, SyncError> {
    if path.is_absolute() {
        return Ok(path.to_owned());
    }

    let path = path
        .to_str()
        .ok_or_else(|| SyncError::Config(format!("Invalid path: {}", path.display())))?;

    let home_prefixes: &[&str] = if cfg!(unix) {
        &["~/", "$HOME/", "${HOME}/"]
    } else {
        &[r"~\", "~/", r"%UserProfile%\", r"%UserProfile%/"]
    };
    for prefix in home_prefixes {
        if let Some(stripped) = path.strip_prefix(prefix) {
            return Ok(get_home_dir()?.join(stripped));
        }
    }

    let config_prefixes: &[&str] = if cfg!(unix) {
        &["$XDG_CONFIG_HOME/", "${XDG_CONFIG_HOME}/"]
    } else {
        &[r"%LOCALAPPDATA%\", "%LOCALAPPDATA%/"]
    };
    for prefix in config_prefixes {
        if let Some(stripped) = path.strip_prefix(prefix) {
            return Ok(get_config_dir()?.join(stripped));
        }
    }

    Ok(path.into())
}

fn get_home_dir() -> Result<PathBuf, SyncError> {
    dirs::home_dir().ok_or_else(|| SyncError::Config("User-specific home directory not found".into()))
}

/// User-specific configuration directory.
pub fn get_config_dir() -> Result<PathBuf, SyncError> {
    #[cfg(unix)]
    let config_dir = xdg::BaseDirectories::new().get_config_home();
    #[cfg(windows)]
    let config_dir = dirs::config_dir();
    config_dir.ok_or_else(|| SyncError::Config("User-specific config directory not found".into()))
}

fn get_state_dir() -> Result<PathBuf, SyncError> {
    #[cfg(unix)]
    let state_dir = xdg::BaseDirectories::new().get_state_home();
    #[cfg(windows)]
    let state_dir = dirs::data_dir();
    state_dir.ok_or_else(|| SyncError::Config("User-specific state directory not found".into()))
}
