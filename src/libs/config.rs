//! Configuration management for doover.
//!
//! The configuration is a JSON file stored in the platform-specific data
//! directory (see [`DataStorage`]):
//!
//! - **Windows**: `%LOCALAPPDATA%\doover\config.json`
//! - **macOS**: `~/Library/Application Support/doover/config.json`
//! - **Linux**: `~/.local/share/doover/config.json`
//!
//! Every section is optional; a missing file or a missing section means
//! defaults.
//!
//! ```rust,no_run
//! use doover::libs::config::{Config, SyncConfig, EmptyTagPolicy};
//!
//! let mut config = Config::read()?;
//! config.sync = Some(SyncConfig { empty_remote_tags: EmptyTagPolicy::Wipe });
//! config.save()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use super::data_storage::DataStorage;
use super::secret::Cipher;
use crate::api::HabiticaConfig;
use crate::libs::messages::Message;
use crate::msg_debug;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "config.json";

/// Where the credential codec gets its key material.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct CipherConfig {
    /// Dotenv-style file with `ENCRYPTION_KEY` and `ENCRYPTION_IV`.
    /// When unset, the key material embedded at build time is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,
}

impl CipherConfig {
    pub fn cipher(&self) -> Result<Cipher> {
        match &self.key_file {
            Some(path) => Ok(Cipher::from_key_file(path)?),
            None => Ok(Cipher::embedded()),
        }
    }
}

/// What tag sync does when Habitica reports an empty tag list.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmptyTagPolicy {
    /// Treat the empty list as a failed sync and leave local tags untouched.
    #[default]
    Reject,
    /// Treat the empty list as "no tags" and delete every local tag of the user.
    Wipe,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct SyncConfig {
    #[serde(default)]
    pub empty_remote_tags: EmptyTagPolicy,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct DatabaseConfig {
    /// Explicit SQLite file. Defaults to `doover.db` in the data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub habitica: Option<HabiticaConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cipher: Option<CipherConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,
}

impl Config {
    /// Reads the configuration from the data directory, falling back to defaults.
    pub fn read() -> Result<Config> {
        let config_file_path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;
        Self::read_from(&config_file_path)
    }

    pub fn read_from(path: &Path) -> Result<Config> {
        if !path.exists() {
            msg_debug!(Message::ConfigDefaultsUsed);
            return Ok(Config::default());
        }

        let config_str = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_str)?;
        Ok(config)
    }

    /// Saves the configuration to the data directory as pretty-printed JSON.
    pub fn save(&self) -> Result<()> {
        let config_file_path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;
        self.save_to(&config_file_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let config_file = File::create(path)?;
        serde_json::to_writer_pretty(&config_file, &self)?;
        msg_debug!(Message::ConfigSaved(path.display().to_string()));
        Ok(())
    }

    pub fn habitica(&self) -> HabiticaConfig {
        self.habitica.clone().unwrap_or_default()
    }

    pub fn cipher(&self) -> Result<Cipher> {
        self.cipher.clone().unwrap_or_default().cipher()
    }

    pub fn empty_tag_policy(&self) -> EmptyTagPolicy {
        self.sync.as_ref().map(|sync| sync.empty_remote_tags).unwrap_or_default()
    }

    pub fn database_path(&self) -> Option<&Path> {
        self.database.as_ref().and_then(|db| db.path.as_deref())
    }
}
