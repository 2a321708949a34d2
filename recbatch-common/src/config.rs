//! Configuration loading and resolution
//!
//! Every setting resolves through the same priority ladder:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file (`~/.config/recbatch/config.toml`)
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings understood in the TOML config file. All fields optional;
/// anything absent falls through to the compiled default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database and blob storage
    pub root_folder: Option<String>,
    /// Shared static API key
    pub api_key: Option<String>,
    /// HTTP listen port
    pub port: Option<u16>,
    /// Presign token validity window in seconds
    pub presign_ttl_seconds: Option<u64>,
}

/// Locate the platform config file, if one exists
pub fn config_file_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("recbatch").join("config.toml"));
    if let Some(path) = &user_config {
        if path.exists() {
            return user_config;
        }
    }
    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/recbatch/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }
    None
}

/// Load the TOML config file; missing file yields defaults
pub fn load_toml_config() -> Result<TomlConfig> {
    match config_file_path() {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
            toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
        }
        None => Ok(TomlConfig::default()),
    }
}

/// Resolve the root folder following the priority ladder
pub fn resolve_root_folder(cli_arg: Option<&str>, toml: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }
    if let Ok(path) = std::env::var("RECBATCH_ROOT_FOLDER") {
        return PathBuf::from(path);
    }
    if let Some(path) = &toml.root_folder {
        return PathBuf::from(path);
    }
    default_root_folder()
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("recbatch"))
        .unwrap_or_else(|| PathBuf::from("./recbatch_data"))
}

/// Resolve the shared API key. The compiled default is the fixed mock
/// key; deployments are expected to override it.
pub fn resolve_api_key(cli_arg: Option<&str>, toml: &TomlConfig) -> String {
    if let Some(key) = cli_arg {
        return key.to_string();
    }
    if let Ok(key) = std::env::var("RECBATCH_API_KEY") {
        if !key.trim().is_empty() {
            return key;
        }
    }
    if let Some(key) = &toml.api_key {
        if !key.trim().is_empty() {
            return key.clone();
        }
    }
    "test_12345".to_string()
}

/// Resolve the HTTP listen port
pub fn resolve_port(cli_arg: Option<u16>, toml: &TomlConfig) -> u16 {
    if let Some(port) = cli_arg {
        return port;
    }
    if let Ok(port) = std::env::var("RECBATCH_PORT") {
        if let Ok(port) = port.parse() {
            return port;
        }
        tracing::warn!("RECBATCH_PORT is not a valid port number, ignoring");
    }
    toml.port.unwrap_or(5741)
}

/// Resolve the presign token validity window in seconds
pub fn resolve_presign_ttl(cli_arg: Option<u64>, toml: &TomlConfig) -> u64 {
    if let Some(ttl) = cli_arg {
        return ttl;
    }
    if let Ok(ttl) = std::env::var("RECBATCH_PRESIGN_TTL") {
        if let Ok(ttl) = ttl.parse() {
            return ttl;
        }
        tracing::warn!("RECBATCH_PRESIGN_TTL is not a valid number of seconds, ignoring");
    }
    toml.presign_ttl_seconds.unwrap_or(600)
}
