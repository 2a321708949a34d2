//! Service configuration
//!
//! Each setting resolves CLI -> environment -> TOML -> default through
//! recbatch-common.

use clap::Parser;
use recbatch_common::config as common_config;
use std::path::PathBuf;

/// Command-line flags
#[derive(Parser, Debug, Default)]
#[command(name = "recbatch-ingest", about = "Recordings ingest microservice", version)]
pub struct CliArgs {
    /// Root folder for the database and blob storage
    #[arg(long)]
    pub root_folder: Option<String>,

    /// Shared static API key
    #[arg(long)]
    pub api_key: Option<String>,

    /// HTTP listen port
    #[arg(long)]
    pub port: Option<u16>,

    /// Presign token validity window in seconds
    #[arg(long)]
    pub presign_ttl: Option<u64>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub api_key: String,
    pub port: u16,
    pub presign_ttl_seconds: u64,
}

impl ServiceConfig {
    /// Resolve every setting through the shared priority ladder
    pub fn resolve(args: &CliArgs) -> recbatch_common::Result<Self> {
        let toml = common_config::load_toml_config()?;

        Ok(Self {
            root_folder: common_config::resolve_root_folder(args.root_folder.as_deref(), &toml),
            api_key: common_config::resolve_api_key(args.api_key.as_deref(), &toml),
            port: common_config::resolve_port(args.port, &toml),
            presign_ttl_seconds: common_config::resolve_presign_ttl(args.presign_ttl, &toml),
        })
    }

    /// SQLite database path under the root folder
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join("recbatch.db")
    }

    /// Blob storage directory under the root folder
    pub fn storage_dir(&self) -> PathBuf {
        self.root_folder.join("storage")
    }

    /// Listen address
    pub fn bind_address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }
}
