//! # Recbatch Common Library
//!
//! Shared code for the recbatch crates:
//! - Error type used across the service and database layers
//! - Configuration resolution (CLI / environment / TOML / default)
//! - Prefixed opaque identifier minting

pub mod config;
pub mod error;
pub mod ids;

pub use error::{Error, Result};
