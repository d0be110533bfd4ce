//! Subcommands and the helpers they share.

pub mod batch;
pub mod config;
pub mod output;
pub mod process;

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;
use tracing::debug;

use fieldfuse_core::FuseConfig;

/// Load the engine configuration: the explicit path, else the user config file, else defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<FuseConfig> {
    if let Some(path) = config_path {
        return FuseConfig::from_file(Path::new(path))
            .with_context(|| format!("Failed to load config from {}", path));
    }

    let default_path = config::default_config_path();
    if default_path.exists() {
        debug!("Using config file {}", default_path.display());
        return FuseConfig::from_file(&default_path)
            .with_context(|| format!("Failed to load config from {}", default_path.display()));
    }

    Ok(FuseConfig::default())
}

/// Read and deserialize an evidence JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    if !path.exists() {
        anyhow::bail!("Input file not found: {}", path.display());
    }

    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).with_context(|| format!("Invalid evidence JSON in {}", path.display()))
}
