//! Config command: inspect and edit the engine tolerances.
//!
//! Commands act on the file given with `--config`, else on the user config file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Subcommand};
use console::style;

use fieldfuse_core::models::CONFIG_KEYS;
use fieldfuse_core::FuseConfig;

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// List every key with its value, marking changed ones
    Show {
        /// Print the configuration as JSON instead
        #[arg(long)]
        json: bool,
    },

    /// Write a configuration file with the default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print one value (e.g. "geometry.row_tolerance")
    Get { key: String },

    /// Change one value; the file is only written if the result is valid
    Set { key: String, value: String },

    /// Print the configuration file path
    Path,
}

pub async fn run(args: ConfigArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let path = config_path.map(PathBuf::from).unwrap_or_else(default_config_path);

    match args.command {
        ConfigCommand::Show { json } => show(&path, json),
        ConfigCommand::Init { force } => init(&path, force),
        ConfigCommand::Get { key } => get(&path, &key),
        ConfigCommand::Set { key, value } => set(&path, &key, &value),
        ConfigCommand::Path => {
            let status = if path.exists() {
                style("exists").green()
            } else {
                style("not created").yellow()
            };
            println!("{} ({})", path.display(), status);
            Ok(())
        }
    }
}

/// Location of the user configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fieldfuse")
        .join("config.json")
}

fn load(path: &Path) -> anyhow::Result<FuseConfig> {
    if !path.exists() {
        return Ok(FuseConfig::default());
    }
    FuseConfig::from_file(path).with_context(|| format!("Failed to load config from {}", path.display()))
}

fn save(config: &FuseConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    config
        .save(path)
        .with_context(|| format!("Failed to write config to {}", path.display()))
}

fn show(path: &Path, json: bool) -> anyhow::Result<()> {
    let config = load(path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let defaults = FuseConfig::default();
    let mut section = "";
    for &key in CONFIG_KEYS {
        let (group, field) = key.split_once('.').unwrap_or(("", key));
        if group != section {
            println!("{}", style(format!("[{}]", group)).bold());
            section = group;
        }

        let value = config.get(key).unwrap_or_default();
        if defaults.get(key).as_deref() == Some(value.as_str()) {
            println!("  {} = {}", field, value);
        } else {
            println!("  {} = {} {}", field, style(&value).cyan(), style("(changed)").dim());
        }
    }

    Ok(())
}

fn init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists; pass --force to reset it", path.display());
    }

    save(&FuseConfig::default(), path)?;
    println!("{} Wrote default configuration to {}", style("✓").green(), path.display());
    Ok(())
}

fn get(path: &Path, key: &str) -> anyhow::Result<()> {
    let config = load(path)?;
    let value = config
        .get(key)
        .ok_or_else(|| anyhow::anyhow!("Unknown configuration key: {} (see `fieldfuse config show`)", key))?;
    println!("{}", value);
    Ok(())
}

fn set(path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let mut config = load(path)?;
    let previous = config.get(key);

    config.set(key, value)?;
    save(&config, path)?;

    println!(
        "{} {}: {} -> {}",
        style("✓").green(),
        key,
        previous.unwrap_or_default(),
        config.get(key).unwrap_or_default()
    );
    Ok(())
}
