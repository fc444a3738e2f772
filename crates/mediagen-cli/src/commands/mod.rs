pub mod check;
pub mod generate;
pub mod list;
pub mod requeue;
pub mod run;
pub mod stats;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mediagen::config::default_config_path;
use mediagen::{load_config, validate_config, Config, Database, Pipeline};

/// Explicit `--config` or the per-user default.
pub fn config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => default_config_path()
            .context("Could not determine home directory; pass --config explicitly"),
    }
}

/// Loads and validates the config file.
pub fn load(config_path: &Path) -> Result<Config> {
    let config = load_config(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    validate_config(&config).context("Invalid configuration")?;
    Ok(config)
}

pub fn open_database(config: &Config) -> Result<Database> {
    Database::open_with(&config.database.path, config.database.options()).with_context(|| {
        format!(
            "Failed to open database at {}",
            config.database.path.display()
        )
    })
}

pub fn build_pipeline(config: &Config) -> Result<Pipeline> {
    Pipeline::open(config).context("Failed to set up pipeline")
}
