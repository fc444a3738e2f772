//! Requeue command

use std::path::Path;

use anyhow::{Context, Result};
use mediagen::db::prompt_repo;

use super::{load, open_database};

pub fn run(config_path: &Path, id: i64) -> Result<()> {
    let config = load(config_path)?;
    let db = open_database(&config)?;

    prompt_repo::requeue(&db, id).with_context(|| format!("Failed to requeue prompt {}", id))?;
    println!("Prompt {} is pending again", id);
    Ok(())
}
