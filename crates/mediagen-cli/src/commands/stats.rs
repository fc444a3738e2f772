//! Stats command

use std::path::Path;

use anyhow::Result;
use mediagen::db::prompt_repo;
use mediagen::CheckpointMode;

use super::{load, open_database};

pub fn run(config_path: &Path, checkpoint: Option<CheckpointMode>) -> Result<()> {
    let config = load(config_path)?;
    let db = open_database(&config)?;

    if let Some(mode) = checkpoint {
        let result = db.checkpoint(mode)?;
        println!(
            "Checkpoint ({}): {} of {} frames copied{}",
            mode,
            result.checkpointed_frames,
            result.log_frames,
            if result.busy { ", blocked by a reader" } else { "" }
        );
    }

    println!("Prompts by status:");
    for (status, count) in prompt_repo::count_by_status(&db)? {
        println!("  {:<12} {}", status, count);
    }

    let wal = db.wal_stats()?;
    println!("\nDatabase:");
    println!("  journal mode  {}", wal.journal_mode);
    println!("  size          {} bytes", wal.db_size_bytes);
    println!("  wal size      {} bytes ({:.1}%)", wal.wal_size_bytes, wal.wal_ratio * 100.0);
    Ok(())
}
