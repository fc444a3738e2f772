//! List command

use std::path::Path;

use anyhow::Result;
use mediagen::db::prompt_repo;
use mediagen::sanitize::truncate_message;

use super::{load, open_database};

const PREVIEW_CHARS: usize = 60;

pub fn run(config_path: &Path, kind: &str, limit: u32) -> Result<()> {
    let config = load(config_path)?;
    let db = open_database(&config)?;

    let pending = prompt_repo::list_pending(&db, &config.kind_aliases(), kind, limit)?;
    if pending.is_empty() {
        println!("No pending {} prompts", kind);
        return Ok(());
    }

    for prompt in &pending {
        let text = prompt.prompt_text.replace('\n', " ");
        let preview = truncate_message(&text, PREVIEW_CHARS);
        let ellipsis = if preview.len() < text.len() { "..." } else { "" };
        println!(
            "{:>6}  {:<14} {:<20} {}{}",
            prompt.id,
            prompt.prompt_type,
            prompt.created_at.as_deref().unwrap_or("-"),
            preview,
            ellipsis
        );
    }
    println!("\n{} pending", pending.len());
    Ok(())
}
