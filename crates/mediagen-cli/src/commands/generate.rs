//! Generate command

use std::path::Path;

use anyhow::{bail, Result};
use mediagen::pipeline::LogProgress;

use super::{build_pipeline, load};

pub async fn run(config_path: &Path, id: i64, json: bool) -> Result<()> {
    let config = load(config_path)?;
    let pipeline = build_pipeline(&config)?;

    let report = pipeline.run(id, &LogProgress).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if !report.is_ready() {
        bail!(
            "Prompt {} failed: {}",
            id,
            report.message.as_deref().unwrap_or("unknown error")
        );
    }

    if !json {
        println!(
            "Prompt {} ready: {} (artifact {})",
            id,
            report.file_path.as_deref().unwrap_or("-"),
            report.artifact_id.unwrap_or_default()
        );
    }
    Ok(())
}
