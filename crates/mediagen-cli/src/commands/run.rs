//! Run command

use std::path::Path;

use anyhow::Result;
use mediagen::pipeline::LogProgress;
use mediagen::{GenerationReport, MediaKind};

use super::{build_pipeline, load};

pub async fn run(
    config_path: &Path,
    kind: Option<&str>,
    limit: Option<u32>,
    json: bool,
) -> Result<()> {
    let config = load(config_path)?;
    let pipeline = build_pipeline(&config)?;

    let reports = match (kind, limit) {
        (Some(token), limit) => {
            let limit = limit.unwrap_or(config.pipeline.batch_limit);
            pipeline.process_kind(token, limit, &LogProgress).await?
        }
        (None, Some(limit)) => {
            let mut reports = Vec::new();
            for kind in MediaKind::ALL {
                reports.extend(
                    pipeline
                        .process_kind(kind.as_str(), limit, &LogProgress)
                        .await?,
                );
            }
            reports
        }
        (None, None) => pipeline.process_backlog(&LogProgress).await?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_summary(&reports);
    }
    Ok(())
}

fn print_summary(reports: &[GenerationReport]) {
    if reports.is_empty() {
        println!("No pending prompts");
        return;
    }

    for report in reports {
        match (&report.file_path, &report.message) {
            (Some(path), _) if report.is_ready() => {
                println!("#{} {} ready  {}", report.prompt_id, report.kind, path)
            }
            (_, Some(message)) => {
                println!("#{} {} {}  {}", report.prompt_id, report.kind, report.status, message)
            }
            _ => println!("#{} {} {}", report.prompt_id, report.kind, report.status),
        }
    }

    let ready = reports.iter().filter(|r| r.is_ready()).count();
    println!("\n{} processed, {} ready, {} failed", reports.len(), ready, reports.len() - ready);
}
