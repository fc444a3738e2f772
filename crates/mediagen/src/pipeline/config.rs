use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, EngineConfig, WorkflowsConfig};
use crate::model::KindAliases;

/// Everything the pipeline reads from configuration, resolved once.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub engine: EngineConfig,
    pub workflows: WorkflowsConfig,
    pub output_directory: PathBuf,
    pub aliases: KindAliases,
    pub batch_limit: u32,
    pub status_write_attempts: u32,
    pub error_message_limit: usize,
    /// Base delay between status write attempts; grows linearly.
    pub retry_backoff: Duration,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            engine: config.engine.clone(),
            workflows: config.workflows.clone(),
            output_directory: config.engine.output_directory.clone(),
            aliases: config.kind_aliases(),
            batch_limit: config.pipeline.batch_limit,
            status_write_attempts: config.pipeline.status_write_attempts.max(1),
            error_message_limit: config.pipeline.error_message_limit,
            retry_backoff: Duration::from_millis(200),
        }
    }
}
