use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::db::{CheckpointMode, DatabaseOptions};
use crate::model::{KindAliases, MediaKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
    #[serde(default)]
    pub workflows: WorkflowsConfig,
    /// Extra filter tokens, merged over the built-in `image`/`audio` entries.
    #[serde(default)]
    pub kind_aliases: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

impl Config {
    pub fn kind_aliases(&self) -> KindAliases {
        let mut aliases = KindAliases::default();
        aliases.extend_from(&self.kind_aliases);
        aliases
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub checkpoint_mode: CheckpointMode,
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

fn default_busy_timeout_secs() -> u64 {
    30
}

impl DatabaseConfig {
    pub fn options(&self) -> DatabaseOptions {
        DatabaseOptions {
            checkpoint_mode: self.checkpoint_mode,
            busy_timeout: Duration::from_secs(self.busy_timeout_secs),
        }
    }
}

/// The external generation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Program to launch (an interpreter when workflows name a script).
    pub executable: PathBuf,
    /// Engine installation directory; also the working directory.
    pub directory: PathBuf,
    /// Single output root. Persisted artifact paths are relative to it.
    pub output_directory: PathBuf,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Flag name (without dashes) that passes `directory` to the engine.
    #[serde(default = "default_location_flag")]
    pub location_flag: String,
}

fn default_timeout_seconds() -> u64 {
    900
}

fn default_location_flag() -> String {
    "comfyui-directory".to_string()
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowsConfig {
    #[serde(default = "WorkflowConfig::default_image")]
    pub image: WorkflowConfig,
    #[serde(default = "WorkflowConfig::default_audio")]
    pub audio: WorkflowConfig,
}

impl Default for WorkflowsConfig {
    fn default() -> Self {
        Self {
            image: WorkflowConfig::default_image(),
            audio: WorkflowConfig::default_audio(),
        }
    }
}

impl WorkflowsConfig {
    pub fn get(&self, kind: MediaKind) -> &WorkflowConfig {
        match kind {
            MediaKind::Image => &self.image,
            MediaKind::Audio => &self.audio,
        }
    }
}

/// How one media kind is handed to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Script passed as the first argument, relative to the engine directory
    /// unless absolute. Omitted when the executable is the workflow itself.
    #[serde(default)]
    pub script: Option<PathBuf>,
    /// Argument name (without dashes) carrying the prompt text.
    #[serde(default)]
    pub prompt_arg: String,
    /// Argument name for style tags; audio workflows only.
    #[serde(default)]
    pub tags_arg: Option<String>,
}

impl WorkflowConfig {
    fn default_image() -> Self {
        Self {
            script: None,
            prompt_arg: "prompt".to_string(),
            tags_arg: None,
        }
    }

    fn default_audio() -> Self {
        Self {
            script: None,
            prompt_arg: "lyrics".to_string(),
            tags_arg: Some("tags".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default = "default_batch_limit")]
    pub batch_limit: u32,
    #[serde(default = "default_status_write_attempts")]
    pub status_write_attempts: u32,
    #[serde(default = "default_error_message_limit")]
    pub error_message_limit: usize,
}

fn default_batch_limit() -> u32 {
    10
}

fn default_status_write_attempts() -> u32 {
    3
}

fn default_error_message_limit() -> usize {
    500
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_limit: default_batch_limit(),
            status_write_attempts: default_status_write_attempts(),
            error_message_limit: default_error_message_limit(),
        }
    }
}
