use std::path::PathBuf;
use thiserror::Error;

use crate::model::MediaKind;

#[derive(Error, Debug)]
pub enum MediagenError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid argument name '{name}' for {kind} workflow: {reason}")]
    InvalidArgument {
        kind: MediaKind,
        name: String,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid output root '{path}': {reason}")]
    InvalidRoot { path: PathBuf, reason: String },

    #[error("Output directory '{path}' is not writable: {source}")]
    NotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read directory '{path}': {reason}")]
    ReadDirectory { path: PathBuf, reason: String },

    #[error("Path '{path}' is outside the output root '{root}'")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("Invalid artifact path '{path}': {reason}")]
    InvalidRelativePath { path: String, reason: String },

    #[error("No free output directory name for '{0}'")]
    DirectoryExhausted(PathBuf),
}

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("No prompt argument name configured for the {kind} workflow")]
    UnconfiguredArgument { kind: MediaKind },

    #[error("Missing value for required argument '--{name}' of the {kind} workflow")]
    MissingArgument { kind: MediaKind, name: String },

    #[error("Failed to launch engine '{program}': {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for engine process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("{kind} workflow timed out after {seconds} seconds")]
    Timeout { kind: MediaKind, seconds: u64 },

    #[error("Workflow failed with exit code {}{}", display_code(.code), display_stderr(.stderr_tail))]
    NonZeroExit {
        code: Option<i32>,
        stderr_tail: String,
    },
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}

fn display_stderr(tail: &str) -> String {
    if tail.trim().is_empty() {
        String::new()
    } else {
        format!("\nStderr: {}", tail)
    }
}

pub type Result<T> = std::result::Result<T, MediagenError>;
