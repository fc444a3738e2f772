use std::path::PathBuf;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::model::ArtifactStatus;

/// Failures surfaced to the caller. A prompt that reached `error` is not
/// one of these; it is reported through `GenerationReport`.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Prompt {0} not found")]
    PromptNotFound(i64),

    #[error("Prompt {prompt_id} is {status}, not pending")]
    NotPending {
        prompt_id: i64,
        status: ArtifactStatus,
    },

    #[error("Prompt {prompt_id} has unsupported prompt type '{prompt_type}'")]
    UnknownPromptType { prompt_id: i64, prompt_type: String },

    #[error("Engine not available: {what} not found at '{path}'")]
    EngineMissing { what: &'static str, path: PathBuf },

    #[error("Output preparation failed: {0}")]
    Storage(#[from] crate::error::StorageError),

    #[error("Invalid engine invocation: {0}")]
    Invocation(#[from] crate::error::ExecutionError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Could not persist state of prompt {prompt_id} after {attempts} attempts: {source}")]
    Persistence {
        prompt_id: i64,
        attempts: u32,
        #[source]
        source: DatabaseError,
    },
}

impl PipelineError {
    /// True for failures detected before the prompt was claimed; the
    /// prompt is still `pending`.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            PipelineError::UnknownPromptType { .. }
                | PipelineError::EngineMissing { .. }
                | PipelineError::Storage(_)
                | PipelineError::Invocation(_)
        )
    }
}
