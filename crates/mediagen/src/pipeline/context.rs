use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::db::prompt_repo::PromptRow;
use crate::executor::ExecutionOutcome;
use crate::model::{MediaKind, PromptPayload};
use crate::storage::JobOutputDir;

/// State of one generation attempt. Lives for a single `Pipeline::run`.
pub struct GenerationJob {
    // Input
    pub prompt: PromptRow,
    pub kind: MediaKind,
    pub payload: Option<PromptPayload>,
    pub started_at: DateTime<Utc>,

    // Preflight result
    pub output: Option<JobOutputDir>,

    // Engine result
    pub outcome: Option<ExecutionOutcome>,

    // Discovered files, name order
    pub files: Vec<PathBuf>,
}

impl GenerationJob {
    pub fn new(prompt: PromptRow, kind: MediaKind) -> Self {
        let payload = prompt
            .payload
            .as_deref()
            .and_then(|content| PromptPayload::parse(kind, content));
        Self {
            prompt,
            kind,
            payload,
            started_at: Utc::now(),
            output: None,
            outcome: None,
            files: Vec::new(),
        }
    }

    pub fn prompt_id(&self) -> i64 {
        self.prompt.id
    }
}
