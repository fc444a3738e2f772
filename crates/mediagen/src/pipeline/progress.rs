use std::fmt;

/// Steps of a single generation, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPhase {
    Preparing,
    Claiming,
    Generating,
    Collecting,
    Saving,
}

impl fmt::Display for GenerationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenerationPhase::Preparing => "preparing",
            GenerationPhase::Claiming => "claiming",
            GenerationPhase::Generating => "generating",
            GenerationPhase::Collecting => "collecting",
            GenerationPhase::Saving => "saving",
        };
        f.write_str(name)
    }
}

/// Events emitted by the pipeline during a generation.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Phase {
        prompt_id: i64,
        phase: GenerationPhase,
        message: String,
    },
    Completed {
        prompt_id: i64,
        artifact_id: i64,
        file_path: String,
    },
    Failed {
        prompt_id: i64,
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for tests and batch callers that only want the reports.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Writes every event to the log.
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Phase {
                prompt_id,
                phase,
                message,
            } => tracing::info!(prompt_id, %phase, "{}", message),
            ProgressEvent::Completed {
                prompt_id,
                artifact_id,
                file_path,
            } => tracing::info!(prompt_id, artifact_id, %file_path, "Generation completed"),
            ProgressEvent::Failed { prompt_id, error } => {
                tracing::warn!(prompt_id, %error, "Generation failed")
            }
        }
    }
}
