use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info_span, warn, Instrument};

use crate::config::{validate_config, Config};
use crate::db::artifact_repo::{self, NewArtifact};
use crate::db::prompt_repo::{self, PromptRow};
use crate::db::{Database, DatabaseError};
use crate::error::StorageError;
use crate::executor::{ArgumentBuilder, Invocation, WorkflowExecutor};
use crate::model::{ArtifactStatus, MediaKind};
use crate::sanitize;
use crate::storage::{discover_outputs, OutputLayout};

use super::config::PipelineConfig;
use super::context::GenerationJob;
use super::error::PipelineError;
use super::progress::{GenerationPhase, ProgressEvent, ProgressReporter};

/// Terminal outcome of one generation attempt.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub prompt_id: i64,
    pub kind: MediaKind,
    pub status: ArtifactStatus,
    /// Error text stored on the prompt when `status` is `error`.
    pub message: Option<String>,
    pub artifact_id: Option<i64>,
    /// Path relative to the output root.
    pub file_path: Option<String>,
    pub output_files: usize,
}

impl GenerationReport {
    fn ready(job: &GenerationJob, artifact_id: i64, file_path: String) -> Self {
        Self {
            prompt_id: job.prompt_id(),
            kind: job.kind,
            status: ArtifactStatus::Ready,
            message: None,
            artifact_id: Some(artifact_id),
            file_path: Some(file_path),
            output_files: job.files.len(),
        }
    }

    fn failed(job: &GenerationJob, message: String) -> Self {
        Self {
            prompt_id: job.prompt_id(),
            kind: job.kind,
            status: ArtifactStatus::Error,
            message: Some(message),
            artifact_id: None,
            file_path: None,
            output_files: job.files.len(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == ArtifactStatus::Ready
    }
}

/// Runs prompts through preflight, claim, engine, discovery, and
/// persistence. One generation at a time per call.
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    db: Database,
    layout: OutputLayout,
    executor: WorkflowExecutor,
}

impl Pipeline {
    /// Validates `config`, opens its database, and builds a pipeline over it.
    pub fn open(config: &Config) -> crate::Result<Self> {
        validate_config(config)?;
        let db = Database::open_with(&config.database.path, config.database.options())?;
        let pipeline = Self::from_config(Arc::new(PipelineConfig::from_config(config)), db)?;
        Ok(pipeline)
    }

    /// Production constructor: builds the layout and executor from config.
    pub fn from_config(config: Arc<PipelineConfig>, db: Database) -> Result<Self, PipelineError> {
        let layout = OutputLayout::new(&config.output_directory)?;
        let executor = WorkflowExecutor::from_config(&config.engine);
        Ok(Self::new(config, db, layout, executor))
    }

    /// Constructor with injected components.
    pub fn new(
        config: Arc<PipelineConfig>,
        db: Database,
        layout: OutputLayout,
        executor: WorkflowExecutor,
    ) -> Self {
        Self {
            config,
            db,
            layout,
            executor,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Pending prompts matched by a kind token, oldest first.
    pub fn list_pending(&self, kind_token: &str, limit: u32) -> Result<Vec<PromptRow>, PipelineError> {
        Ok(prompt_repo::list_pending(
            &self.db,
            &self.config.aliases,
            kind_token,
            limit,
        )?)
    }

    /// Generates the artifact for one pending prompt.
    ///
    /// `Ok` carries the terminal status (`ready` or `error`). `Err` means
    /// either the prompt was never claimed (preflight, not pending) and is
    /// unchanged, or its state could not be persisted.
    pub async fn run(
        &self,
        prompt_id: i64,
        progress: &dyn ProgressReporter,
    ) -> Result<GenerationReport, PipelineError> {
        let prompt = prompt_repo::find_by_id(&self.db, prompt_id)?
            .ok_or(PipelineError::PromptNotFound(prompt_id))?;

        if prompt.artifact_status != ArtifactStatus::Pending {
            return Err(PipelineError::NotPending {
                prompt_id,
                status: prompt.artifact_status,
            });
        }
        let kind = prompt
            .kind(&self.config.aliases)
            .ok_or_else(|| PipelineError::UnknownPromptType {
                prompt_id,
                prompt_type: prompt.prompt_type.clone(),
            })?;

        let mut job = GenerationJob::new(prompt, kind);
        let span = info_span!("pipeline", prompt_id, kind = %kind);

        self.run_job(&mut job, progress).instrument(span).await
    }

    async fn run_job(
        &self,
        job: &mut GenerationJob,
        progress: &dyn ProgressReporter,
    ) -> Result<GenerationReport, PipelineError> {
        let prompt_id = job.prompt_id();

        // Step 1: Preflight. Nothing is written to the database yet.
        let invocation = {
            let _step = info_span!("prepare_output").entered();
            progress.report(ProgressEvent::Phase {
                prompt_id,
                phase: GenerationPhase::Preparing,
                message: "Preparing output directory...".to_string(),
            });
            self.step_preflight(job)?
        };

        // Step 2: Claim (pending -> processing)
        progress.report(ProgressEvent::Phase {
            prompt_id,
            phase: GenerationPhase::Claiming,
            message: "Marking prompt as processing...".to_string(),
        });
        self.write_status(prompt_id, ArtifactStatus::Processing, None)
            .instrument(info_span!("claim"))
            .await?;

        // Step 3: Run the engine
        progress.report(ProgressEvent::Phase {
            prompt_id,
            phase: GenerationPhase::Generating,
            message: format!("Running {} workflow...", job.kind),
        });
        let outcome = self
            .executor
            .execute(&invocation)
            .instrument(info_span!("execute"))
            .await;
        match outcome {
            Ok(outcome) => job.outcome = Some(outcome),
            Err(e) => return self.fail(job, e.to_string(), progress).await,
        }

        // Step 4: Discover outputs
        let collected = {
            let _step = info_span!("collect_outputs").entered();
            progress.report(ProgressEvent::Phase {
                prompt_id,
                phase: GenerationPhase::Collecting,
                message: "Collecting generated files...".to_string(),
            });
            self.step_collect(job)
        };
        if let Err(e) = collected {
            return self.fail(job, e.to_string(), progress).await;
        }
        let first_file = match job.files.first() {
            Some(file) => file.clone(),
            None => {
                let dir = job
                    .output
                    .as_ref()
                    .map(|o| o.relative.to_string())
                    .unwrap_or_default();
                let message = format!(
                    "No {} files generated in {}. Check engine output and workflow script.",
                    job.kind, dir
                );
                return self.fail(job, message, progress).await;
            }
        };

        // Step 5: Save the artifact, then mark ready
        progress.report(ProgressEvent::Phase {
            prompt_id,
            phase: GenerationPhase::Saving,
            message: "Recording artifact...".to_string(),
        });
        let artifact = match self.build_artifact(job, &first_file) {
            Ok(artifact) => artifact,
            Err(e) => return self.fail(job, e.to_string(), progress).await,
        };
        let saved = self
            .with_retries(prompt_id, || artifact_repo::save_artifact(&self.db, &artifact))
            .instrument(info_span!("save_artifact"))
            .await;
        let artifact_id = match saved {
            Ok(id) => id,
            Err(e) => {
                return self
                    .fail(job, format!("Failed to record artifact: {}", e), progress)
                    .await
            }
        };

        if let Err(e) = self
            .write_status(prompt_id, ArtifactStatus::Ready, None)
            .instrument(info_span!("mark_ready"))
            .await
        {
            return self
                .fail(job, format!("Failed to mark prompt ready: {}", e), progress)
                .await;
        }

        let file_path = artifact.file_path.to_string();
        progress.report(ProgressEvent::Completed {
            prompt_id,
            artifact_id,
            file_path: file_path.clone(),
        });

        Ok(GenerationReport::ready(job, artifact_id, file_path))
    }

    /// Processes pending prompts of every kind, strictly one at a time,
    /// up to the configured batch limit per kind.
    pub async fn process_backlog(
        &self,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<GenerationReport>, PipelineError> {
        let mut reports = Vec::new();
        for kind in MediaKind::ALL {
            reports.extend(
                self.process_kind(kind.as_str(), self.config.batch_limit, progress)
                    .await?,
            );
        }
        Ok(reports)
    }

    /// Processes up to `limit` pending prompts matched by `kind_token`.
    ///
    /// Prompts claimed by someone else in the meantime, or with an
    /// unsupported type, are skipped. Any other error stops the batch.
    pub async fn process_kind(
        &self,
        kind_token: &str,
        limit: u32,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<GenerationReport>, PipelineError> {
        let pending = self.list_pending(kind_token, limit)?;
        debug!(kind = kind_token, count = pending.len(), "Pending prompts");

        let mut reports = Vec::with_capacity(pending.len());
        for prompt in pending {
            match self.run(prompt.id, progress).await {
                Ok(report) => reports.push(report),
                Err(e @ PipelineError::NotPending { .. })
                | Err(e @ PipelineError::UnknownPromptType { .. }) => {
                    warn!(prompt_id = prompt.id, error = %e, "Skipping prompt");
                }
                Err(PipelineError::Database(DatabaseError::Transition { prompt_id, source })) => {
                    warn!(prompt_id, error = %source, "Prompt claimed elsewhere, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(reports)
    }

    fn step_preflight(&self, job: &mut GenerationJob) -> Result<Invocation, PipelineError> {
        let workflow = self.config.workflows.get(job.kind);
        let builder = ArgumentBuilder::for_prompt(
            job.kind,
            &self.config.engine,
            workflow,
            &job.prompt.prompt_text,
            job.payload.as_ref(),
        );
        builder.validate()?;
        self.check_engine(&builder)?;

        let output = self
            .layout
            .prepare(job.kind, job.prompt_id(), job.started_at)?;
        debug!(dir = %output.relative, "Output directory ready");

        let invocation = builder.build(&output.absolute)?;
        job.output = Some(output);
        Ok(invocation)
    }

    fn check_engine(&self, builder: &ArgumentBuilder) -> Result<(), PipelineError> {
        let engine_dir = &self.config.engine.directory;
        if !engine_dir.is_dir() {
            return Err(PipelineError::EngineMissing {
                what: "engine directory",
                path: engine_dir.clone(),
            });
        }
        // Bare program names are resolved through PATH at spawn time.
        let program = builder.program();
        if program.components().count() > 1 && !program.exists() {
            return Err(PipelineError::EngineMissing {
                what: "engine executable",
                path: program.to_path_buf(),
            });
        }
        if let Some(script) = builder.script() {
            if !script.exists() {
                return Err(PipelineError::EngineMissing {
                    what: "workflow script",
                    path: script.to_path_buf(),
                });
            }
        }
        Ok(())
    }

    fn step_collect(&self, job: &mut GenerationJob) -> Result<(), StorageError> {
        let dir = match &job.outcome {
            Some(outcome) => outcome.output_dir.clone(),
            None => return Ok(()),
        };
        job.files = discover_outputs(&dir, job.kind)?;
        debug!(count = job.files.len(), "Discovered output files");
        Ok(())
    }

    fn build_artifact(&self, job: &GenerationJob, file: &Path) -> Result<NewArtifact, StorageError> {
        let file_path = self.layout.relative_path(file)?;
        let preview_path = match job.kind {
            MediaKind::Image => Some(file_path.clone()),
            MediaKind::Audio => None,
        };

        Ok(NewArtifact {
            prompt_id: job.prompt_id(),
            kind: job.kind,
            file_path,
            preview_path,
            metadata: artifact_metadata(job, file),
        })
    }

    /// Marks the prompt as errored. Long messages keep their first line and
    /// their end.
    async fn fail(
        &self,
        job: &GenerationJob,
        message: String,
        progress: &dyn ProgressReporter,
    ) -> Result<GenerationReport, PipelineError> {
        let message = sanitize::clip_message(&message, self.config.error_message_limit);
        warn!(prompt_id = job.prompt_id(), error = %message, "Generation failed");

        self.write_status(job.prompt_id(), ArtifactStatus::Error, Some(&message))
            .instrument(info_span!("mark_error"))
            .await?;

        progress.report(ProgressEvent::Failed {
            prompt_id: job.prompt_id(),
            error: message.clone(),
        });
        Ok(GenerationReport::failed(job, message))
    }

    async fn write_status(
        &self,
        prompt_id: i64,
        status: ArtifactStatus,
        message: Option<&str>,
    ) -> Result<(), PipelineError> {
        self.with_retries(prompt_id, || {
            prompt_repo::update_status(&self.db, prompt_id, status, message)
        })
        .await
    }

    /// Retries transient database failures with a linear backoff. Logical
    /// failures (illegal transition, missing prompt) are returned at once.
    async fn with_retries<T, F>(&self, prompt_id: i64, mut op: F) -> Result<T, PipelineError>
    where
        F: FnMut() -> Result<T, DatabaseError>,
    {
        let attempts = self.config.status_write_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e @ DatabaseError::Transition { .. })
                | Err(e @ DatabaseError::PromptNotFound(_)) => {
                    return Err(PipelineError::Database(e))
                }
                Err(e) if attempt >= attempts => {
                    return Err(PipelineError::Persistence {
                        prompt_id,
                        attempts,
                        source: e,
                    })
                }
                Err(e) => {
                    warn!(prompt_id, attempt, error = %e, "Database write failed, retrying");
                    tokio::time::sleep(self.config.retry_backoff * attempt).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn artifact_metadata(job: &GenerationJob, file: &Path) -> Value {
    let mut metadata = match &job.payload {
        Some(payload) => payload.metadata(),
        None => json!({ "prompt": job.prompt.prompt_text }),
    };

    let file_size = std::fs::metadata(file).map(|m| m.len()).unwrap_or(0);
    let file_format = file
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let mime_type = mime_guess::from_path(file)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    let elapsed_secs = job
        .outcome
        .as_ref()
        .map(|o| o.elapsed.as_secs_f64())
        .unwrap_or_default();

    if let Value::Object(map) = &mut metadata {
        map.insert("generated_at".into(), json!(Utc::now().to_rfc3339()));
        map.insert("file_size".into(), json!(file_size));
        map.insert("file_name".into(), json!(sanitize::redact_path(file)));
        map.insert("file_format".into(), json!(file_format));
        map.insert("mime_type".into(), json!(mime_type));
        map.insert("elapsed_secs".into(), json!(elapsed_secs));
        map.insert("output_files".into(), json!(job.files.len()));
        if let Some(output) = &job.output {
            map.insert("output_directory".into(), json!(output.relative.as_str()));
        }
    }
    metadata
}
