pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod model;
pub mod pipeline;
pub mod sanitize;
pub mod storage;

pub use config::{load_config, validate_config, Config};
pub use db::{CheckpointMode, Database, DatabaseError};
pub use error::{ConfigError, ExecutionError, MediagenError, Result, StorageError};
pub use executor::{ArgumentBuilder, WorkflowExecutor};
pub use model::{ArtifactStatus, KindAliases, MediaKind};
pub use pipeline::{GenerationReport, Pipeline, PipelineConfig, PipelineError, ProgressReporter};
pub use storage::{ArtifactPath, OutputLayout};
