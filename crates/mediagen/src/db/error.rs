//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::InvalidTransition;

/// Errors from database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error when creating directories or files.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration failed to apply.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// The database lock was poisoned.
    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Prompt {0} not found")]
    PromptNotFound(i64),

    /// The requested status change is not in the transition table, or the
    /// prompt changed status underneath us.
    #[error("Prompt {prompt_id}: {source}")]
    Transition {
        prompt_id: i64,
        #[source]
        source: InvalidTransition,
    },

    /// Artifact metadata could not be encoded or decoded.
    #[error("Invalid artifact metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}
