//! Artifact repository for the `prompt_artifacts` table.

use chrono::Utc;
use rusqlite::{params, Row};
use serde_json::Value;

use super::{Database, DatabaseError};
use crate::model::MediaKind;
use crate::storage::ArtifactPath;

/// An artifact ready to be recorded. Paths are already relative to the
/// output root; an absolute path cannot be expressed here.
#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub prompt_id: i64,
    pub kind: MediaKind,
    pub file_path: ArtifactPath,
    pub preview_path: Option<ArtifactPath>,
    pub metadata: Value,
}

/// A stored artifact row.
#[derive(Debug, Clone)]
pub struct ArtifactRow {
    pub id: i64,
    pub prompt_id: i64,
    pub artifact_type: String,
    pub file_path: String,
    pub preview_path: Option<String>,
    pub metadata: Value,
    pub created_at: String,
    pub updated_at: String,
}

impl ArtifactRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let raw: Option<String> = row.get("metadata")?;
        let metadata = match raw.as_deref() {
            Some(text) if !text.trim().is_empty() => serde_json::from_str(text).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?,
            _ => Value::Object(Default::default()),
        };

        Ok(Self {
            id: row.get("id")?,
            prompt_id: row.get("prompt_id")?,
            artifact_type: row.get("artifact_type")?,
            file_path: row.get("file_path")?,
            preview_path: row.get("preview_path")?,
            metadata,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts an artifact and publishes it. Returns the new row id.
pub fn save_artifact(db: &Database, artifact: &NewArtifact) -> Result<i64, DatabaseError> {
    let metadata = serde_json::to_string(&artifact.metadata)?;
    let now = Utc::now().to_rfc3339();

    db.commit_and_publish(|tx| {
        tx.execute(
            "INSERT INTO prompt_artifacts (prompt_id, artifact_type, file_path, preview_path,
             metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                artifact.prompt_id,
                artifact.kind.as_str(),
                artifact.file_path.as_str(),
                artifact.preview_path.as_ref().map(|p| p.as_str()),
                metadata,
                now,
            ],
        )?;
        let id = tx.last_insert_rowid();
        log::debug!(
            "Saved artifact {} for prompt {}: {}",
            id,
            artifact.prompt_id,
            artifact.file_path
        );
        Ok(id)
    })
}

/// Artifacts recorded for a prompt, newest first.
pub fn artifacts_for_prompt(
    db: &Database,
    prompt_id: i64,
) -> Result<Vec<ArtifactRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM prompt_artifacts WHERE prompt_id = ?1
             ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt
            .query_map(params![prompt_id], ArtifactRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
