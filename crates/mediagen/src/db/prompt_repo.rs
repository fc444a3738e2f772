//! Prompt repository: the pending queue and generation status of `prompts`.

use chrono::Utc;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, OptionalExtension, Row, Transaction};

use super::{Database, DatabaseError};
use crate::model::{ArtifactStatus, InvalidTransition, KindAliases, MediaKind};

impl ToSql for ArtifactStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ArtifactStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        text.parse()
            .map_err(|e: crate::model::UnknownStatus| FromSqlError::Other(Box::new(e)))
    }
}

const SELECT_PROMPT: &str = "SELECT p.id, p.prompt_text, p.prompt_type, p.artifact_status,
        p.output_reference, p.error_message, p.created_at, p.completed_at,
        w.content AS payload
     FROM prompts p
     LEFT JOIN writings w ON w.id = p.output_reference";

/// A prompt row joined with its upstream payload, if any.
#[derive(Debug, Clone)]
pub struct PromptRow {
    pub id: i64,
    pub prompt_text: String,
    pub prompt_type: String,
    pub artifact_status: ArtifactStatus,
    pub output_reference: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: Option<String>,
    pub completed_at: Option<String>,
    /// Raw `writings.content` referenced by `output_reference`.
    pub payload: Option<String>,
}

impl PromptRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            prompt_text: row.get("prompt_text")?,
            prompt_type: row.get("prompt_type")?,
            artifact_status: row
                .get::<_, Option<ArtifactStatus>>("artifact_status")?
                .unwrap_or(ArtifactStatus::Pending),
            output_reference: row.get("output_reference")?,
            error_message: row.get("error_message")?,
            created_at: row.get("created_at")?,
            completed_at: row.get("completed_at")?,
            payload: row.get("payload")?,
        })
    }

    /// Media kind this prompt produces, if its `prompt_type` is a known
    /// token or a configured alias of one.
    pub fn kind(&self, aliases: &KindAliases) -> Option<MediaKind> {
        aliases.kind_of(&self.prompt_type)
    }
}

/// Pending prompts whose `prompt_type` is matched by `kind_token`, oldest first.
pub fn list_pending(
    db: &Database,
    aliases: &KindAliases,
    kind_token: &str,
    limit: u32,
) -> Result<Vec<PromptRow>, DatabaseError> {
    let stored = aliases.stored_values(kind_token);
    let placeholders = (2..stored.len() + 2)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "{} WHERE COALESCE(p.artifact_status, 'pending') = ?1 AND p.prompt_type IN ({}) ORDER BY p.id ASC LIMIT {}",
        SELECT_PROMPT, placeholders, limit
    );

    db.with_conn(|conn| {
        let mut values: Vec<&dyn ToSql> = vec![&ArtifactStatus::Pending];
        values.extend(stored.iter().map(|s| s as &dyn ToSql));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(values.as_slice(), PromptRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Finds a prompt by its ID.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<PromptRow>, DatabaseError> {
    db.with_conn(|conn| {
        let sql = format!("{} WHERE p.id = ?1", SELECT_PROMPT);
        let row = conn
            .query_row(&sql, params![id], PromptRow::from_row)
            .optional()?;
        Ok(row)
    })
}

/// Moves a prompt to `next` if the transition table allows it.
///
/// Read, validation, and write happen inside one IMMEDIATE transaction and
/// the UPDATE is conditioned on the status that was read, so two pickers
/// can never both move the same prompt out of `pending`.
///
/// `error_message` is stored when moving to `error`; it is cleared when a
/// prompt is claimed. `completed_at` is stamped on terminal states.
pub fn update_status(
    db: &Database,
    prompt_id: i64,
    next: ArtifactStatus,
    error_message: Option<&str>,
) -> Result<(), DatabaseError> {
    db.commit_and_publish(|tx| {
        let current = current_status(tx, prompt_id)?;
        current
            .transition_to(next)
            .map_err(|source| DatabaseError::Transition { prompt_id, source })?;

        let completed_at = next.is_terminal().then(|| Utc::now().to_rfc3339());
        let message = match next {
            ArtifactStatus::Error => error_message,
            _ => None,
        };

        let changed = tx.execute(
            "UPDATE prompts SET artifact_status = ?1, error_message = ?2, completed_at = ?3
             WHERE id = ?4 AND COALESCE(artifact_status, 'pending') = ?5",
            params![next, message, completed_at, prompt_id, current],
        )?;
        if changed == 0 {
            return Err(DatabaseError::Transition {
                prompt_id,
                source: InvalidTransition {
                    from: current,
                    to: next,
                },
            });
        }

        log::debug!("Prompt {} status {} -> {}", prompt_id, current, next);
        Ok(())
    })
}

/// Returns an errored prompt to the queue, clearing its error and
/// completion time. Any other current status is rejected.
pub fn requeue(db: &Database, prompt_id: i64) -> Result<(), DatabaseError> {
    db.commit_and_publish(|tx| {
        let current = current_status(tx, prompt_id)?;
        if current != ArtifactStatus::Error {
            return Err(DatabaseError::Transition {
                prompt_id,
                source: InvalidTransition {
                    from: current,
                    to: ArtifactStatus::Pending,
                },
            });
        }

        tx.execute(
            "UPDATE prompts SET artifact_status = ?1, error_message = NULL, completed_at = NULL
             WHERE id = ?2 AND COALESCE(artifact_status, 'pending') = ?3",
            params![ArtifactStatus::Pending, prompt_id, current],
        )?;
        log::info!("Prompt {} re-queued", prompt_id);
        Ok(())
    })
}

/// Counts prompts per status, ordered by status name.
pub fn count_by_status(db: &Database) -> Result<Vec<(String, u64)>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT COALESCE(artifact_status, 'pending') AS status, COUNT(*)
             FROM prompts GROUP BY status ORDER BY status",
        )?;
        let rows = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

fn current_status(tx: &Transaction<'_>, prompt_id: i64) -> Result<ArtifactStatus, DatabaseError> {
    let status: Option<Option<ArtifactStatus>> = tx
        .query_row(
            "SELECT artifact_status FROM prompts WHERE id = ?1",
            params![prompt_id],
            |r| r.get(0),
        )
        .optional()?;
    match status {
        Some(s) => Ok(s.unwrap_or(ArtifactStatus::Pending)),
        None => Err(DatabaseError::PromptNotFound(prompt_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn insert_prompt(db: &Database, text: &str, prompt_type: &str) -> i64 {
        db.commit_and_publish(|tx| {
            tx.execute(
                "INSERT INTO prompts (prompt_text, prompt_type) VALUES (?1, ?2)",
                params![text, prompt_type],
            )?;
            Ok(tx.last_insert_rowid())
        })
        .unwrap()
    }

    fn ids(rows: &[PromptRow]) -> Vec<i64> {
        rows.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_image_filter_matches_both_stored_tokens() {
        let db = test_db();
        let legacy = insert_prompt(&db, "old fox", "image");
        let current = insert_prompt(&db, "new fox", "image_prompt");
        insert_prompt(&db, "a song", "lyrics_prompt");

        let rows = list_pending(&db, &KindAliases::default(), "image", 10).unwrap();
        assert_eq!(ids(&rows), vec![legacy, current]);
    }

    #[test]
    fn test_unrelated_token_is_exact() {
        let db = test_db();
        insert_prompt(&db, "fox", "image");
        let exact = insert_prompt(&db, "fox 2", "image_prompt");

        let rows = list_pending(&db, &KindAliases::default(), "image_prompt", 10).unwrap();
        assert_eq!(ids(&rows), vec![exact]);

        let rows = list_pending(&db, &KindAliases::default(), "video", 10).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_list_pending_skips_claimed_and_respects_limit() {
        let db = test_db();
        let a = insert_prompt(&db, "a", "audio");
        let b = insert_prompt(&db, "b", "lyrics_prompt");
        let c = insert_prompt(&db, "c", "audio");
        update_status(&db, a, ArtifactStatus::Processing, None).unwrap();

        let rows = list_pending(&db, &KindAliases::default(), "audio", 1).unwrap();
        assert_eq!(ids(&rows), vec![b]);
        let rows = list_pending(&db, &KindAliases::default(), "audio", 10).unwrap();
        assert_eq!(ids(&rows), vec![b, c]);
    }

    #[test]
    fn test_configured_alias_is_honoured() {
        let db = test_db();
        let id = insert_prompt(&db, "p", "picture_prompt");
        let aliases = KindAliases::default().with_alias("picture", ["picture_prompt"]);

        let rows = list_pending(&db, &aliases, "picture", 10).unwrap();
        assert_eq!(ids(&rows), vec![id]);
    }

    #[test]
    fn test_payload_is_joined_through_output_reference() {
        let db = test_db();
        let id = db
            .commit_and_publish(|tx| {
                tx.execute(
                    "INSERT INTO writings (content_type, content) VALUES ('image_prompt', ?1)",
                    params![r#"{"prompt": "fox at dawn"}"#],
                )?;
                let writing = tx.last_insert_rowid();
                tx.execute(
                    "INSERT INTO prompts (prompt_text, prompt_type, output_reference)
                     VALUES ('fox', 'image_prompt', ?1)",
                    params![writing],
                )?;
                Ok(tx.last_insert_rowid())
            })
            .unwrap();

        let row = find_by_id(&db, id).unwrap().unwrap();
        assert_eq!(row.payload.as_deref(), Some(r#"{"prompt": "fox at dawn"}"#));
        assert_eq!(row.kind(&KindAliases::default()), Some(MediaKind::Image));
        assert!(row.created_at.is_some());
    }

    #[test]
    fn test_find_by_id_missing() {
        let db = test_db();
        assert!(find_by_id(&db, 404).unwrap().is_none());
    }

    #[test]
    fn test_status_walks_the_state_machine() {
        let db = test_db();
        let id = insert_prompt(&db, "fox", "image");

        update_status(&db, id, ArtifactStatus::Processing, None).unwrap();
        let row = find_by_id(&db, id).unwrap().unwrap();
        assert_eq!(row.artifact_status, ArtifactStatus::Processing);
        assert!(row.completed_at.is_none());

        update_status(&db, id, ArtifactStatus::Ready, None).unwrap();
        let row = find_by_id(&db, id).unwrap().unwrap();
        assert_eq!(row.artifact_status, ArtifactStatus::Ready);
        assert!(row.completed_at.is_some());
    }

    #[test]
    fn test_illegal_transition_is_rejected_and_not_written() {
        let db = test_db();
        let id = insert_prompt(&db, "fox", "image");

        let err = update_status(&db, id, ArtifactStatus::Ready, None).unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::Transition {
                source: InvalidTransition {
                    from: ArtifactStatus::Pending,
                    to: ArtifactStatus::Ready
                },
                ..
            }
        ));
        let row = find_by_id(&db, id).unwrap().unwrap();
        assert_eq!(row.artifact_status, ArtifactStatus::Pending);
    }

    #[test]
    fn test_second_claim_fails() {
        let db = test_db();
        let id = insert_prompt(&db, "fox", "image");

        update_status(&db, id, ArtifactStatus::Processing, None).unwrap();
        assert!(update_status(&db, id, ArtifactStatus::Processing, None).is_err());
    }

    #[test]
    fn test_error_message_stored_and_requeue_clears_it() {
        let db = test_db();
        let id = insert_prompt(&db, "song", "audio");
        update_status(&db, id, ArtifactStatus::Processing, None).unwrap();
        update_status(&db, id, ArtifactStatus::Error, Some("exit code 1")).unwrap();

        let row = find_by_id(&db, id).unwrap().unwrap();
        assert_eq!(row.error_message.as_deref(), Some("exit code 1"));

        requeue(&db, id).unwrap();
        let row = find_by_id(&db, id).unwrap().unwrap();
        assert_eq!(row.artifact_status, ArtifactStatus::Pending);
        assert!(row.error_message.is_none());
        assert!(row.completed_at.is_none());
    }

    #[test]
    fn test_requeue_only_from_error() {
        let db = test_db();
        let id = insert_prompt(&db, "song", "audio");
        assert!(matches!(
            requeue(&db, id),
            Err(DatabaseError::Transition { .. })
        ));
        assert!(matches!(
            requeue(&db, 77),
            Err(DatabaseError::PromptNotFound(77))
        ));
    }

    #[test]
    fn test_update_missing_prompt() {
        let db = test_db();
        assert!(matches!(
            update_status(&db, 5, ArtifactStatus::Processing, None),
            Err(DatabaseError::PromptNotFound(5))
        ));
    }

    #[test]
    fn test_count_by_status() {
        let db = test_db();
        let a = insert_prompt(&db, "a", "image");
        insert_prompt(&db, "b", "image");
        update_status(&db, a, ArtifactStatus::Processing, None).unwrap();

        let counts = count_by_status(&db).unwrap();
        assert_eq!(
            counts,
            vec![("pending".to_string(), 1), ("processing".to_string(), 1)]
        );
    }
}
