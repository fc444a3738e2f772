//! Test harness for isolated pipeline runs.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use tempfile::TempDir;

use mediagen::config::{load_config, Config};
use mediagen::pipeline::Pipeline;
use mediagen::Database;

/// Script prologue: records the argument list to `last_args.txt` in the
/// working directory and sets `$out` from `--output`.
const ENGINE_PROLOGUE: &str = r#"printf '%s\n' "$@" > last_args.txt
while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
"#;

pub struct TestHarness {
    temp_dir: TempDir,
    pub engine_dir: PathBuf,
    pub output_dir: PathBuf,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
}

impl TestHarness {
    /// Harness whose engine runs `engine_body` with the default timeout.
    pub fn new(engine_body: &str) -> Self {
        Self::with_timeout(engine_body, 30)
    }

    pub fn with_timeout(engine_body: &str, timeout_seconds: u64) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let engine_dir = base.join("engine");
        let output_dir = base.join("srv").join("out");
        let db_path = base.join("prompts.db");
        let config_path = base.join("config.json");

        std::fs::create_dir_all(&engine_dir).expect("Failed to create engine dir");

        let harness = Self {
            temp_dir,
            engine_dir,
            output_dir,
            db_path,
            config_path,
        };
        harness.set_engine(engine_body);
        harness.create_upstream_schema();
        harness.write_config(timeout_seconds);
        harness
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Replaces the engine script body.
    pub fn set_engine(&self, body: &str) {
        std::fs::write(
            self.engine_dir.join("workflow.sh"),
            format!("{}{}\n", ENGINE_PROLOGUE, body),
        )
        .expect("Failed to write engine script");
    }

    /// Arguments the engine received on its most recent run.
    pub fn last_engine_args(&self) -> Vec<String> {
        std::fs::read_to_string(self.engine_dir.join("last_args.txt"))
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn write_config(&self, timeout_seconds: u64) {
        let json = serde_json::json!({
            "database": { "path": self.db_path, "checkpoint_mode": "passive" },
            "engine": {
                "executable": "sh",
                "directory": self.engine_dir,
                "output_directory": self.output_dir,
                "timeout_seconds": timeout_seconds
            },
            "workflows": {
                "image": { "script": "workflow.sh", "prompt_arg": "prompt" },
                "audio": { "script": "workflow.sh", "prompt_arg": "lyrics", "tags_arg": "tags" }
            }
        });
        std::fs::write(
            &self.config_path,
            serde_json::to_string_pretty(&json).expect("Failed to serialize config"),
        )
        .expect("Failed to write config file");
    }

    pub fn config(&self) -> Config {
        load_config(&self.config_path).expect("Failed to load harness config")
    }

    /// Tables as the upstream prompt producer creates them.
    fn create_upstream_schema(&self) {
        let conn = Connection::open(&self.db_path).expect("Failed to open database");
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             CREATE TABLE prompts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                prompt_text TEXT NOT NULL,
                prompt_type TEXT NOT NULL,
                output_reference INTEGER,
                artifact_status TEXT DEFAULT 'pending',
                error_message TEXT,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                completed_at TEXT
             );
             CREATE TABLE writings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content_type TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
             );",
        )
        .expect("Failed to create upstream schema");
    }

    pub fn open_database(&self) -> Database {
        let config = self.config();
        Database::open_with(&self.db_path, config.database.options())
            .expect("Failed to open database")
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::open(&self.config()).expect("Failed to build pipeline")
    }

    /// Edits the written config file in place.
    pub fn update_config(&self, edit: impl FnOnce(&mut serde_json::Value)) {
        let content =
            std::fs::read_to_string(&self.config_path).expect("Failed to read config file");
        let mut json: serde_json::Value =
            serde_json::from_str(&content).expect("Failed to parse config file");
        edit(&mut json);
        std::fs::write(
            &self.config_path,
            serde_json::to_string_pretty(&json).expect("Failed to serialize config"),
        )
        .expect("Failed to write config file");
    }

    /// Inserts a prompt whose `artifact_status` is NULL, as rows written
    /// before the status column was populated are.
    pub fn seed_prompt_without_status(&self, text: &str, prompt_type: &str) -> i64 {
        let conn = self.reader();
        conn.execute(
            "INSERT INTO prompts (prompt_text, prompt_type, artifact_status) VALUES (?1, ?2, NULL)",
            params![text, prompt_type],
        )
        .expect("Failed to seed prompt");
        conn.last_insert_rowid()
    }

    /// A connection separate from the pipeline's, like the serving API.
    pub fn reader(&self) -> Connection {
        Connection::open(&self.db_path).expect("Failed to open reader connection")
    }

    /// Inserts a prompt the way the upstream producer does.
    pub fn seed_prompt(&self, text: &str, prompt_type: &str) -> i64 {
        let conn = self.reader();
        conn.execute(
            "INSERT INTO prompts (prompt_text, prompt_type) VALUES (?1, ?2)",
            params![text, prompt_type],
        )
        .expect("Failed to seed prompt");
        conn.last_insert_rowid()
    }

    /// Inserts a prompt with a structured payload in `writings`.
    pub fn seed_prompt_with_payload(&self, text: &str, prompt_type: &str, payload: &str) -> i64 {
        let conn = self.reader();
        conn.execute(
            "INSERT INTO writings (content_type, content) VALUES (?1, ?2)",
            params![prompt_type, payload],
        )
        .expect("Failed to seed payload");
        let writing = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO prompts (prompt_text, prompt_type, output_reference) VALUES (?1, ?2, ?3)",
            params![text, prompt_type, writing],
        )
        .expect("Failed to seed prompt");
        conn.last_insert_rowid()
    }

    /// `(artifact_status, error_message)` as another process sees it.
    pub fn status_of(&self, prompt_id: i64) -> (String, Option<String>) {
        self.reader()
            .query_row(
                "SELECT artifact_status, error_message FROM prompts WHERE id = ?1",
                params![prompt_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .expect("Failed to read prompt status")
    }

    /// `file_path` values of the prompt's artifacts as another process sees them.
    pub fn artifact_paths(&self, prompt_id: i64) -> Vec<String> {
        let conn = self.reader();
        let mut stmt = conn
            .prepare("SELECT file_path FROM prompt_artifacts WHERE prompt_id = ?1 ORDER BY id")
            .expect("Failed to prepare artifact query");
        let paths = stmt
            .query_map(params![prompt_id], |r| r.get(0))
            .expect("Failed to query artifacts")
            .collect::<Result<Vec<String>, _>>()
            .expect("Failed to read artifacts");
        paths
    }
}
