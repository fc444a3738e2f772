//! Database module for persistent storage.
//!
//! Uses rusqlite (SQLite) with a thread-safe `Database` handle.
//! All access is serialized through a `Mutex<Connection>`.
//!
//! The database file is shared with other processes (the serving API,
//! possibly in a container that only sees the file). Every write goes
//! through [`Database::commit_and_publish`], which commits and then
//! checkpoints the WAL so those readers see the change promptly.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};

pub mod artifact_repo;
pub mod error;
pub mod migrations;
pub mod prompt_repo;

pub use error::DatabaseError;

/// `PRAGMA wal_checkpoint` mode run after every committed write.
///
/// `Passive` never blocks readers or writers but may leave frames in the
/// WAL while a reader holds a snapshot. The stronger modes wait for
/// readers and trade write latency for guaranteed visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointMode {
    #[default]
    Passive,
    Full,
    Restart,
    Truncate,
}

impl CheckpointMode {
    fn pragma(&self) -> &'static str {
        match self {
            CheckpointMode::Passive => "PRAGMA wal_checkpoint(PASSIVE)",
            CheckpointMode::Full => "PRAGMA wal_checkpoint(FULL)",
            CheckpointMode::Restart => "PRAGMA wal_checkpoint(RESTART)",
            CheckpointMode::Truncate => "PRAGMA wal_checkpoint(TRUNCATE)",
        }
    }
}

impl fmt::Display for CheckpointMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckpointMode::Passive => "passive",
            CheckpointMode::Full => "full",
            CheckpointMode::Restart => "restart",
            CheckpointMode::Truncate => "truncate",
        };
        f.write_str(name)
    }
}

/// Result row of `PRAGMA wal_checkpoint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointResult {
    /// True if a reader or writer prevented a complete checkpoint.
    pub busy: bool,
    /// Frames in the WAL, or -1 when the database is not in WAL mode.
    pub log_frames: i64,
    /// Frames copied back into the database file, or -1.
    pub checkpointed_frames: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct DatabaseOptions {
    pub checkpoint_mode: CheckpointMode,
    pub busy_timeout: Duration,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            checkpoint_mode: CheckpointMode::Passive,
            busy_timeout: Duration::from_secs(30),
        }
    }
}

/// Size information about the database and its write-ahead log.
#[derive(Debug, Clone, Serialize)]
pub struct WalStats {
    pub journal_mode: String,
    pub page_count: i64,
    pub page_size: i64,
    pub db_size_bytes: u64,
    pub wal_size_bytes: u64,
    /// WAL size relative to the database size; large values mean
    /// checkpoints are not keeping up.
    pub wal_ratio: f64,
}

/// Thread-safe database handle wrapping a single rusqlite connection.
///
/// Cloning is cheap (inner `Arc`). All access is serialized through
/// a `Mutex`, which is fine for SQLite (which serializes writes anyway).
/// WAL mode is enabled for concurrent read performance.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
    options: DatabaseOptions,
}

impl Database {
    /// Opens (or creates) the database at the given path with default
    /// options and runs all pending migrations.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Self::open_with(path, DatabaseOptions::default())
    }

    pub fn open_with(path: &Path, options: DatabaseOptions) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(options.busy_timeout)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;

        migrations::run_all(&conn)?;

        log::info!(
            "Database opened at {} (checkpoint mode: {})",
            path.display(),
            options.checkpoint_mode
        );

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
            options,
        })
    }

    /// Opens an in-memory database for testing. Runs all migrations.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
            options: DatabaseOptions::default(),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn checkpoint_mode(&self) -> CheckpointMode {
        self.options.checkpoint_mode
    }

    /// Provides locked access to the underlying connection. Use for reads;
    /// writes go through [`Database::commit_and_publish`].
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }

    /// Runs `f` inside an IMMEDIATE transaction, commits, then checkpoints
    /// the WAL with the configured mode.
    ///
    /// If `f` fails the transaction is rolled back and nothing is
    /// checkpointed. The checkpoint itself is best-effort: a failure or a
    /// busy result is logged and the committed write stands.
    pub fn commit_and_publish<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, DatabaseError>,
    {
        let mut conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;

        match run_checkpoint(&conn, self.options.checkpoint_mode) {
            Ok(result) if result.busy => log::debug!(
                "WAL checkpoint ({}) partially blocked: {}/{} frames",
                self.options.checkpoint_mode,
                result.checkpointed_frames,
                result.log_frames
            ),
            Ok(result) => log::trace!(
                "WAL checkpoint ({}) flushed {} frames",
                self.options.checkpoint_mode,
                result.checkpointed_frames
            ),
            Err(e) => log::warn!("WAL checkpoint failed after commit: {}", e),
        }

        Ok(value)
    }

    /// Runs a checkpoint outside of a write, e.g. from an operator command.
    pub fn checkpoint(&self, mode: CheckpointMode) -> Result<CheckpointResult, DatabaseError> {
        self.with_conn(|conn| Ok(run_checkpoint(conn, mode)?))
    }

    /// Reports journal mode, database size, and WAL size.
    pub fn wal_stats(&self) -> Result<WalStats, DatabaseError> {
        let (journal_mode, page_count, page_size) = self.with_conn(|conn| {
            let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |r| r.get(0))?;
            let page_count: i64 = conn.query_row("PRAGMA page_count", [], |r| r.get(0))?;
            let page_size: i64 = conn.query_row("PRAGMA page_size", [], |r| r.get(0))?;
            Ok((journal_mode, page_count, page_size))
        })?;

        let wal_size_bytes = self
            .path
            .as_ref()
            .map(|p| wal_path(p))
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0);

        let db_size_bytes = (page_count.max(0) as u64) * (page_size.max(0) as u64);
        let wal_ratio = if db_size_bytes > 0 {
            wal_size_bytes as f64 / db_size_bytes as f64
        } else {
            0.0
        };

        Ok(WalStats {
            journal_mode,
            page_count,
            page_size,
            db_size_bytes,
            wal_size_bytes,
            wal_ratio,
        })
    }
}

fn run_checkpoint(
    conn: &Connection,
    mode: CheckpointMode,
) -> Result<CheckpointResult, rusqlite::Error> {
    conn.query_row(mode.pragma(), [], |r| {
        Ok(CheckpointResult {
            busy: r.get::<_, i64>(0)? != 0,
            log_frames: r.get(1)?,
            checkpointed_frames: r.get(2)?,
        })
    })
}

fn wal_path(db_path: &Path) -> PathBuf {
    let mut name = db_path.as_os_str().to_os_string();
    name.push("-wal");
    PathBuf::from(name)
}
