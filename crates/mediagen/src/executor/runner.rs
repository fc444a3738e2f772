//! Runs one engine invocation as a child process.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command as TokioCommand;

use super::args::Invocation;
use crate::config::EngineConfig;
use crate::error::ExecutionError;
use crate::sanitize::{redact_path, tail_chars};

/// What a successful run hands back. File names are not assumed; the
/// caller discovers outputs in `output_dir`.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub output_dir: PathBuf,
    pub exit_code: Option<i32>,
    pub stdout_tail: String,
    pub stderr_tail: String,
    pub elapsed: Duration,
}

/// Stateless subprocess runner with a hard timeout.
#[derive(Debug, Clone)]
pub struct WorkflowExecutor {
    timeout: Duration,
    tail_chars: usize,
}

impl WorkflowExecutor {
    pub const DEFAULT_TAIL_CHARS: usize = 2000;

    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            tail_chars: Self::DEFAULT_TAIL_CHARS,
        }
    }

    pub fn from_config(engine: &EngineConfig) -> Self {
        Self::new(engine.timeout())
    }

    pub fn with_tail_chars(mut self, tail_chars: usize) -> Self {
        self.tail_chars = tail_chars;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Spawns the engine and waits for it or the timeout, whichever comes
    /// first. On timeout the child is killed. The child is also killed if
    /// this future is dropped.
    pub async fn execute(&self, invocation: &Invocation) -> Result<ExecutionOutcome, ExecutionError> {
        let started = Instant::now();

        tracing::info!(
            kind = %invocation.kind,
            program = %redact_path(&invocation.program),
            timeout_secs = self.timeout.as_secs(),
            "Launching engine"
        );

        let mut cmd = TokioCommand::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| ExecutionError::Spawn {
            program: invocation.program.clone(),
            source: e,
        })?;

        let stdout_task = stream_lines(child.stdout.take(), "stdout", self.tail_chars);
        let stderr_task = stream_lines(child.stderr.take(), "stderr", self.tail_chars);

        let run = async {
            let (stdout_tail, stderr_tail, status) =
                tokio::join!(stdout_task, stderr_task, child.wait());
            (stdout_tail, stderr_tail, status)
        };
        let result = tokio::time::timeout(self.timeout, run).await;

        let (stdout_tail, stderr_tail, status) = match result {
            Ok(finished) => finished,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "Failed to kill timed-out engine process");
                }
                tracing::warn!(
                    kind = %invocation.kind,
                    timeout_secs = self.timeout.as_secs(),
                    "Engine timed out"
                );
                return Err(ExecutionError::Timeout {
                    kind: invocation.kind,
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        let status = status.map_err(ExecutionError::Wait)?;
        let elapsed = started.elapsed();

        if !status.success() {
            tracing::warn!(
                kind = %invocation.kind,
                exit_code = ?status.code(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Engine failed"
            );
            return Err(ExecutionError::NonZeroExit {
                code: status.code(),
                stderr_tail,
            });
        }

        tracing::info!(
            kind = %invocation.kind,
            elapsed_ms = elapsed.as_millis() as u64,
            "Engine finished"
        );

        Ok(ExecutionOutcome {
            output_dir: invocation.output_dir.clone(),
            exit_code: status.code(),
            stdout_tail,
            stderr_tail,
            elapsed,
        })
    }
}

/// Logs each line at debug level and returns the last `max_chars`
/// characters of the stream. Lines are decoded lossily and the pipe is
/// drained to EOF so the engine never writes into a closed pipe.
async fn stream_lines<R>(pipe: Option<R>, stream: &'static str, max_chars: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let mut tail = String::new();
    let Some(pipe) = pipe else {
        return tail;
    };

    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let decoded = String::from_utf8_lossy(&buf);
                let line = decoded.trim_end_matches(&['\r', '\n'][..]);
                tracing::debug!(target: "mediagen::engine", stream, "{}", line);
                tail.push_str(line);
                tail.push('\n');
                if tail.len() > max_chars.saturating_mul(8).max(4096) {
                    tail = tail_chars(&tail, max_chars).to_string();
                }
            }
            Err(e) => {
                tracing::warn!(stream, error = %e, "Failed to read engine output");
                break;
            }
        }
    }
    tail_chars(&tail, max_chars).to_string()
}
