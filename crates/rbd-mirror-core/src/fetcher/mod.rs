//! Invocation of the `rbd` administration CLI.
//!
//! The `StatusFetcher` trait lets the collector run against the real binary
//! in production and against scripted replies in tests.
//!
//! ```text
//! MirrorCollector ──fetch(deadline, args)──▶ StatusFetcher
//!                                              ├─ RbdCommand  (tokio::process)
//!                                              └─ MockFetcher (scripted)
//! ```

pub mod mock;

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tokio::time::Instant;
use tracing::debug;

use crate::config::CollectorConfig;

pub use mock::{MockFetcher, MockReply};

/// Transport failure of a single CLI invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// The process could not be started.
    Spawn(String),
    /// The process exited unsuccessfully. `code` is `None` when killed by a signal.
    Exit { code: Option<i32>, stderr: String },
    /// Reading the process output failed.
    Io(String),
    /// The scrape deadline elapsed before the process finished.
    Timeout,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Spawn(msg) => write!(f, "failed to start rbd: {}", msg),
            FetchError::Exit { code, stderr } => {
                match code {
                    Some(code) => write!(f, "rbd exited with status {}", code)?,
                    None => write!(f, "rbd terminated by signal")?,
                }
                if !stderr.is_empty() {
                    write!(f, ": {}", stderr)?;
                }
                Ok(())
            }
            FetchError::Io(msg) => write!(f, "rbd I/O error: {}", msg),
            FetchError::Timeout => write!(f, "rbd timed out"),
        }
    }
}

impl std::error::Error for FetchError {}

/// Source of raw `rbd` JSON output.
///
/// One call is one attempt: implementations do not retry, cache or validate.
pub trait StatusFetcher: Send + Sync {
    /// Runs the tool with `args` and returns its stdout.
    ///
    /// Must give up with [`FetchError::Timeout`] once `deadline` passes.
    fn fetch(
        &self,
        deadline: Instant,
        args: &[String],
    ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// Runs the real `rbd` binary.
#[derive(Debug, Clone)]
pub struct RbdCommand {
    program: PathBuf,
    debug: bool,
}

impl RbdCommand {
    /// Creates a fetcher for the binary at `program` (looked up in `PATH` if bare).
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            debug: false,
        }
    }

    /// Creates a fetcher for `program` that logs when `config.debug` is set.
    pub fn from_config(program: impl Into<PathBuf>, config: &CollectorConfig) -> Self {
        Self::new(program).with_debug(config.debug)
    }

    /// Logs each invocation and the stderr of failures.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn program(&self) -> &std::path::Path {
        &self.program
    }
}

impl Default for RbdCommand {
    fn default() -> Self {
        Self::new("rbd")
    }
}

impl StatusFetcher for RbdCommand {
    async fn fetch(&self, deadline: Instant, args: &[String]) -> Result<Vec<u8>, FetchError> {
        if self.debug {
            debug!(program = %self.program.display(), args = %args.join(" "), "run");
        }

        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FetchError::Spawn(format!("{}: {}", self.program.display(), e)))?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout_at(deadline, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                if self.debug {
                    debug!(error = %e, "rbd output read failed");
                }
                return Err(FetchError::Io(e.to_string()));
            }
            Err(_) => {
                if self.debug {
                    debug!(args = %args.join(" "), "rbd deadline elapsed, process killed");
                }
                return Err(FetchError::Timeout);
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if self.debug {
                debug!(status = %output.status, stderr = %stderr, "rbd error");
            }
            return Err(FetchError::Exit {
                code: output.status.code(),
                stderr,
            });
        }

        Ok(output.stdout)
    }
}
