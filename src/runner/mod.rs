//! Runner module - Solver process supervision
//!
//! This module provides the interface for running the solver:
//! - `SupervisedRunner`: spawns the solver directly, drains its merged output,
//!   enforces the wall-clock ceiling and kills it on timeout or interruption
//!
//! The runner module does NOT:
//! - Write the solver input file or look at the output directory
//! - Decide whether a run counts as success
//! - Know about the solver's location conventions

pub mod supervised;

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Command specification for execution
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Program path
    pub program: PathBuf,
    /// Positional arguments to the program
    pub args: Vec<OsString>,
    /// Working directory
    pub work_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            work_dir: None,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        self.args = args.into_iter().map(|a| a.into()).collect();
        self
    }

    pub fn with_work_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.work_dir = Some(dir.as_ref().to_path_buf());
        self
    }
}

/// Limits for execution
#[derive(Debug, Clone)]
pub struct RunLimits {
    /// Wall-clock ceiling
    pub timeout: Duration,
}

impl RunLimits {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// Execution status (raw, no success interpretation)
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    /// Program exited normally with given exit code
    Exited(i32),
    /// Killed by signal (not by us)
    Signaled(i32),
    /// Ceiling elapsed; the process was killed
    TimedOut,
    /// Host asked us to stop; the process was killed
    Interrupted,
}

impl RunStatus {
    /// Check if execution was successful (exited with code 0)
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Exited(0))
    }
}

/// Outcome of running a program
#[derive(Debug)]
pub struct RunOutcome {
    /// Execution status
    pub status: RunStatus,
    /// Merged stdout/stderr, one `\n`-terminated line per output line
    pub output: String,
    /// Wall-clock time from spawn to termination
    pub elapsed: Duration,
}

impl RunOutcome {
    /// Check if execution was successful
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Runner trait for executing the solver
#[async_trait]
pub trait Runner: Send + Sync {
    /// Run a command under the given limits.
    ///
    /// Returns only after the process has terminated.
    async fn run(&self, cmd: &CommandSpec, limits: &RunLimits) -> anyhow::Result<RunOutcome>;
}

// Re-exports
pub use supervised::SupervisedRunner;
