//! Solver execution orchestration
//!
//! One call to [`SolverExecutor::execute`] is one run: locate the solver, mint
//! an execution context, stage the input file, supervise the process, collect
//! what it wrote and report. Runs share nothing but the (read-only) solver
//! directory and executable, so any number may execute concurrently.

use std::io;
use std::path::{Path, PathBuf};

use nix::unistd::{access, AccessFlags};
use tracing::{error, info, warn};

use crate::collector::collect_output_files;
use crate::configuration::Configuration;
use crate::context::ExecutionContext;
use crate::error::ExecutionError;
use crate::input::{summarize, write_input_file};
use crate::locator::{absolute_base, locate_executable};
use crate::report::ExecutionResult;
use crate::runner::{CommandSpec, RunLimits, RunOutcome, RunStatus, Runner, SupervisedRunner};
use crate::solver::SolverLayout;

/// Failed run plus whatever was gathered before the failure was detected
struct Failure {
    error: ExecutionError,
    output: Option<String>,
    output_files: Option<Vec<String>>,
}

impl From<ExecutionError> for Failure {
    fn from(error: ExecutionError) -> Self {
        Self {
            error,
            output: None,
            output_files: None,
        }
    }
}

impl Failure {
    fn with_output(mut self, output: String) -> Self {
        self.output = Some(output);
        self
    }

    fn with_files(mut self, output_files: Option<Vec<String>>) -> Self {
        self.output_files = output_files;
        self
    }
}

/// Runs the solver for one configuration at a time per call
pub struct SolverExecutor {
    layout: SolverLayout,
    runner: Box<dyn Runner>,
    /// Directory the locator starts from; the process's current directory when unset
    base_dir: Option<PathBuf>,
}

impl SolverExecutor {
    pub fn new(layout: SolverLayout) -> Self {
        Self {
            layout,
            runner: Box::new(SupervisedRunner::new()),
            base_dir: None,
        }
    }

    pub fn with_runner(mut self, runner: impl Runner + 'static) -> Self {
        self.runner = Box::new(runner);
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn layout(&self) -> &SolverLayout {
        &self.layout
    }

    /// Run the solver for `config` and report the outcome.
    ///
    /// Never returns before the solver process has terminated.
    pub async fn execute(&self, config: &Configuration) -> ExecutionResult {
        let ctx = ExecutionContext::allocate(self.locate());
        let id = ctx.execution_id();

        info!("Starting solver execution with ID: {}", id);
        info!("Work directory: {:?}", ctx.work_dir());
        info!("Input file: {:?}", ctx.input_file());
        info!("Output directory: {:?}", ctx.output_dir());

        match self.run(&ctx, config).await {
            Ok((output, output_files)) => {
                info!(
                    "Solver execution {} succeeded with {} output file(s)",
                    id,
                    output_files.len()
                );
                ExecutionResult::success(id, output, output_files)
            }
            Err(failure) => {
                error!("Solver execution {} failed: {}", id, failure.error);
                ExecutionResult::failure(id, &failure.error, failure.output, failure.output_files)
            }
        }
    }

    fn locate(&self) -> PathBuf {
        let cwd = match &self.base_dir {
            Some(dir) => absolute_base(dir),
            None => std::env::current_dir().unwrap_or_else(|e| {
                warn!("Cannot read current directory ({}), using \".\"", e);
                absolute_base(Path::new("."))
            }),
        };
        info!("Locating solver from {:?}", cwd);
        locate_executable(&cwd, &self.layout)
    }

    async fn run(
        &self,
        ctx: &ExecutionContext,
        config: &Configuration,
    ) -> Result<(String, Vec<String>), Failure> {
        config.validate().map_err(ExecutionError::from)?;

        if !ctx.work_dir().is_dir() {
            return Err(ExecutionError::MissingWorkDir(ctx.work_dir().to_path_buf()).into());
        }

        if !ctx.executable().exists() {
            return Err(ExecutionError::MissingExecutable {
                path: ctx.executable().to_path_buf(),
                recompile_hint: self.layout.recompile_hint(),
            }
            .into());
        }

        if access(ctx.executable(), AccessFlags::X_OK).is_err() {
            warn!(
                "Executable may not have execute permissions: {:?}",
                ctx.executable()
            );
        }

        tokio::fs::create_dir_all(ctx.output_dir())
            .await
            .map_err(ExecutionError::Io)?;
        info!("Created output directory: {:?}", ctx.output_dir());

        write_input_file(ctx.input_file(), config)
            .await
            .map_err(ExecutionError::Io)?;
        info!("Created input file: {:?} ({})", ctx.input_file(), summarize(config));

        let cmd = CommandSpec::new(ctx.executable())
            .with_args([ctx.input_file()])
            .with_work_dir(ctx.work_dir());
        let limits = RunLimits::new(self.layout.timeout());

        info!("Executing: {:?} {:?}", ctx.executable(), ctx.input_file());
        let outcome = self
            .runner
            .run(&cmd, &limits)
            .await
            .map_err(classify_runner_error)?;

        self.finish(ctx, &limits, outcome).await
    }

    async fn finish(
        &self,
        ctx: &ExecutionContext,
        limits: &RunLimits,
        outcome: RunOutcome,
    ) -> Result<(String, Vec<String>), Failure> {
        info!(
            "Solver run {} ended: success={}, elapsed_ms={}",
            ctx.execution_id(),
            outcome.is_success(),
            outcome.elapsed.as_millis()
        );
        let RunOutcome { status, output, .. } = outcome;

        let error = match status {
            RunStatus::TimedOut => {
                let partial = collect_output_files(ctx.output_dir()).await.ok();
                return Err(Failure::from(ExecutionError::Timeout(limits.timeout))
                    .with_output(output)
                    .with_files(partial));
            }
            RunStatus::Interrupted => {
                return Err(Failure::from(ExecutionError::Interrupted(
                    "received interrupt signal while waiting for solver".to_string(),
                ))
                .with_output(output));
            }
            RunStatus::Exited(0) => None,
            RunStatus::Exited(code) => Some(ExecutionError::NonZeroExit(code)),
            RunStatus::Signaled(sig) => Some(ExecutionError::Signaled(sig)),
        };

        let collected = collect_output_files(ctx.output_dir()).await;
        settle(error, output, collected)
    }
}

/// Combine the exit classification with the collected files.
///
/// A failed walk only becomes the reported error when the solver itself
/// succeeded; otherwise the exit error stands and the files are left out.
fn settle(
    error: Option<ExecutionError>,
    output: String,
    collected: io::Result<Vec<String>>,
) -> Result<(String, Vec<String>), Failure> {
    match (error, collected) {
        (None, Ok(files)) => Ok((output, files)),
        (None, Err(e)) => Err(Failure::from(ExecutionError::Io(e)).with_output(output)),
        (Some(error), Ok(files)) => Err(Failure::from(error)
            .with_output(output)
            .with_files(Some(files))),
        (Some(error), Err(e)) => {
            warn!("Error collecting output files after failed run: {}", e);
            Err(Failure::from(error).with_output(output))
        }
    }
}

fn classify_runner_error(e: anyhow::Error) -> Failure {
    match e.downcast::<std::io::Error>() {
        Ok(io) => ExecutionError::Io(io).into(),
        Err(other) => ExecutionError::unexpected("RunnerError", other).into(),
    }
}
