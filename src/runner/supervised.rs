//! Supervised runner implementation
//!
//! Runs the solver directly in its own process group. Both output pipes are
//! forwarded line by line into one channel, so the console text is merged in
//! arrival order and stays available even when the run has to be killed.

use async_trait::async_trait;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::future::Future;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{CommandSpec, RunLimits, RunOutcome, RunStatus, Runner};

/// How often a still-running solver is reported
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// How long to wait for buffered output once the process is gone
const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Runner that owns one solver process at a time
pub struct SupervisedRunner {
    heartbeat: Duration,
}

impl SupervisedRunner {
    pub fn new() -> Self {
        Self {
            heartbeat: HEARTBEAT_INTERVAL,
        }
    }

    /// Run a program and wait for it, killing it once `limits.timeout` elapses
    /// or Ctrl-C arrives
    pub async fn execute(&self, cmd: &CommandSpec, limits: &RunLimits) -> std::io::Result<RunOutcome> {
        self.execute_until(cmd, limits, tokio::signal::ctrl_c()).await
    }

    /// Like [`execute`](Self::execute), with `interrupt` in place of Ctrl-C.
    ///
    /// An `Err` from `interrupt` is logged and ignored.
    pub async fn execute_until<F>(
        &self,
        cmd: &CommandSpec,
        limits: &RunLimits,
        interrupt: F,
    ) -> std::io::Result<RunOutcome>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        debug!(
            "Running solver: {:?} with args: {:?} in {:?}",
            cmd.program, cmd.args, cmd.work_dir
        );

        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);
        if let Some(dir) = &cmd.work_dir {
            command.current_dir(dir);
        }

        let started = Instant::now();
        let mut child = command.spawn()?;
        let pid = child.id();
        info!("Spawned solver pid={:?}", pid);

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(forward_lines(stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(forward_lines(stderr, tx.clone())));
        }
        drop(tx);

        let mut output = String::new();
        let deadline = started + limits.timeout;
        let mut next_heartbeat = started + self.heartbeat;
        let mut lines_open = true;

        tokio::pin!(interrupt);
        let mut interrupt_armed = true;

        let status = loop {
            tokio::select! {
                line = rx.recv(), if lines_open => match line {
                    Some(line) => push_line(&mut output, line),
                    None => lines_open = false,
                },
                result = child.wait() => {
                    break exit_status_to_run_status(result?);
                }
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(
                        "Solver pid={:?} exceeded {}s, killing",
                        pid,
                        limits.timeout.as_secs()
                    );
                    terminate(&mut child, pid).await;
                    break RunStatus::TimedOut;
                }
                signal = &mut interrupt, if interrupt_armed => match signal {
                    Ok(()) => {
                        warn!("Interrupted while waiting for solver pid={:?}, killing", pid);
                        terminate(&mut child, pid).await;
                        break RunStatus::Interrupted;
                    }
                    Err(e) => {
                        warn!("Failed to listen for interruption: {}", e);
                        interrupt_armed = false;
                    }
                },
                _ = tokio::time::sleep_until(next_heartbeat) => {
                    info!(
                        "Solver pid={:?} still running ({}s elapsed, limit {}s)",
                        pid,
                        started.elapsed().as_secs(),
                        limits.timeout.as_secs()
                    );
                    next_heartbeat += self.heartbeat;
                }
            }
        };

        // Pipes close once every process holding them is gone.
        let drained = tokio::time::timeout(DRAIN_GRACE, async {
            while let Some(line) = rx.recv().await {
                push_line(&mut output, line);
            }
        })
        .await;
        if drained.is_err() {
            warn!(
                "Solver pid={:?} left processes holding its output open, killing its group",
                pid
            );
            kill_group(pid);
            while let Ok(line) = rx.try_recv() {
                push_line(&mut output, line);
            }
        }
        for reader in readers {
            reader.abort();
        }

        let elapsed = started.elapsed();
        info!(
            "Solver pid={:?} finished: status={:?}, elapsed_ms={}",
            pid,
            status,
            elapsed.as_millis()
        );

        Ok(RunOutcome {
            status,
            output,
            elapsed,
        })
    }
}

impl Default for SupervisedRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Runner for SupervisedRunner {
    async fn run(&self, cmd: &CommandSpec, limits: &RunLimits) -> anyhow::Result<RunOutcome> {
        Ok(self.execute(cmd, limits).await?)
    }
}

fn push_line(output: &mut String, line: String) {
    output.push_str(&line);
    output.push('\n');
}

/// Forward every line of `reader` into `tx` until EOF
async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf)
            .trim_end_matches(|c| c == '\n' || c == '\r')
            .to_string();
        if tx.send(line).is_err() {
            return Ok(());
        }
    }
}

fn exit_status_to_run_status(status: ExitStatus) -> RunStatus {
    match (status.code(), status.signal()) {
        (Some(code), _) => RunStatus::Exited(code),
        (None, Some(sig)) => RunStatus::Signaled(sig),
        (None, None) => RunStatus::Exited(-1),
    }
}

/// SIGKILL the solver's process group, including anything it spawned
fn kill_group(pid: Option<u32>) {
    let Some(pid) = pid else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        debug!("killpg({}) failed: {}", pid, e);
    }
}

async fn terminate(child: &mut Child, pid: Option<u32>) {
    kill_group(pid);
    if let Err(e) = child.kill().await {
        warn!("Failed to kill solver pid={:?}: {}", pid, e);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tokio_test::assert_ok;

    /// Write an executable `/bin/sh` script
    pub(crate) fn write_script(path: &Path, body: &str) -> PathBuf {
        std::fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_path_buf()
    }

    fn limits(ms: u64) -> RunLimits {
        RunLimits::new(Duration::from_millis(ms))
    }

    #[tokio::test]
    async fn test_merges_stdout_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            &dir.path().join("solver.sh"),
            "echo out-1\necho err-1 >&2\necho out-2",
        );

        let outcome = assert_ok!(
            SupervisedRunner::new()
                .execute(&CommandSpec::new(&script), &limits(10_000))
                .await
        );

        assert!(outcome.is_success());
        assert!(outcome.output.contains("out-1\n"));
        assert!(outcome.output.contains("err-1\n"));
        assert!(outcome.output.contains("out-2\n"));
        assert_eq!(outcome.output.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_passes_argument_and_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(&dir.path().join("solver.sh"), "pwd\necho \"arg=$1 argc=$#\"");
        let work_dir = dir.path().canonicalize().unwrap();

        let cmd = CommandSpec::new(&script)
            .with_args([work_dir.join("input_x.txt")])
            .with_work_dir(&work_dir);
        let outcome = SupervisedRunner::new()
            .execute(&cmd, &limits(10_000))
            .await
            .unwrap();

        let lines: Vec<&str> = outcome.output.lines().collect();
        assert_eq!(lines[0], work_dir.to_str().unwrap());
        assert_eq!(
            lines[1],
            format!("arg={} argc=1", work_dir.join("input_x.txt").display())
        );
    }

    #[tokio::test]
    async fn test_reports_exit_code_and_signal() {
        let dir = tempfile::tempdir().unwrap();
        let failing = write_script(&dir.path().join("fail.sh"), "echo failing\nexit 3");
        let crashing = write_script(&dir.path().join("crash.sh"), "kill -9 $$");

        let runner = SupervisedRunner::new();
        let outcome = runner
            .execute(&CommandSpec::new(&failing), &limits(10_000))
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Exited(3));
        assert_eq!(outcome.output, "failing\n");

        let outcome = runner
            .execute(&CommandSpec::new(&crashing), &limits(10_000))
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Signaled(9));
    }

    #[tokio::test]
    async fn test_timeout_kills_process_and_keeps_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            &dir.path().join("hang.sh"),
            "echo started\nsleep 30 &\nsleep 30\necho unreachable",
        );

        let started = std::time::Instant::now();
        let outcome = SupervisedRunner::new()
            .execute(&CommandSpec::new(&script), &limits(500))
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::TimedOut);
        assert_eq!(outcome.output, "started\n");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_interrupt_kills_process_group() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("survived");
        let script = write_script(
            &dir.path().join("long.sh"),
            &format!(
                "echo started\n(sleep 2; touch {}) &\nsleep 30\necho unreachable",
                marker.display()
            ),
        );

        let interrupt = async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(())
        };
        let started = std::time::Instant::now();
        let outcome = SupervisedRunner::new()
            .execute_until(&CommandSpec::new(&script), &limits(60_000), interrupt)
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Interrupted);
        assert_eq!(outcome.output, "started\n");
        assert!(started.elapsed() < Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_failed_interrupt_source_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(&dir.path().join("short.sh"), "sleep 0.3\necho done");

        let interrupt = async { Err(std::io::Error::other("no signal handler")) };
        let outcome = SupervisedRunner::new()
            .execute_until(&CommandSpec::new(&script), &limits(10_000), interrupt)
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Exited(0));
        assert_eq!(outcome.output, "done\n");
    }

    #[tokio::test]
    async fn test_spawn_failure_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SupervisedRunner::new()
            .execute(
                &CommandSpec::new(dir.path().join("missing.exe")),
                &limits(1_000),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn test_exit_status_mapping() {
        assert_eq!(
            exit_status_to_run_status(ExitStatus::from_raw(0)),
            RunStatus::Exited(0)
        );
        assert_eq!(
            exit_status_to_run_status(ExitStatus::from_raw(2 << 8)),
            RunStatus::Exited(2)
        );
        assert_eq!(
            exit_status_to_run_status(ExitStatus::from_raw(9)),
            RunStatus::Signaled(9)
        );
    }
}
