mod collector;
mod configuration;
mod context;
mod error;
mod executor;
mod input;
mod locator;
mod queue;
mod report;
mod runner;
mod solver;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Duration;
use tracing::{error, info, warn};

use crate::executor::SolverExecutor;
use crate::queue::{JobQueue, ResultStore, SolverJob};

const DEFAULT_MAX_CONCURRENT: usize = 2;
/// BLPOP wait between shutdown checks
const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("solver_worker=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    // Load solver layout
    let layout_path = std::env::var("SOLVER_LAYOUT_CONFIG").ok();
    let layout = solver::init_layout(layout_path.as_deref())?;
    info!(
        "Loaded solver layout from {}",
        layout_path.as_deref().unwrap_or("built-in defaults")
    );

    let max_concurrent = match std::env::var("SOLVER_MAX_CONCURRENT") {
        Ok(v) => v
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .with_context(|| format!("Invalid SOLVER_MAX_CONCURRENT: {}", v))?,
        Err(_) => DEFAULT_MAX_CONCURRENT,
    };

    let mut executor = SolverExecutor::new(layout.clone());
    if let Ok(base_dir) = std::env::var("SOLVER_BASE_DIR") {
        info!("Locating solver from SOLVER_BASE_DIR={}", base_dir);
        executor = executor.with_base_dir(base_dir);
    }
    let executor = Arc::new(executor);
    info!(
        "Solver worker: executable={}/{}, timeout={}s, max_concurrent={}",
        executor.layout().solver_dir,
        executor.layout().executable,
        executor.layout().timeout_secs,
        max_concurrent
    );

    info!("Starting Solver Worker...");
    let mut queue = JobQueue::from_env().await?;
    let store = queue.result_store().await?;

    let shutdown = Arc::new(AtomicBool::new(false));
    spawn_shutdown_listener(shutdown.clone());

    let semaphore = Arc::new(Semaphore::new(max_concurrent));
    let mut tasks = JoinSet::new();

    info!("Waiting for jobs...");

    while !shutdown.load(Ordering::SeqCst) {
        while let Some(joined) = tasks.try_join_next() {
            reap(joined, &shutdown);
        }

        let permit = semaphore.clone().acquire_owned().await?;
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let Some(job) = queue.pop_job(POLL_INTERVAL).await? else {
            continue;
        };

        info!(
            "Received solver job: request_id={}, fields={}",
            job.request_id,
            job.configuration.field_count()
        );

        let executor = executor.clone();
        let store = store.clone();
        tasks.spawn(async move {
            let _permit = permit;
            process_solver_job(job, &executor, store).await
        });
    }

    info!("Shutting down, waiting for {} running job(s)", tasks.len());
    while let Some(joined) = tasks.join_next().await {
        reap(joined, &shutdown);
    }

    info!("Solver worker stopped");
    Ok(())
}

/// Run one job and store its result. Returns whether the run was interrupted.
async fn process_solver_job(job: SolverJob, executor: &SolverExecutor, mut store: ResultStore) -> bool {
    let result = executor.execute(&job.configuration).await;

    if let Err(e) = store.store_result(&job.request_id, &result).await {
        error!(
            "Failed to store solver result for request {}: {}",
            job.request_id, e
        );
    }

    info!(
        "Solver job completed: request_id={}, execution_id={}, success={}",
        job.request_id, result.execution_id, result.success
    );

    result.is_interrupted()
}

fn reap(joined: std::result::Result<bool, tokio::task::JoinError>, shutdown: &AtomicBool) {
    match joined {
        Ok(true) => {
            warn!("Solver job was interrupted; no new jobs will be taken");
            shutdown.store(true, Ordering::SeqCst);
        }
        Ok(false) => {}
        Err(e) => error!("Solver job task failed: {}", e),
    }
}

fn spawn_shutdown_listener(shutdown: Arc<AtomicBool>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping after running jobs finish");
                shutdown.store(true, Ordering::SeqCst);
            }
            Err(e) => warn!("Failed to listen for interrupt: {}", e),
        }
    });
}
