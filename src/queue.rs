//! Redis job transport
//!
//! This module handles all Redis-related operations:
//! - Job intake from the solver queue (BLPOP)
//! - Result storage and publishing

use std::time::Duration;

use anyhow::{Context, Result};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::configuration::Configuration;
use crate::report::ExecutionResult;

/// Redis key constants
pub mod keys {
    /// Solver job queue key
    pub const SOLVER_QUEUE: &str = "solver:queue";

    /// Solver result key prefix (for polling)
    pub const SOLVER_RESULT_PREFIX: &str = "solver:result:";

    /// Solver result channel (for pub/sub)
    pub const SOLVER_RESULT_CHANNEL: &str = "solver:results";
}

const RESULT_EXPIRY_SECS: u64 = 3600; // 1 hour

/// Job pushed by the backend
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverJob {
    /// Caller-chosen correlation key; results are stored under it
    pub request_id: String,
    pub configuration: Configuration,
}

/// Result as stored and published, tagged with the request it answers
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredResult<'a> {
    request_id: &'a str,
    #[serde(flatten)]
    result: &'a ExecutionResult,
}

/// Key under which the result of `request_id` is stored
pub fn result_key(request_id: &str) -> String {
    format!("{}{}", keys::SOLVER_RESULT_PREFIX, request_id)
}

/// Serialize a result the way it is stored and published
pub fn result_json(request_id: &str, result: &ExecutionResult) -> Result<String> {
    Ok(serde_json::to_string(&StoredResult { request_id, result })?)
}

/// Consumer side of the solver queue
pub struct JobQueue {
    client: redis::Client,
    conn: MultiplexedConnection,
}

impl JobQueue {
    async fn with_url(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = get_connection_with_retry(&client).await?;
        info!("Connected to Redis at {}", redis_url);

        Ok(Self { client, conn })
    }

    /// Create a new JobQueue using the REDIS_URL environment variable.
    /// Defaults to "redis://localhost:6379" if not set.
    pub async fn from_env() -> Result<Self> {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());
        Self::with_url(&url).await
    }

    /// A result store on its own connection, so BLPOP never delays result writes
    pub async fn result_store(&self) -> Result<ResultStore> {
        let conn = get_connection_with_retry(&self.client).await?;
        Ok(ResultStore {
            client: self.client.clone(),
            conn,
        })
    }

    /// Wait up to `wait` for the next job.
    ///
    /// Returns `None` when nothing arrived, so callers can check for shutdown
    /// between polls. Malformed jobs are logged and skipped. Automatically
    /// reconnects on connection failure.
    pub async fn pop_job(&mut self, wait: Duration) -> Result<Option<SolverJob>> {
        let result: Option<(String, String)> =
            match self.conn.blpop(keys::SOLVER_QUEUE, wait.as_secs_f64()).await {
                Ok(res) => res,
                Err(e) => {
                    warn!("Redis BLPOP failed: {}. Reconnecting...", e);
                    self.conn = get_connection_with_retry(&self.client).await?;
                    return Ok(None);
                }
            };

        let Some((_, job_data)) = result else {
            return Ok(None);
        };

        match serde_json::from_str::<SolverJob>(&job_data) {
            Ok(job) => Ok(Some(job)),
            Err(e) => {
                warn!("Failed to parse job data: {}. Data: {}", e, job_data);
                Ok(None)
            }
        }
    }
}

/// Producer side for results; cheap to clone into job tasks
#[derive(Clone)]
pub struct ResultStore {
    client: redis::Client,
    conn: MultiplexedConnection,
}

impl ResultStore {
    /// Store a solver result in Redis.
    ///
    /// The result is stored with a 1-hour expiration and also published
    /// to a channel for real-time subscribers.
    pub async fn store_result(&mut self, request_id: &str, result: &ExecutionResult) -> Result<()> {
        let key = result_key(request_id);
        let json = result_json(request_id, result)?;

        // Try to store, reconnect on failure
        if let Err(e) = self
            .conn
            .set_ex::<_, _, ()>(&key, &json, RESULT_EXPIRY_SECS)
            .await
        {
            warn!("Failed to store result: {}. Reconnecting...", e);
            self.conn = get_connection_with_retry(&self.client).await?;
            self.conn
                .set_ex::<_, _, ()>(&key, &json, RESULT_EXPIRY_SECS)
                .await?;
        }

        // Publish to channel (ignore errors as there may be no subscribers)
        let _ = self
            .conn
            .publish::<_, _, ()>(keys::SOLVER_RESULT_CHANNEL, &json)
            .await;

        Ok(())
    }
}

/// Get a Redis connection with retry logic
async fn get_connection_with_retry(client: &redis::Client) -> Result<MultiplexedConnection> {
    loop {
        match client.get_multiplexed_async_connection().await {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                warn!(
                    "Failed to connect to Redis: {}. Retrying in 3 seconds...",
                    e
                );
                tokio::time::sleep(Duration::from_secs(3)).await;
            }
        }
    }
}
