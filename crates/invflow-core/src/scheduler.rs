//! Bounded-concurrency task scheduler
//!
//! Runs every [`ResourceTask`] of a profile with at most `max_concurrency`
//! in flight and returns exactly one [`TaskOutcome`] per task. Each task runs
//! on its own tokio task, so an error or a panic stays at that task's
//! boundary and never reaches its siblings.

use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// One category's bound collection-and-write unit of work
pub struct ResourceTask {
    name: String,
    future: BoxFuture<'static, anyhow::Result<()>>,
}

impl ResourceTask {
    pub fn new<F>(name: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            future: Box::pin(future),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for ResourceTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceTask")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Result of one task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskOutcome {
    pub task_name: String,
    pub succeeded: bool,
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl TaskOutcome {
    pub fn success(task_name: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            task_name: task_name.into(),
            succeeded: true,
            error: None,
            elapsed,
        }
    }

    pub fn failure(task_name: impl Into<String>, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            task_name: task_name.into(),
            succeeded: false,
            error: Some(error.into()),
            elapsed,
        }
    }
}

/// Runs resource tasks on a bounded pool
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    max_concurrency: usize,
}

impl TaskScheduler {
    /// `max_concurrency` is clamped to at least 1
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Run all tasks and wait for every one of them to report
    ///
    /// Outcomes are returned in completion order.
    pub async fn run_all(&self, tasks: Vec<ResourceTask>) -> Vec<TaskOutcome> {
        let total = tasks.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));

        let mut pending: FuturesUnordered<_> = tasks
            .into_iter()
            .map(|task| run_isolated(task, Arc::clone(&semaphore)))
            .collect();

        let mut outcomes = Vec::with_capacity(total);
        while let Some(outcome) = pending.next().await {
            if outcome.succeeded {
                tracing::info!("  ✓ Completed: {}", outcome.task_name);
            } else {
                tracing::warn!(
                    "  ✗ Failed: {} - {}",
                    outcome.task_name,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
            }
            outcomes.push(outcome);
        }

        outcomes
    }
}

async fn run_isolated(task: ResourceTask, semaphore: Arc<Semaphore>) -> TaskOutcome {
    let ResourceTask { name, future } = task;

    // The semaphore is owned by `run_all` and never closed
    let _permit = semaphore.acquire().await;

    let started = Instant::now();
    tracing::debug!("Started: {}", name);

    match tokio::spawn(future).await {
        Ok(Ok(())) => TaskOutcome::success(name, started.elapsed()),
        Ok(Err(err)) => TaskOutcome::failure(name, format!("{:#}", err), started.elapsed()),
        Err(join_err) => {
            let message = if join_err.is_panic() {
                format!("task panicked: {}", panic_message(join_err.into_panic()))
            } else {
                format!("task cancelled: {}", join_err)
            };
            TaskOutcome::failure(name, message, started.elapsed())
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
