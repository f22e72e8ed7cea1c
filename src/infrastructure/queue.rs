use crate::domain::ports::JobQueue;
use crate::domain::task::JobId;
use crate::error::{PlanError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub type JobFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;
pub type JobHandler = Arc<dyn Fn(Value, ProgressHandle) -> JobFuture + Send + Sync>;

#[derive(Debug, Default, Clone)]
struct JobState {
    progress: u8,
    result: Option<Value>,
    error: Option<String>,
}

/// In-process job queue backed by spawned tokio tasks.
///
/// Stands in for the external queue service: workers are registered by job
/// name before anything is enqueued, and callers observe jobs only through
/// the `JobQueue` port. A finished job publishes its result and its
/// progress flag under one lock, so a complete job always has a visible
/// outcome unless the worker reported completion early itself.
#[derive(Default, Clone)]
pub struct InMemoryJobQueue {
    handlers: Arc<RwLock<HashMap<String, JobHandler>>>,
    jobs: Arc<RwLock<HashMap<JobId, JobState>>>,
    next: Arc<AtomicU64>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the worker function for a job name.
    pub async fn register<F>(&self, name: &str, handler: F)
    where
        F: Fn(Value, ProgressHandle) -> JobFuture + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .await
            .insert(name.to_string(), Arc::new(handler));
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job_name: &str, payload: Value) -> Result<JobId> {
        let handler = self
            .handlers
            .read()
            .await
            .get(job_name)
            .cloned()
            .ok_or_else(|| {
                PlanError::Task(format!("No worker registered for job '{}'", job_name))
            })?;

        let id = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        self.jobs.write().await.insert(id, JobState::default());

        let jobs = self.jobs.clone();
        let progress = ProgressHandle {
            jobs: jobs.clone(),
            id,
        };
        tokio::spawn(async move {
            let outcome = handler(payload, progress).await;
            let mut jobs = jobs.write().await;
            let Some(state) = jobs.get_mut(&id) else {
                return;
            };
            match outcome {
                Ok(result) => {
                    state.result = Some(result);
                    state.progress = 100;
                }
                Err(e) => {
                    warn!(id, error = %e, "job failed");
                    state.error = Some(e.to_string());
                    state.progress = 100;
                }
            }
        });
        debug!(job = job_name, id, "enqueued job");
        Ok(id)
    }

    async fn progress(&self, id: JobId) -> Result<Option<u8>> {
        Ok(self.jobs.read().await.get(&id).map(|s| s.progress))
    }

    async fn result(&self, id: JobId) -> Result<Option<Value>> {
        let jobs = self.jobs.read().await;
        match jobs.get(&id) {
            None => Ok(None),
            Some(state) => match &state.error {
                Some(message) => Err(PlanError::Task(message.clone())),
                None => Ok(state.result.clone()),
            },
        }
    }
}

/// Handle a worker uses to report intermediate progress for its job.
#[derive(Clone)]
pub struct ProgressHandle {
    jobs: Arc<RwLock<HashMap<JobId, JobState>>>,
    id: JobId,
}

impl ProgressHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Sets the job's queue-visible progress (capped at 100).
    pub async fn set(&self, progress: u8) {
        if let Some(state) = self.jobs.write().await.get_mut(&self.id) {
            state.progress = progress.min(100);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_enqueue_unknown_job_name() {
        let queue = InMemoryJobQueue::new();
        let result = queue.enqueue("nope", Value::Null).await;
        assert!(matches!(result, Err(PlanError::Task(_))));
    }

    #[tokio::test]
    async fn test_job_runs_to_completion() {
        let queue = InMemoryJobQueue::new();
        queue
            .register("double", |payload, progress| {
                Box::pin(async move {
                    progress.set(50).await;
                    let n = payload.as_u64().unwrap_or(0);
                    Ok(json!(n * 2))
                })
            })
            .await;

        let id = queue.enqueue("double", json!(21)).await.unwrap();
        for _ in 0..100 {
            if queue.progress(id).await.unwrap() == Some(100) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(queue.result(id).await.unwrap(), Some(json!(42)));
    }

    #[tokio::test]
    async fn test_failed_job_surfaces_error() {
        let queue = InMemoryJobQueue::new();
        queue
            .register("broken", |_payload, _progress| {
                Box::pin(async move { Err(PlanError::Validation("bad input".to_string())) })
            })
            .await;

        let id = queue.enqueue("broken", Value::Null).await.unwrap();
        for _ in 0..100 {
            if queue.progress(id).await.unwrap() == Some(100) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(queue.result(id).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_job_has_no_progress() {
        let queue = InMemoryJobQueue::new();
        assert_eq!(queue.progress(404).await.unwrap(), None);
        assert_eq!(queue.result(404).await.unwrap(), None);
    }
}
