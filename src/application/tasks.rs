use crate::config::PollConfig;
use crate::domain::ports::{JobQueueArc, TaskStoreArc};
use crate::domain::task::{JobId, RequestContext, Task};
use crate::error::Result;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Synchronous-looking API over the async job queue.
///
/// A launched job is coordinated through a persisted [`Task`] record keyed
/// by the job id; `wait_and_get_job` lets a caller block until the worker
/// reports the job complete. All polling knobs come from [`PollConfig`].
pub struct TaskRunner {
    queue: JobQueueArc,
    tasks: TaskStoreArc,
    config: PollConfig,
}

impl TaskRunner {
    pub fn new(queue: JobQueueArc, tasks: TaskStoreArc, config: PollConfig) -> Self {
        Self {
            queue,
            tasks,
            config,
        }
    }

    /// Enqueues a job by name and stores the coordinating task record.
    pub async fn launch_task(
        &self,
        ctx: &RequestContext,
        job_name: &str,
        description: &str,
        payload: Value,
    ) -> Result<Task> {
        let id = self.queue.enqueue(job_name, payload).await?;
        let task = Task::new(id, job_name, description, ctx);
        self.tasks.store(task.clone()).await?;
        debug!(job = job_name, id, "launched background job");
        Ok(task)
    }

    /// Polls the job's progress until it reaches 100, then returns the job
    /// result. Returns `None` when the poll budget runs out, when the job
    /// is unknown, or when the job store is unreachable.
    ///
    /// `force_return` keeps retrying the result fetch after progress
    /// reports complete, covering the worker-side race between the result
    /// write and the progress-flag write.
    pub async fn wait_and_get_job(
        &self,
        task: &Task,
        loops: Option<u32>,
        force_return: bool,
    ) -> Option<Value> {
        let interval = Duration::from_millis(self.config.interval_ms);
        let loops = loops.unwrap_or(self.config.max_loops);

        let mut complete = false;
        for _ in 0..loops {
            match self.queue.progress(task.id).await {
                Ok(Some(progress)) if progress >= 100 => {
                    complete = true;
                    break;
                }
                Ok(Some(_)) => {}
                Ok(None) => {
                    warn!(id = task.id, "job not found in queue");
                    return None;
                }
                Err(e) => {
                    warn!(id = task.id, error = %e, "job store unreachable");
                    return None;
                }
            }
            tokio::time::sleep(interval).await;
        }
        if !complete {
            warn!(id = task.id, loops, "timed out waiting for job");
            return None;
        }

        let mut retries = if force_return {
            self.config.result_retries
        } else {
            0
        };
        loop {
            match self.queue.result(task.id).await {
                Ok(Some(result)) => return Some(result),
                Ok(None) if retries > 0 => {
                    retries -= 1;
                    tokio::time::sleep(interval).await;
                }
                Ok(None) => return None,
                Err(e) => {
                    warn!(id = task.id, error = %e, "job finished without a result");
                    return None;
                }
            }
        }
    }
}

/// Worker-side helper: persists a task-progress update, retrying up to the
/// configured cap. After the cap the update is logged and dropped rather
/// than crashing the worker; the task record simply stays stale.
pub async fn set_task_progress(tasks: &TaskStoreArc, id: JobId, progress: u8, config: &PollConfig) {
    let current = match tasks.get(id).await {
        Ok(Some(task)) => task,
        Ok(None) => {
            debug!(id, "no task record to update");
            return;
        }
        Err(e) => {
            warn!(id, error = %e, "could not load task record");
            return;
        }
    };
    let updated = current.with_progress(progress);

    for attempt in 1..=config.progress_retry_limit {
        match tasks.store(updated.clone()).await {
            Ok(()) => return,
            Err(e) => {
                if attempt == config.progress_retry_limit {
                    warn!(id, error = %e, attempts = attempt, "dropping progress update");
                } else {
                    tokio::time::sleep(Duration::from_millis(config.interval_ms)).await;
                }
            }
        }
    }
}
