use serde::{Deserialize, Serialize};

/// Identifier assigned by the job queue at enqueue time. Doubles as the
/// primary key of the persisted [`Task`] record.
pub type JobId = u64;

/// Explicit request context threaded through task launches, in place of
/// ambient request-scoped globals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    pub user: String,
    pub plan_id: u64,
}

/// Persisted coordination record for one background job: the point of
/// contact between the caller that launched the job and the worker
/// executing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: JobId,
    pub name: String,
    pub description: String,
    pub user: String,
    pub plan_id: u64,
    pub progress: u8,
    pub complete: bool,
}

impl Task {
    pub fn new(id: JobId, name: &str, description: &str, ctx: &RequestContext) -> Self {
        Self {
            id,
            name: name.to_string(),
            description: description.to_string(),
            user: ctx.user.clone(),
            plan_id: ctx.plan_id,
            progress: 0,
            complete: false,
        }
    }

    pub fn with_progress(&self, progress: u8) -> Self {
        let progress = progress.min(100);
        Self {
            progress,
            complete: progress >= 100,
            ..self.clone()
        }
    }
}
