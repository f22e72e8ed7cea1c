use crate::domain::history::HistoryRecord;
use crate::domain::placement::Placement;
use crate::domain::plan::PlaceColumn;
use crate::domain::rule::PlanRule;
use crate::domain::task::{JobId, Task};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

#[async_trait]
pub trait PlacementStore: Send + Sync {
    async fn get(&self, id: u64) -> Result<Option<Placement>>;
    /// All placements for a partner, ordered by name.
    async fn for_partner(&self, partner_id: u64) -> Result<Vec<Placement>>;
    /// Atomically replaces the partner's placement set with the given rows.
    async fn replace_for_partner(
        &self,
        partner_id: u64,
        placements: Vec<Placement>,
    ) -> Result<()>;
    /// Allocates a fresh store-wide unique placement id.
    async fn next_id(&self) -> Result<u64>;
}

#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn store(&self, rule: PlanRule) -> Result<()>;
    /// All rules for a partner, ordered by rule id.
    async fn for_partner(&self, partner_id: u64) -> Result<Vec<PlanRule>>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn store(&self, record: HistoryRecord) -> Result<()>;
    /// The attribute value with the highest impressions for a partner name,
    /// or `None` when no history covers the column.
    async fn top_value(&self, partner_name: &str, col: PlaceColumn) -> Result<Option<String>>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn store(&self, task: Task) -> Result<()>;
    async fn get(&self, id: JobId) -> Result<Option<Task>>;
}

/// The job queue the task bridge coordinates with. The queue assigns job
/// ids at enqueue time; progress runs 0-100.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job_name: &str, payload: Value) -> Result<JobId>;
    async fn progress(&self, id: JobId) -> Result<Option<u8>>;
    async fn result(&self, id: JobId) -> Result<Option<Value>>;
}

pub type PlacementStoreBox = Box<dyn PlacementStore>;
pub type RuleStoreBox = Box<dyn RuleStore>;
pub type HistoryStoreBox = Box<dyn HistoryStore>;
pub type TaskStoreArc = Arc<dyn TaskStore>;
pub type JobQueueArc = Arc<dyn JobQueue>;

pub type PlacementStoreFactory = Box<dyn Fn() -> PlacementStoreBox + Send>;
