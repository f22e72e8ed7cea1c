use crate::domain::history::HistoryRecord;
use crate::domain::placement::Placement;
use crate::domain::plan::PlaceColumn;
use crate::domain::ports::{HistoryStore, PlacementStore, RuleStore, TaskStore};
use crate::domain::rule::PlanRule;
use crate::domain::task::{JobId, Task};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// A thread-safe in-memory placement store.
///
/// Uses `Arc<RwLock<HashMap>>` for shared concurrent access. The whole
/// partner placement set is swapped under a single write lock, so readers
/// never observe a half-replaced generation.
#[derive(Default, Clone)]
pub struct InMemoryPlacementStore {
    rows: Arc<RwLock<HashMap<u64, Placement>>>,
    next: Arc<AtomicU64>,
}

impl InMemoryPlacementStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlacementStore for InMemoryPlacementStore {
    async fn get(&self, id: u64) -> Result<Option<Placement>> {
        let rows = self.rows.read().await;
        Ok(rows.get(&id).cloned())
    }

    async fn for_partner(&self, partner_id: u64) -> Result<Vec<Placement>> {
        let rows = self.rows.read().await;
        let mut placements: Vec<Placement> = rows
            .values()
            .filter(|p| p.partner_id == partner_id)
            .cloned()
            .collect();
        placements.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(placements)
    }

    async fn replace_for_partner(
        &self,
        partner_id: u64,
        placements: Vec<Placement>,
    ) -> Result<()> {
        let mut rows = self.rows.write().await;
        rows.retain(|_, p| p.partner_id != partner_id);
        for placement in placements {
            rows.insert(placement.id, placement);
        }
        Ok(())
    }

    async fn next_id(&self) -> Result<u64> {
        Ok(self.next.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// A thread-safe in-memory store for plan rules.
#[derive(Default, Clone)]
pub struct InMemoryRuleStore {
    rules: Arc<RwLock<HashMap<u64, PlanRule>>>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn store(&self, rule: PlanRule) -> Result<()> {
        let mut rules = self.rules.write().await;
        rules.insert(rule.id, rule);
        Ok(())
    }

    async fn for_partner(&self, partner_id: u64) -> Result<Vec<PlanRule>> {
        let rules = self.rules.read().await;
        let mut matching: Vec<PlanRule> = rules
            .values()
            .filter(|r| r.partner_id == partner_id)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.id);
        Ok(matching)
    }
}

/// A thread-safe in-memory store for task records.
#[derive(Default, Clone)]
pub struct InMemoryTaskStore {
    tasks: Arc<RwLock<HashMap<JobId, Task>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn store(&self, task: Task) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        tasks.insert(task.id, task);
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Option<Task>> {
        let tasks = self.tasks.read().await;
        Ok(tasks.get(&id).cloned())
    }
}

/// In-memory historical delivery reporting, loaded from a CSV export.
#[derive(Default, Clone)]
pub struct InMemoryHistoryStore {
    rows: Arc<RwLock<Vec<HistoryRecord>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn store(&self, record: HistoryRecord) -> Result<()> {
        let mut rows = self.rows.write().await;
        rows.push(record);
        Ok(())
    }

    async fn top_value(&self, partner_name: &str, col: PlaceColumn) -> Result<Option<String>> {
        let rows = self.rows.read().await;
        let mut best: Option<&HistoryRecord> = None;
        for record in rows
            .iter()
            .filter(|r| r.partner == partner_name && r.place_col == col)
        {
            // Ties break toward the lexicographically smaller value so
            // inference stays deterministic across runs.
            let better = match best {
                None => true,
                Some(current) => {
                    record.impressions > current.impressions
                        || (record.impressions == current.impressions
                            && record.value < current.value)
                }
            };
            if better {
                best = Some(record);
            }
        }
        Ok(best.map(|r| r.value.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Budget;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn placement(id: u64, partner_id: u64, name: &str) -> Placement {
        Placement {
            id,
            partner_id,
            name: name.to_string(),
            values: BTreeMap::new(),
            total_budget: Budget::new(dec!(100.0)),
            cpm: dec!(5.0),
            cpc: dec!(0.25),
        }
    }

    #[tokio::test]
    async fn test_placement_store_round_trip() {
        let store = InMemoryPlacementStore::new();
        store
            .replace_for_partner(1, vec![placement(1, 1, "a"), placement(2, 1, "b")])
            .await
            .unwrap();

        let retrieved = store.get(1).await.unwrap().unwrap();
        assert_eq!(retrieved.name, "a");
        assert!(store.get(99).await.unwrap().is_none());

        let all = store.for_partner(1).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "a");
    }

    #[tokio::test]
    async fn test_replace_drops_stale_rows() {
        let store = InMemoryPlacementStore::new();
        store
            .replace_for_partner(1, vec![placement(1, 1, "old_a"), placement(2, 1, "old_b")])
            .await
            .unwrap();
        store
            .replace_for_partner(1, vec![placement(3, 1, "new")])
            .await
            .unwrap();

        let all = store.for_partner(1).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "new");
    }

    #[tokio::test]
    async fn test_replace_leaves_other_partners_alone() {
        let store = InMemoryPlacementStore::new();
        store
            .replace_for_partner(1, vec![placement(1, 1, "mine")])
            .await
            .unwrap();
        store
            .replace_for_partner(2, vec![placement(2, 2, "theirs")])
            .await
            .unwrap();

        assert_eq!(store.for_partner(1).await.unwrap().len(), 1);
        assert_eq!(store.for_partner(2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_next_id_is_monotonic() {
        let store = InMemoryPlacementStore::new();
        let first = store.next_id().await.unwrap();
        let second = store.next_id().await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn test_history_top_value_prefers_impressions() {
        let store = InMemoryHistoryStore::new();
        for (value, impressions) in [("US", 120000u64), ("CA", 40000), ("GB", 120000)] {
            store
                .store(HistoryRecord {
                    partner: "Acme".to_string(),
                    place_col: PlaceColumn::Country,
                    value: value.to_string(),
                    impressions,
                })
                .await
                .unwrap();
        }

        // GB ties US on impressions; the lexicographically smaller wins.
        let top = store
            .top_value("Acme", PlaceColumn::Country)
            .await
            .unwrap();
        assert_eq!(top, Some("GB".to_string()));

        assert_eq!(
            store
                .top_value("Acme", PlaceColumn::Creative)
                .await
                .unwrap(),
            None
        );
        assert_eq!(
            store
                .top_value("Other", PlaceColumn::Country)
                .await
                .unwrap(),
            None
        );
    }
}
