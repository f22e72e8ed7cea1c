use crate::domain::placement::Placement;
use crate::domain::ports::{PlacementStore, TaskStore};
use crate::domain::task::{JobId, Task};
use crate::error::{PlanError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Column Family for placement rows.
pub const CF_PLACEMENTS: &str = "placements";
/// Column Family for task records.
pub const CF_TASKS: &str = "tasks";

/// A persistent store implementation using RocksDB.
///
/// Placements and task records live in separate Column Families with
/// JSON-serialized values. A partner's placement set is replaced through a
/// single `WriteBatch`, so a crash mid-generation never leaves a partial
/// generation visible.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    next_placement_id: Arc<AtomicU64>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path and seeds
    /// the placement id counter from the highest persisted id.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_placements = ColumnFamilyDescriptor::new(CF_PLACEMENTS, Options::default());
        let cf_tasks = ColumnFamilyDescriptor::new(CF_TASKS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_placements, cf_tasks])?;

        let mut max_id = 0u64;
        if let Some(cf) = db.cf_handle(CF_PLACEMENTS) {
            for item in db.iterator_cf(cf, IteratorMode::Start) {
                let (key, _value) = item?;
                if key.len() == 8 {
                    let id = u64::from_be_bytes(key.as_ref().try_into().unwrap_or([0u8; 8]));
                    max_id = max_id.max(id);
                }
            }
        }

        Ok(Self {
            db: Arc::new(db),
            next_placement_id: Arc::new(AtomicU64::new(max_id)),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            PlanError::Internal(Box::new(std::io::Error::other(format!(
                "{} column family not found",
                name
            ))))
        })
    }
}

#[async_trait]
impl PlacementStore for RocksDBStore {
    async fn get(&self, id: u64) -> Result<Option<Placement>> {
        let cf = self.cf(CF_PLACEMENTS)?;
        match self.db.get_cf(cf, id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn for_partner(&self, partner_id: u64) -> Result<Vec<Placement>> {
        let cf = self.cf(CF_PLACEMENTS)?;
        let mut placements = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            let placement: Placement = serde_json::from_slice(&value)?;
            if placement.partner_id == partner_id {
                placements.push(placement);
            }
        }
        placements.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(placements)
    }

    async fn replace_for_partner(
        &self,
        partner_id: u64,
        placements: Vec<Placement>,
    ) -> Result<()> {
        let existing = self.for_partner(partner_id).await?;
        let cf = self.cf(CF_PLACEMENTS)?;
        let mut batch = WriteBatch::default();
        for stale in existing {
            batch.delete_cf(cf, stale.id.to_be_bytes());
        }
        for placement in placements {
            let value = serde_json::to_vec(&placement)?;
            batch.put_cf(cf, placement.id.to_be_bytes(), value);
        }
        self.db.write(batch)?;
        Ok(())
    }

    async fn next_id(&self) -> Result<u64> {
        Ok(self.next_placement_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl TaskStore for RocksDBStore {
    async fn store(&self, task: Task) -> Result<()> {
        let cf = self.cf(CF_TASKS)?;
        let value = serde_json::to_vec(&task)?;
        self.db.put_cf(cf, task.id.to_be_bytes(), value)?;
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Option<Task>> {
        let cf = self.cf(CF_TASKS)?;
        match self.db.get_cf(cf, id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}
