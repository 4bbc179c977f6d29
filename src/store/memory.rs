//! In-memory state store

use super::{MigrationRecord, StateStore};
use crate::error::MigrateResult;
use crate::snapshot::SchemaState;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// State store kept in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    /// Revision -> record
    records: Arc<RwLock<BTreeMap<u64, MigrationRecord>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with an already recorded state
    pub fn with_state(name: impl Into<String>, state: SchemaState) -> Self {
        let record = MigrationRecord::new(name, state);
        let mut records = BTreeMap::new();
        records.insert(record.revision, record);
        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }

    /// All records in revision order
    pub async fn records(&self) -> Vec<MigrationRecord> {
        self.records.read().await.values().cloned().collect()
    }
}

impl StateStore for MemoryStateStore {
    async fn load_last(&self) -> MigrateResult<Option<SchemaState>> {
        let records = self.records.read().await;
        Ok(records.values().next_back().map(|r| r.state.clone()))
    }

    async fn record(&self, record: MigrationRecord) -> MigrateResult<()> {
        debug!("Recording revision {} ({})", record.revision, record.name);
        self.records.write().await.insert(record.revision, record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{ColumnSpec, DataType, TableSpec};
    use tokio_test::block_on;

    #[test]
    fn test_empty_store_has_no_state() {
        let store = MemoryStateStore::new();
        assert!(block_on(store.load_last()).unwrap().is_none());
    }

    #[test]
    fn test_load_last_returns_highest_revision() {
        let store = MemoryStateStore::new();
        let first = SchemaState::empty().next(Default::default());
        let second = first.next(Default::default()).with_table(
            TableSpec::new("users").with_column(ColumnSpec::new("id", DataType::Integer)),
        );

        block_on(store.record(MigrationRecord::new("second", second.clone()))).unwrap();
        block_on(store.record(MigrationRecord::new("first", first))).unwrap();

        assert_eq!(block_on(store.load_last()).unwrap(), Some(second));
    }

    #[test]
    fn test_record_upserts_by_revision() {
        let state = SchemaState::empty().next(Default::default());
        let store = MemoryStateStore::with_state("draft", state.clone());
        block_on(store.record(MigrationRecord::new("final", state))).unwrap();

        let records = block_on(store.records());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "final");
    }
}
