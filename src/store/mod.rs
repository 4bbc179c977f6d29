//! Migration history store
//!
//! The state store remembers the schema each generated migration moves to,
//! so the next run can diff against it.

mod memory;
mod postgres;

pub use memory::MemoryStateStore;
pub use postgres::PostgresStateStore;

use crate::error::MigrateResult;
use crate::snapshot::SchemaState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// One row of migration history, keyed by revision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
    pub revision: u64,
    pub name: String,
    /// Full schema as of this revision
    pub state: SchemaState,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

impl MigrationRecord {
    pub fn new(name: impl Into<String>, state: SchemaState) -> Self {
        Self {
            revision: state.revision,
            name: name.into(),
            checksum: state.checksum(),
            state,
            created_at: Utc::now(),
        }
    }
}

/// Persistence boundary for recorded schema states
pub trait StateStore {
    /// Most recently recorded state, or `None` before the first migration
    fn load_last(&self) -> impl Future<Output = MigrateResult<Option<SchemaState>>> + Send;

    /// Insert or replace the record for `record.revision`
    fn record(&self, record: MigrationRecord) -> impl Future<Output = MigrateResult<()>> + Send;
}
