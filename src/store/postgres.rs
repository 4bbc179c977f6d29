//! PostgreSQL state store
//!
//! Keeps one row per revision with the full schema as JSONB. The history
//! table is created the first time the store is used.

use super::{MigrationRecord, StateStore};
use crate::error::{MigrateError, MigrateResult};
use crate::snapshot::SchemaState;
use deadpool_postgres::Pool;
use tokio::sync::OnceCell;
use tracing::{debug, info};

pub struct PostgresStateStore {
    pool: Pool,
    table: String,
    ready: OnceCell<()>,
}

impl PostgresStateStore {
    /// `table` must be a plain identifier; it is quoted into every query
    pub fn new(pool: Pool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
            ready: OnceCell::new(),
        }
    }

    fn quoted_table(&self) -> String {
        format!("\"{}\"", self.table.replace('"', "\"\""))
    }

    async fn ensure_table(&self) -> MigrateResult<()> {
        self.ready
            .get_or_try_init(|| async move {
                let client = self.pool.get().await?;
                client
                    .batch_execute(&format!(
                        "CREATE TABLE IF NOT EXISTS {} (
                            revision BIGINT PRIMARY KEY,
                            name VARCHAR(255) NOT NULL,
                            state JSONB NOT NULL,
                            checksum VARCHAR(64) NOT NULL,
                            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                        )",
                        self.quoted_table()
                    ))
                    .await?;
                debug!("History table {} ready", self.table);
                Ok::<(), MigrateError>(())
            })
            .await?;
        Ok(())
    }
}

impl StateStore for PostgresStateStore {
    async fn load_last(&self) -> MigrateResult<Option<SchemaState>> {
        self.ensure_table().await?;
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    "SELECT revision, state FROM {} ORDER BY revision DESC LIMIT 1",
                    self.quoted_table()
                ),
                &[],
            )
            .await?;

        let Some(row) = row else {
            debug!("No migration history in {}", self.table);
            return Ok(None);
        };

        let revision: i64 = row.get("revision");
        let value: serde_json::Value = row.get("state");
        let mut state: SchemaState = serde_json::from_value(value)?;
        state.revision = u64::try_from(revision).map_err(|_| {
            MigrateError::StateStore(format!("Negative revision {} in {}", revision, self.table))
        })?;
        debug!("Loaded revision {} from {}", state.revision, self.table);
        Ok(Some(state))
    }

    async fn record(&self, record: MigrationRecord) -> MigrateResult<()> {
        self.ensure_table().await?;
        let revision = i64::try_from(record.revision).map_err(|_| {
            MigrateError::StateStore(format!("Revision {} out of range", record.revision))
        })?;
        let state = serde_json::to_value(&record.state)?;

        let client = self.pool.get().await?;
        client
            .execute(
                &format!(
                    "INSERT INTO {} (revision, name, state, checksum, created_at)
                     VALUES ($1, $2, $3, $4, $5)
                     ON CONFLICT (revision) DO UPDATE SET
                        name = EXCLUDED.name,
                        state = EXCLUDED.state,
                        checksum = EXCLUDED.checksum,
                        created_at = EXCLUDED.created_at",
                    self.quoted_table()
                ),
                &[&revision, &record.name, &state, &record.checksum, &record.created_at],
            )
            .await?;

        info!("Recorded revision {} ({}) in {}", record.revision, record.name, self.table);
        Ok(())
    }
}
