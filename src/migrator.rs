//! Migration pipeline
//!
//! One linear run: check the output directory, load the last recorded state,
//! extract the current tables, diff both ways, render, then write the
//! artifact and record the new state. The caller decides what to do with the
//! outcome; nothing here exits the process or prints.

use crate::config::MigrateOptions;
use crate::error::MigrateResult;
use crate::extract::SnapshotExtractor;
use crate::migration::{MigrationScript, ScriptGenerator};
use crate::snapshot::{DiffEngine, SchemaState};
use crate::store::{MigrationRecord, StateStore};
use crate::writer::FileScriptWriter;
use tracing::{debug, info, warn};

/// Result of one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationOutcome {
    /// Declared models match the last recorded state
    NoChanges { revision: u64 },
    /// Preview mode: rendered but nothing written
    Preview { revision: u64, script: MigrationScript },
    Saved {
        filename: String,
        revision: u64,
        /// False when the artifact was written but the history upsert failed
        history_recorded: bool,
    },
}

pub struct Migrator<E, S> {
    extractor: E,
    store: S,
    options: MigrateOptions,
}

impl<E, S> Migrator<E, S>
where
    E: SnapshotExtractor,
    S: StateStore,
{
    pub fn new(extractor: E, store: S, options: MigrateOptions) -> Self {
        Self {
            extractor,
            store,
            options,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &MigrateOptions {
        &self.options
    }

    /// Generate the migration from the last recorded state to the declared models
    pub async fn make_migration(&self) -> MigrateResult<MigrationOutcome> {
        FileScriptWriter::check_out_dir(&self.options.out_dir).await?;

        let previous = self
            .store
            .load_last()
            .await?
            .unwrap_or_else(SchemaState::empty);
        debug!("Previous revision: {}", previous.revision);

        let tables = self.extractor.extract().await?;
        let current = previous.next(tables);

        let up = DiffEngine::diff(&previous, &current)?;
        if up.is_empty() {
            info!("No changes found");
            return Ok(MigrationOutcome::NoChanges {
                revision: previous.revision,
            });
        }
        let down = DiffEngine::diff(&current, &previous)?;
        let script = ScriptGenerator::from_actions(&up, &down);

        for line in script.console_out() {
            info!("[Actions] {}", line);
        }
        let destructive = up.iter().filter(|a| a.is_destructive()).count();
        if destructive > 0 {
            warn!("{} action(s) remove existing tables, columns or indexes; dropped data is not restored by the down script", destructive);
        }

        if self.options.preview {
            return Ok(MigrationOutcome::Preview {
                revision: current.revision,
                script,
            });
        }

        let written = FileScriptWriter::write(current.revision, &script, &self.options).await?;

        let record = MigrationRecord::new(&self.options.name, current);
        let history_recorded = match self.store.record(record).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Migration file {} was written but revision {} was not recorded: {}",
                    written.filename, written.revision, e
                );
                false
            }
        };

        Ok(MigrationOutcome::Saved {
            filename: written.filename,
            revision: written.revision,
            history_recorded,
        })
    }
}
