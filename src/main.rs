//! SchemaFlow Migrate
//!
//! Generates the next migration from the declared models. Configuration comes
//! from the environment (see `Settings`); the history lives in PostgreSQL.

use schemaflow_migrate::config::Settings;
use schemaflow_migrate::db;
use schemaflow_migrate::extract::ModelFileExtractor;
use schemaflow_migrate::store::PostgresStateStore;
use schemaflow_migrate::{MigrateError, MigrationOutcome, Migrator};
use serde_json::json;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_tracing();

    let settings = Settings::load()?;
    info!("Configuration loaded");
    let debug = settings.migrate.debug;

    match run(settings).await {
        Ok(outcome) => {
            report(&outcome)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            if debug {
                error!("[{}] {:?}", e.code(), e);
            } else {
                error!("[{}] {}", e.code(), e);
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(settings: Settings) -> Result<MigrationOutcome, MigrateError> {
    let pool = db::create_pool(&settings.database)?;
    db::test_connection(&pool).await?;

    let store = PostgresStateStore::new(pool, settings.history_table.clone());
    let extractor = ModelFileExtractor::new(settings.models_path.clone());
    let migrator = Migrator::new(extractor, store, settings.migrate);

    migrator.make_migration().await
}

fn report(outcome: &MigrationOutcome) -> anyhow::Result<()> {
    match outcome {
        MigrationOutcome::NoChanges { revision } => {
            info!("No changes found, schema is at revision {}", revision);
        }
        MigrationOutcome::Preview { revision, script } => {
            let preview = json!({
                "revision": revision,
                "commandsUp": script.commands_up(),
                "commandsDown": script.commands_down(),
            });
            println!("{}", serde_json::to_string_pretty(&preview)?);
        }
        MigrationOutcome::Saved {
            filename,
            revision,
            history_recorded,
        } => {
            info!("Revision {} saved to {}", revision, filename);
            if !history_recorded {
                warn!("Migration history was not updated; the next run will diff against the previous revision");
            }
        }
    }
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,schemaflow_migrate=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}
