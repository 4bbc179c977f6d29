//! SchemaFlow Migrate - reversible schema migration generator
//!
//! Compares the declared models against the last recorded schema state and
//! produces an ordered, invertible migration script:
//! - `snapshot`: schema states, type canonicalization, actions, diff engine
//! - `migration`: command rendering, PostgreSQL DDL, the migration script
//! - `extract`, `store`, `writer`: collaborators at the I/O boundary
//! - `migrator`: the pipeline tying them together

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod migration;
pub mod migrator;
pub mod snapshot;
pub mod store;
pub mod writer;

pub use config::{MigrateOptions, Settings};
pub use error::{MigrateError, MigrateResult, SchemaError};
pub use migration::{Command, MigrationScript, ScriptGenerator};
pub use migrator::{MigrationOutcome, Migrator};
pub use snapshot::{Action, DiffEngine, SchemaState};
