//! Migration module
//!
//! Turns diff actions into commands, SQL and the bundled migration script.

mod generator;
mod sql;

pub use generator::{Command, MigrationScript, RenderedActions, ScriptGenerator};
pub use sql::PostgresDdl;
