//! Schema Snapshot Module
//!
//! The heart of SchemaFlow - detecting what changed between two schema states.
//! This module provides:
//! - Schema snapshots (revision-stamped tables, columns, indexes)
//! - Type canonicalization (equivalent spellings compare equal)
//! - Migration actions (one atomic structural change each)
//! - Schema diff engine (ordered, invertible action lists)

pub mod action;
pub mod diff;
pub mod model;
pub mod types;

pub use action::{Action, ActionKind};
pub use diff::DiffEngine;
pub use model::{
    ColumnSpec, DefaultValue, ForeignKeyRef, IndexSpec, ReferentialAction, SchemaState, TableSpec,
};
pub use types::{DataType, TypeCanonicalizer};
