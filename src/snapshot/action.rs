//! Structural migration actions
//!
//! One [`Action`] is one atomic schema change. Actions carry everything
//! needed to render them, so the generator never consults either snapshot.

use crate::snapshot::model::{ColumnSpec, IndexSpec, TableSpec};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of an action, without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    CreateTable,
    DropTable,
    AddColumn,
    RemoveColumn,
    ChangeColumn,
    AddIndex,
    RemoveIndex,
}

impl ActionKind {
    /// Kind that undoes this one in the reverse diff
    pub fn inverse(self) -> Self {
        match self {
            ActionKind::CreateTable => ActionKind::DropTable,
            ActionKind::DropTable => ActionKind::CreateTable,
            ActionKind::AddColumn => ActionKind::RemoveColumn,
            ActionKind::RemoveColumn => ActionKind::AddColumn,
            ActionKind::ChangeColumn => ActionKind::ChangeColumn,
            ActionKind::AddIndex => ActionKind::RemoveIndex,
            ActionKind::RemoveIndex => ActionKind::AddIndex,
        }
    }

    /// Operation name understood by query-interface style executors
    pub fn op_name(self) -> &'static str {
        match self {
            ActionKind::CreateTable => "createTable",
            ActionKind::DropTable => "dropTable",
            ActionKind::AddColumn => "addColumn",
            ActionKind::RemoveColumn => "removeColumn",
            ActionKind::ChangeColumn => "changeColumn",
            ActionKind::AddIndex => "addIndex",
            ActionKind::RemoveIndex => "removeIndex",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.op_name())
    }
}

/// One atomic structural change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", rename_all_fields = "camelCase", tag = "type")]
pub enum Action {
    /// Create a table with all its columns and indexes
    CreateTable { table: TableSpec },
    /// Drop an existing table
    DropTable { table_name: String },
    /// Add a column to an existing table
    AddColumn {
        table_name: String,
        column: ColumnSpec,
    },
    /// Drop a column
    RemoveColumn {
        table_name: String,
        column_name: String,
    },
    /// Replace a column definition; `column` is always the complete new spec
    ChangeColumn {
        table_name: String,
        column_name: String,
        column: ColumnSpec,
    },
    /// Create an index
    AddIndex { table_name: String, index: IndexSpec },
    /// Drop an index
    RemoveIndex {
        table_name: String,
        index_name: String,
    },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::CreateTable { .. } => ActionKind::CreateTable,
            Action::DropTable { .. } => ActionKind::DropTable,
            Action::AddColumn { .. } => ActionKind::AddColumn,
            Action::RemoveColumn { .. } => ActionKind::RemoveColumn,
            Action::ChangeColumn { .. } => ActionKind::ChangeColumn,
            Action::AddIndex { .. } => ActionKind::AddIndex,
            Action::RemoveIndex { .. } => ActionKind::RemoveIndex,
        }
    }

    /// Table the action applies to
    pub fn table_name(&self) -> &str {
        match self {
            Action::CreateTable { table } => &table.name,
            Action::DropTable { table_name }
            | Action::AddColumn { table_name, .. }
            | Action::RemoveColumn { table_name, .. }
            | Action::ChangeColumn { table_name, .. }
            | Action::AddIndex { table_name, .. }
            | Action::RemoveIndex { table_name, .. } => table_name,
        }
    }

    /// Name of the object the action touches: the table, column or index
    pub fn object_name(&self) -> &str {
        match self {
            Action::CreateTable { table } => &table.name,
            Action::DropTable { table_name } => table_name,
            Action::AddColumn { column, .. } => &column.name,
            Action::RemoveColumn { column_name, .. } | Action::ChangeColumn { column_name, .. } => {
                column_name
            }
            Action::AddIndex { index, .. } => &index.name,
            Action::RemoveIndex { index_name, .. } => index_name,
        }
    }

    /// Human-readable one-line summary
    pub fn description(&self) -> String {
        match self {
            Action::CreateTable { table } => {
                let deps = table.referenced_tables();
                if deps.is_empty() {
                    format!("create table {}", table.name)
                } else {
                    format!(
                        "create table {} (references {})",
                        table.name,
                        deps.into_iter().collect::<Vec<_>>().join(", ")
                    )
                }
            }
            Action::DropTable { table_name } => format!("drop table {}", table_name),
            Action::AddColumn { table_name, column } => {
                format!("add column {} to table {}", column.name, table_name)
            }
            Action::RemoveColumn { table_name, column_name } => {
                format!("remove column {} from table {}", column_name, table_name)
            }
            Action::ChangeColumn { table_name, column_name, .. } => {
                format!("change column {} on table {}", column_name, table_name)
            }
            Action::AddIndex { table_name, index } => format!(
                "add {}index {} to table {}",
                if index.unique { "unique " } else { "" },
                index.name,
                table_name
            ),
            Action::RemoveIndex { table_name, index_name } => {
                format!("remove index {} from table {}", index_name, table_name)
            }
        }
    }

    /// Check if this is a destructive change
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            Action::DropTable { .. } | Action::RemoveColumn { .. } | Action::RemoveIndex { .. }
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}
