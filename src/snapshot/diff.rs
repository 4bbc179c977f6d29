//! Schema Diff Engine
//!
//! Computes the ordered list of [`Action`]s that turns one [`SchemaState`]
//! into another. The reverse script is never derived from the forward one:
//! it is the same function called with its arguments swapped, so
//! `diff(to, from)` undoes `diff(from, to)` action for action.
//!
//! Ordering policy:
//! 1. `CreateTable` for new tables, referenced tables first, otherwise by name
//! 2. `DropTable` for removed tables, referencing tables first, otherwise by name
//! 3. per common table (by name): added, removed, then changed columns, each
//!    group by column name; then removed indexes before added ones, by name
//!
//! An index whose columns or uniqueness changed is emitted as remove + add
//! under the same name. Index identity is the name alone, so a pure column
//! reordering costs two actions rather than needing an "alter index" kind.

use crate::error::SchemaError;
use crate::snapshot::action::Action;
use crate::snapshot::model::{SchemaState, TableSpec};
use std::collections::{BTreeMap, BTreeSet};

/// Which side of a foreign key has to come first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DependencyOrder {
    /// Referenced tables first (creation)
    ReferencedFirst,
    /// Referencing tables first (removal)
    ReferencingFirst,
}

/// The diff engine that compares schema states
pub struct DiffEngine;

impl DiffEngine {
    /// Compare two schema states and return the actions from `from` to `to`
    pub fn diff(from: &SchemaState, to: &SchemaState) -> Result<Vec<Action>, SchemaError> {
        from.validate()?;
        to.validate()?;

        let mut actions = Vec::new();
        Self::diff_tables(&from.tables, &to.tables, &mut actions);
        Ok(actions)
    }

    fn diff_tables(
        from_tables: &BTreeMap<String, TableSpec>,
        to_tables: &BTreeMap<String, TableSpec>,
        actions: &mut Vec<Action>,
    ) {
        // Created tables
        let created: BTreeMap<&str, &TableSpec> = to_tables
            .iter()
            .filter(|(name, _)| !from_tables.contains_key(*name))
            .map(|(name, table)| (name.as_str(), table))
            .collect();

        for name in Self::dependency_order(&created, DependencyOrder::ReferencedFirst) {
            if let Some(table) = created.get(name) {
                actions.push(Action::CreateTable {
                    table: (*table).clone(),
                });
            }
        }

        // Dropped tables
        let dropped: BTreeMap<&str, &TableSpec> = from_tables
            .iter()
            .filter(|(name, _)| !to_tables.contains_key(*name))
            .map(|(name, table)| (name.as_str(), table))
            .collect();

        for name in Self::dependency_order(&dropped, DependencyOrder::ReferencingFirst) {
            actions.push(Action::DropTable {
                table_name: name.to_string(),
            });
        }

        // Altered tables
        for (name, from_table) in from_tables {
            let Some(to_table) = to_tables.get(name) else {
                continue;
            };
            if from_table == to_table {
                continue;
            }
            Self::diff_columns(from_table, to_table, actions);
            Self::diff_indexes(from_table, to_table, actions);
        }
    }

    fn diff_columns(from_table: &TableSpec, to_table: &TableSpec, actions: &mut Vec<Action>) {
        let table_name = &to_table.name;

        for (column_name, column) in &to_table.columns {
            if !from_table.columns.contains_key(column_name) {
                actions.push(Action::AddColumn {
                    table_name: table_name.clone(),
                    column: column.clone(),
                });
            }
        }

        for column_name in from_table.columns.keys() {
            if !to_table.columns.contains_key(column_name) {
                actions.push(Action::RemoveColumn {
                    table_name: table_name.clone(),
                    column_name: column_name.clone(),
                });
            }
        }

        // Whole new spec, never a partial patch
        for (column_name, to_column) in &to_table.columns {
            if let Some(from_column) = from_table.columns.get(column_name) {
                if from_column != to_column {
                    actions.push(Action::ChangeColumn {
                        table_name: table_name.clone(),
                        column_name: column_name.clone(),
                        column: to_column.clone(),
                    });
                }
            }
        }
    }

    fn diff_indexes(from_table: &TableSpec, to_table: &TableSpec, actions: &mut Vec<Action>) {
        let table_name = &to_table.name;

        // Removed or changed: drop the old definition first
        for (index_name, from_index) in &from_table.indexes {
            if to_table.indexes.get(index_name) != Some(from_index) {
                actions.push(Action::RemoveIndex {
                    table_name: table_name.clone(),
                    index_name: index_name.clone(),
                });
            }
        }

        // Added or changed
        for (index_name, to_index) in &to_table.indexes {
            if from_table.indexes.get(index_name) != Some(to_index) {
                actions.push(Action::AddIndex {
                    table_name: table_name.clone(),
                    index: to_index.clone(),
                });
            }
        }
    }

    /// Order a set of tables so foreign keys between them are respected.
    ///
    /// Among tables that are free to go next the smallest name wins. When
    /// only a cycle remains, the smallest remaining name goes regardless.
    fn dependency_order<'a>(
        tables: &BTreeMap<&'a str, &'a TableSpec>,
        order: DependencyOrder,
    ) -> Vec<&'a str> {
        // table -> tables in this set it references
        let mut references: BTreeMap<&'a str, BTreeSet<&'a str>> = BTreeMap::new();
        for (&name, &table) in tables {
            let targets = table
                .referenced_tables()
                .into_iter()
                .filter(|target| tables.contains_key(target))
                .collect();
            references.insert(name, targets);
        }

        let blockers = match order {
            DependencyOrder::ReferencedFirst => references,
            DependencyOrder::ReferencingFirst => {
                let mut referenced_by: BTreeMap<&'a str, BTreeSet<&'a str>> =
                    tables.keys().map(|&name| (name, BTreeSet::new())).collect();
                for (name, targets) in &references {
                    for target in targets {
                        referenced_by.entry(*target).or_default().insert(*name);
                    }
                }
                referenced_by
            }
        };

        let mut remaining: BTreeSet<&'a str> = tables.keys().copied().collect();
        let mut placed: BTreeSet<&'a str> = BTreeSet::new();
        let mut ordered = Vec::with_capacity(remaining.len());

        loop {
            let Some(fallback) = remaining.first().copied() else {
                break;
            };
            let next = remaining
                .iter()
                .copied()
                .find(|name| {
                    blockers
                        .get(name)
                        .map_or(true, |deps| deps.iter().all(|dep| placed.contains(dep)))
                })
                .unwrap_or(fallback);

            remaining.remove(next);
            placed.insert(next);
            ordered.push(next);
        }

        ordered
    }
}
