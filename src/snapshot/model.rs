//! Schema snapshot model
//!
//! Point-in-time description of tables, columns and indexes. Every map is a
//! `BTreeMap`, so iteration is lexicographic by name: two runs over equal
//! snapshots walk them in the same order and produce byte-identical scripts.

use crate::error::SchemaError;
use crate::snapshot::types::DataType;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Referential action of a foreign key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferentialAction {
    #[serde(rename = "CASCADE", alias = "cascade")]
    Cascade,
    #[serde(rename = "RESTRICT", alias = "restrict")]
    Restrict,
    #[serde(rename = "SET NULL", alias = "set null", alias = "SET_NULL")]
    SetNull,
    #[serde(rename = "SET DEFAULT", alias = "set default", alias = "SET_DEFAULT")]
    SetDefault,
    #[serde(rename = "NO ACTION", alias = "no action", alias = "NO_ACTION")]
    NoAction,
}

impl ReferentialAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
            ReferentialAction::NoAction => "NO ACTION",
        }
    }
}

/// Foreign-key target of a column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<ReferentialAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<ReferentialAction>,
}

impl ForeignKeyRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            on_delete: None,
            on_update: None,
        }
    }

    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = Some(action);
        self
    }
}

/// Column default: a literal value or an expression evaluated by the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DefaultValue {
    /// String literal, always rendered quoted
    Literal(String),
    Number(serde_json::Number),
    Boolean(bool),
    /// Expression token, e.g. `now()`
    Expression(String),
}

impl DefaultValue {
    /// SQL text for a `DEFAULT` clause
    pub fn to_sql(&self) -> String {
        match self {
            DefaultValue::Expression(expr) => expr.clone(),
            DefaultValue::Literal(value) => format!("'{}'", value.replace('\'', "''")),
            DefaultValue::Number(n) => n.to_string(),
            DefaultValue::Boolean(b) => b.to_string(),
        }
    }
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sql())
    }
}

fn default_allow_null() -> bool {
    true
}

/// One column of one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: DataType,
    #[serde(default = "default_allow_null")]
    pub allow_null: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<DefaultValue>,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<ForeignKeyRef>,
}

impl ColumnSpec {
    /// Nullable column with no constraints
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            allow_null: true,
            default_value: None,
            primary_key: false,
            auto_increment: false,
            unique: false,
            references: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.allow_null = false;
        self
    }

    pub fn nullable(mut self, allow_null: bool) -> Self {
        self.allow_null = allow_null;
        self
    }

    /// Primary key columns are never nullable
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.allow_null = false;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, value: DefaultValue) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn references(mut self, target: ForeignKeyRef) -> Self {
        self.references = Some(target);
        self
    }
}

/// One index of one table. Column order is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSpec {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexSpec {
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Table representation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSpec {
    pub name: String,
    #[serde(default)]
    pub columns: BTreeMap<String, ColumnSpec>,
    #[serde(default)]
    pub indexes: BTreeMap<String, IndexSpec>,
}

impl TableSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: BTreeMap::new(),
            indexes: BTreeMap::new(),
        }
    }

    /// Add (or replace) a column keyed by its name
    pub fn with_column(mut self, column: ColumnSpec) -> Self {
        self.columns.insert(column.name.clone(), column);
        self
    }

    /// Add (or replace) an index keyed by its name
    pub fn with_index(mut self, index: IndexSpec) -> Self {
        self.indexes.insert(index.name.clone(), index);
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.get(name)
    }

    /// Other tables this table points at through foreign keys
    pub fn referenced_tables(&self) -> BTreeSet<&str> {
        self.columns
            .values()
            .filter_map(|c| c.references.as_ref())
            .map(|r| r.table.as_str())
            .filter(|t| *t != self.name)
            .collect()
    }

    /// Check the structural contract of this table.
    ///
    /// Foreign-key targets are deliberately not checked: they live in other
    /// tables and intermediate revisions may point at tables that do not
    /// exist yet.
    pub fn validate(&self) -> Result<(), SchemaError> {
        for (key, column) in &self.columns {
            if key != &column.name {
                return Err(SchemaError::ColumnKeyMismatch {
                    table: self.name.clone(),
                    key: key.clone(),
                    name: column.name.clone(),
                });
            }
            if column.auto_increment && !column.data_type.is_integer() {
                return Err(SchemaError::AutoIncrementNotInteger {
                    table: self.name.clone(),
                    column: column.name.clone(),
                    data_type: column.data_type.to_string(),
                });
            }
        }

        for (key, index) in &self.indexes {
            if key != &index.name {
                return Err(SchemaError::IndexKeyMismatch {
                    table: self.name.clone(),
                    key: key.clone(),
                    name: index.name.clone(),
                });
            }
            if index.columns.is_empty() {
                return Err(SchemaError::EmptyIndex {
                    table: self.name.clone(),
                    index: index.name.clone(),
                });
            }
            if let Some(missing) = index.columns.iter().find(|c| !self.columns.contains_key(*c)) {
                return Err(SchemaError::UnknownIndexColumn {
                    table: self.name.clone(),
                    index: index.name.clone(),
                    column: missing.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Whole-schema state at one revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaState {
    /// 0 means "no migrations applied"
    pub revision: u64,
    #[serde(default)]
    pub tables: BTreeMap<String, TableSpec>,
}

impl SchemaState {
    /// `{revision: 0, tables: {}}`, used when no state was ever recorded
    pub fn empty() -> Self {
        Self {
            revision: 0,
            tables: BTreeMap::new(),
        }
    }

    pub fn new(revision: u64, tables: BTreeMap<String, TableSpec>) -> Self {
        Self { revision, tables }
    }

    /// State that follows this one, carrying freshly extracted tables
    pub fn next(&self, tables: BTreeMap<String, TableSpec>) -> Self {
        Self::new(self.revision + 1, tables)
    }

    /// Add (or replace) a table keyed by its name
    pub fn with_table(mut self, table: TableSpec) -> Self {
        self.tables.insert(table.name.clone(), table);
        self
    }

    pub fn table(&self, name: &str) -> Option<&TableSpec> {
        self.tables.get(name)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        for (key, table) in &self.tables {
            if key != &table.name {
                return Err(SchemaError::TableKeyMismatch {
                    key: key.clone(),
                    name: table.name.clone(),
                });
            }
            table.validate()?;
        }
        Ok(())
    }

    /// Compute checksum from the table content (revision excluded)
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        // BTreeMap serialization is ordered, so equal states hash equally
        hasher.update(serde_json::to_vec(&self.tables).unwrap_or_default());
        format!("{:x}", hasher.finalize())
    }
}

impl Default for SchemaState {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableSpec {
        TableSpec::new("users")
            .with_column(
                ColumnSpec::new("id", DataType::Integer)
                    .primary_key()
                    .auto_increment(),
            )
            .with_column(ColumnSpec::new("email", DataType::VarChar(255)).not_null())
            .with_index(IndexSpec::new("users_email", ["email"]).unique())
    }

    #[test]
    fn test_valid_state_passes() {
        let state = SchemaState::empty().with_table(users());
        assert!(state.validate().is_ok());
    }

    #[test]
    fn test_auto_increment_requires_integer() {
        let table = users().with_column(ColumnSpec::new("code", DataType::Text).auto_increment());
        assert_eq!(
            table.validate(),
            Err(SchemaError::AutoIncrementNotInteger {
                table: "users".into(),
                column: "code".into(),
                data_type: "text".into(),
            })
        );
    }

    #[test]
    fn test_empty_and_dangling_indexes_are_rejected() {
        let empty = users().with_index(IndexSpec::new("nothing", Vec::<String>::new()));
        assert!(matches!(empty.validate(), Err(SchemaError::EmptyIndex { .. })));

        let dangling = users().with_index(IndexSpec::new("by_name", ["name"]));
        assert!(matches!(
            dangling.validate(),
            Err(SchemaError::UnknownIndexColumn { column, .. }) if column == "name"
        ));
    }

    #[test]
    fn test_key_mismatch_is_rejected() {
        let mut state = SchemaState::empty();
        state.tables.insert("people".into(), users());
        assert!(matches!(state.validate(), Err(SchemaError::TableKeyMismatch { .. })));
    }

    #[test]
    fn test_dangling_foreign_key_is_allowed() {
        let posts = TableSpec::new("posts").with_column(
            ColumnSpec::new("author_id", DataType::Integer)
                .references(ForeignKeyRef::new("authors", "id")),
        );
        assert!(SchemaState::empty().with_table(posts).validate().is_ok());
    }

    #[test]
    fn test_checksum_ignores_revision_and_insertion_order() {
        let a = TableSpec::new("a").with_column(ColumnSpec::new("x", DataType::Integer));
        let b = TableSpec::new("b").with_column(ColumnSpec::new("y", DataType::Text));

        let first = SchemaState::new(1, BTreeMap::new()).with_table(a.clone()).with_table(b.clone());
        let second = SchemaState::new(7, BTreeMap::new()).with_table(b).with_table(a);

        assert_eq!(first.checksum(), second.checksum());
        assert_ne!(first.checksum(), SchemaState::empty().checksum());
    }

    #[test]
    fn test_state_loads_from_stored_json() {
        let json = r#"{
            "revision": 3,
            "tables": {
                "users": {
                    "name": "users",
                    "columns": {
                        "email": { "name": "email", "dataType": "CHARACTER VARYING(255)", "allowNull": false },
                        "id": { "name": "id", "dataType": "int4", "primaryKey": true, "autoIncrement": true, "allowNull": false }
                    }
                }
            }
        }"#;
        let state: SchemaState = serde_json::from_str(json).unwrap();
        let expected = SchemaState::new(3, BTreeMap::new()).with_table(
            TableSpec::new("users")
                .with_column(ColumnSpec::new("id", DataType::Integer).primary_key().auto_increment())
                .with_column(ColumnSpec::new("email", DataType::VarChar(255)).not_null()),
        );
        assert_eq!(state, expected);
    }

    #[test]
    fn test_default_value_sql() {
        assert_eq!(DefaultValue::Number(0u64.into()).to_sql(), "0");
        assert_eq!(DefaultValue::Boolean(true).to_sql(), "true");
        assert_eq!(DefaultValue::Literal("it's".into()).to_sql(), "'it''s'");
        // strings stay strings even when they read like numbers
        assert_eq!(DefaultValue::Literal("007".into()).to_sql(), "'007'");
        assert_eq!(DefaultValue::Literal("Infinity".into()).to_sql(), "'Infinity'");
        assert_eq!(DefaultValue::Literal("true".into()).to_sql(), "'true'");
        assert_eq!(DefaultValue::Expression("now()".into()).to_sql(), "now()");
    }
}
