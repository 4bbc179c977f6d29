//! Model declaration extraction
//!
//! Produces the table map of the current schema. The bundled extractor reads
//! a JSON model declaration file:
//!
//! ```json
//! { "models": [ { "table": "users",
//!                 "columns": [ { "name": "id", "type": "int", "primaryKey": true } ],
//!                 "indexes": [ { "columns": ["email"], "unique": true } ] } ] }
//! ```

use crate::error::{extract_error, MigrateResult};
use crate::snapshot::{
    ColumnSpec, DefaultValue, ForeignKeyRef, IndexSpec, TableSpec, TypeCanonicalizer,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::debug;
use validator::Validate;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]{0,62}$").expect("valid identifier regex"));

/// Source of the current schema's tables (revision is assigned by the caller)
pub trait SnapshotExtractor {
    fn extract(&self) -> impl Future<Output = MigrateResult<BTreeMap<String, TableSpec>>> + Send;
}

/// Model declaration file
#[derive(Debug, Deserialize, Validate)]
pub struct ModelDocument {
    #[validate(nested)]
    pub models: Vec<ModelDeclaration>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ModelDeclaration {
    #[validate(regex(path = *IDENTIFIER, message = "Table name must be an identifier of at most 63 characters"))]
    pub table: String,

    #[validate(length(min = 1, message = "At least one column is required"))]
    #[validate(nested)]
    pub columns: Vec<ColumnDeclaration>,

    #[serde(default)]
    #[validate(nested)]
    pub indexes: Vec<IndexDeclaration>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDeclaration {
    #[validate(regex(path = *IDENTIFIER, message = "Column name must be an identifier of at most 63 characters"))]
    pub name: String,

    #[validate(length(min = 1, message = "Column type is required"))]
    #[serde(rename = "type")]
    pub data_type: String,

    #[serde(default)]
    pub allow_null: Option<bool>,

    #[serde(default)]
    pub primary_key: bool,

    #[serde(default)]
    pub auto_increment: bool,

    #[serde(default)]
    pub unique: bool,

    /// Scalar literal, or `{ "expression": "now()" }`
    #[serde(default)]
    pub default_value: Option<Value>,

    #[serde(default)]
    pub references: Option<ForeignKeyRef>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct IndexDeclaration {
    /// Defaults to `{table}_{columns joined by _}`
    #[serde(default)]
    pub name: Option<String>,

    #[validate(length(min = 1, message = "Index needs at least one column"))]
    pub columns: Vec<String>,

    #[serde(default)]
    pub unique: bool,
}

/// Reads model declarations from a JSON file
#[derive(Debug, Clone)]
pub struct ModelFileExtractor {
    path: PathBuf,
}

impl ModelFileExtractor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse and normalize a declaration document
    pub fn parse(content: &str) -> MigrateResult<BTreeMap<String, TableSpec>> {
        let document: ModelDocument = serde_json::from_str(content)
            .map_err(|e| extract_error(format!("Malformed model declarations: {}", e)))?;
        document
            .validate()
            .map_err(|e| extract_error(format!("Invalid model declarations: {}", e)))?;

        let mut tables = BTreeMap::new();
        for model in document.models {
            let table = Self::table_spec(model)?;
            if tables.contains_key(&table.name) {
                return Err(extract_error(format!("Table '{}' is declared twice", table.name)));
            }
            tables.insert(table.name.clone(), table);
        }
        Ok(tables)
    }

    fn table_spec(model: ModelDeclaration) -> MigrateResult<TableSpec> {
        let mut table = TableSpec::new(model.table);

        for declared in model.columns {
            if table.columns.contains_key(&declared.name) {
                return Err(extract_error(format!(
                    "Column '{}.{}' is declared twice",
                    table.name, declared.name
                )));
            }
            let column = Self::column_spec(declared)?;
            table = table.with_column(column);
        }

        for declared in model.indexes {
            let name = declared
                .name
                .unwrap_or_else(|| format!("{}_{}", table.name, declared.columns.join("_")));
            if table.indexes.contains_key(&name) {
                return Err(extract_error(format!(
                    "Index '{}' on table '{}' is declared twice",
                    name, table.name
                )));
            }
            let mut index = IndexSpec::new(name, declared.columns);
            if declared.unique {
                index = index.unique();
            }
            table = table.with_index(index);
        }

        table.validate()?;
        Ok(table)
    }

    fn column_spec(declared: ColumnDeclaration) -> MigrateResult<ColumnSpec> {
        let data_type = TypeCanonicalizer::canonicalize(&declared.data_type)?;
        let mut column = ColumnSpec::new(declared.name, data_type);

        if let Some(allow_null) = declared.allow_null {
            column = column.nullable(allow_null);
        }
        if declared.primary_key {
            column = column.primary_key();
        }
        if declared.auto_increment {
            column = column.auto_increment();
        }
        if declared.unique {
            column = column.unique();
        }
        if let Some(value) = declared.default_value {
            if let Some(default) = default_value(&column.name, value)? {
                column = column.default_value(default);
            }
        }
        if let Some(target) = declared.references {
            column = column.references(target);
        }
        Ok(column)
    }
}

fn default_value(column: &str, value: Value) -> MigrateResult<Option<DefaultValue>> {
    let default = match value {
        Value::Null => None,
        Value::String(s) => Some(DefaultValue::Literal(s)),
        Value::Number(n) => Some(DefaultValue::Number(n)),
        Value::Bool(b) => Some(DefaultValue::Boolean(b)),
        Value::Object(map) => match map.get("expression") {
            Some(Value::String(expr)) => Some(DefaultValue::Expression(expr.clone())),
            _ => {
                return Err(extract_error(format!(
                    "Default of column '{}' must be a scalar or {{\"expression\": ...}}",
                    column
                )))
            }
        },
        Value::Array(_) => {
            return Err(extract_error(format!(
                "Default of column '{}' cannot be an array",
                column
            )))
        }
    };
    Ok(default)
}

impl SnapshotExtractor for ModelFileExtractor {
    async fn extract(&self) -> MigrateResult<BTreeMap<String, TableSpec>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            extract_error(format!("Cannot read {}: {}", self.path.display(), e))
        })?;
        let tables = Self::parse(&content)?;
        debug!("Extracted {} tables from {}", tables.len(), self.path.display());
        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MigrateError, SchemaError};
    use crate::snapshot::{DataType, ReferentialAction};
    use pretty_assertions::assert_eq;

    const MODELS: &str = r#"{
        "models": [
            {
                "table": "users",
                "columns": [
                    { "name": "id", "type": "serial", "primaryKey": true, "autoIncrement": true },
                    { "name": "email", "type": "STRING", "allowNull": false, "unique": true },
                    { "name": "created_at", "type": "timestamptz", "defaultValue": { "expression": "now()" } }
                ],
                "indexes": [ { "columns": ["email", "created_at"] } ]
            },
            {
                "table": "posts",
                "columns": [
                    { "name": "id", "type": "int", "primaryKey": true },
                    { "name": "views", "type": "integer", "defaultValue": 0 },
                    { "name": "author_id", "type": "int4",
                      "references": { "table": "users", "column": "id", "onDelete": "CASCADE" } }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_parse_canonicalizes_declarations() {
        let tables = ModelFileExtractor::parse(MODELS).unwrap();
        assert_eq!(tables.keys().collect::<Vec<_>>(), vec!["posts", "users"]);

        let users = &tables["users"];
        let id = users.column("id").unwrap();
        assert_eq!(id.data_type, DataType::Integer);
        assert!(id.primary_key && id.auto_increment && !id.allow_null);

        let email = users.column("email").unwrap();
        assert_eq!(email.data_type, DataType::VarChar(255));
        assert!(email.unique && !email.allow_null);

        let created = users.column("created_at").unwrap();
        assert_eq!(created.default_value, Some(DefaultValue::Expression("now()".into())));
        assert!(users.indexes.contains_key("users_email_created_at"));

        let author = tables["posts"].column("author_id").unwrap();
        let target = author.references.as_ref().unwrap();
        assert_eq!(target.table, "users");
        assert_eq!(target.on_delete, Some(ReferentialAction::Cascade));
        assert_eq!(
            tables["posts"].column("views").unwrap().default_value,
            Some(DefaultValue::Number(0u64.into()))
        );
    }

    #[test]
    fn test_default_kinds_survive_extraction() {
        let tables = ModelFileExtractor::parse(
            r#"{ "models": [ { "table": "codes", "columns": [
                { "name": "code", "type": "varchar(8)", "defaultValue": "007" },
                { "name": "ceiling", "type": "text", "defaultValue": "Infinity" },
                { "name": "ratio", "type": "double", "defaultValue": 1.5 },
                { "name": "active", "type": "boolean", "defaultValue": false } ] } ] }"#,
        )
        .unwrap();
        let codes = &tables["codes"];
        let sql = |name: &str| codes.column(name).unwrap().default_value.as_ref().unwrap().to_sql();

        assert_eq!(sql("code"), "'007'");
        assert_eq!(sql("ceiling"), "'Infinity'");
        assert_eq!(sql("ratio"), "1.5");
        assert_eq!(sql("active"), "false");
    }

    #[test]
    fn test_rejects_invalid_identifier() {
        let err = ModelFileExtractor::parse(
            r#"{ "models": [ { "table": "bad name", "columns": [ { "name": "id", "type": "int" } ] } ] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, MigrateError::Extract(_)));
    }

    #[test]
    fn test_rejects_table_without_columns() {
        let err = ModelFileExtractor::parse(r#"{ "models": [ { "table": "empty", "columns": [] } ] }"#)
            .unwrap_err();
        assert!(matches!(err, MigrateError::Extract(_)));
    }

    #[test]
    fn test_rejects_duplicates() {
        let twice_table = r#"{ "models": [
            { "table": "a", "columns": [ { "name": "id", "type": "int" } ] },
            { "table": "a", "columns": [ { "name": "id", "type": "int" } ] } ] }"#;
        assert!(ModelFileExtractor::parse(twice_table).is_err());

        let twice_column = r#"{ "models": [
            { "table": "a", "columns": [ { "name": "id", "type": "int" }, { "name": "id", "type": "text" } ] } ] }"#;
        assert!(ModelFileExtractor::parse(twice_column).is_err());
    }

    #[test]
    fn test_schema_violations_surface_as_schema_errors() {
        let err = ModelFileExtractor::parse(
            r#"{ "models": [ { "table": "a",
                "columns": [ { "name": "id", "type": "int" } ],
                "indexes": [ { "name": "a_missing", "columns": ["missing"] } ] } ] }"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            MigrateError::Schema(SchemaError::UnknownIndexColumn { .. })
        ));
    }

    #[tokio::test]
    async fn test_extract_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.json");
        tokio::fs::write(&path, MODELS).await.unwrap();

        let tables = ModelFileExtractor::new(&path).extract().await.unwrap();
        assert_eq!(tables.len(), 2);

        let missing = ModelFileExtractor::new(dir.path().join("nope.json")).extract().await;
        assert!(matches!(missing, Err(MigrateError::Extract(_))));
    }
}
