//! Migration SQL generator
//!
//! Generates PostgreSQL DDL statements from migration actions. Unique and
//! foreign-key constraints get deterministic names (`{table}_{column}_key`,
//! `{table}_{column}_fkey`) so a later column change can drop and re-add them
//! knowing only the new column definition.

use crate::snapshot::{Action, ColumnSpec, IndexSpec, TableSpec};

pub struct PostgresDdl;

impl PostgresDdl {
    /// Convert a single action to SQL (one or more `;`-terminated statements)
    pub fn statement(action: &Action) -> String {
        match action {
            Action::CreateTable { table } => Self::create_table_sql(table),
            Action::DropTable { table_name } => format!("DROP TABLE {};", quote(table_name)),
            Action::AddColumn { table_name, column } => format!(
                "ALTER TABLE {} ADD COLUMN {};",
                quote(table_name),
                Self::column_definition(table_name, column, true)
            ),
            Action::RemoveColumn { table_name, column_name } => format!(
                "ALTER TABLE {} DROP COLUMN {};",
                quote(table_name),
                quote(column_name)
            ),
            Action::ChangeColumn { table_name, column, .. } => Self::change_column_sql(table_name, column),
            Action::AddIndex { table_name, index } => Self::create_index_sql(table_name, index),
            Action::RemoveIndex { index_name, .. } => format!("DROP INDEX IF EXISTS {};", quote(index_name)),
        }
    }

    fn create_table_sql(table: &TableSpec) -> String {
        // primary key columns lead, the rest follow by name
        let (keys, others): (Vec<&ColumnSpec>, Vec<&ColumnSpec>) =
            table.columns.values().partition(|c| c.primary_key);

        let mut lines: Vec<String> = keys
            .iter()
            .chain(others.iter())
            .map(|col| format!("    {}", Self::column_definition(&table.name, col, false)))
            .collect();

        if !keys.is_empty() {
            let pk_cols: Vec<String> = keys.iter().map(|c| quote(&c.name)).collect();
            lines.push(format!("    PRIMARY KEY ({})", pk_cols.join(", ")));
        }

        let mut statements = vec![format!(
            "CREATE TABLE {} (\n{}\n);",
            quote(&table.name),
            lines.join(",\n")
        )];
        statements.extend(
            table
                .indexes
                .values()
                .map(|index| Self::create_index_sql(&table.name, index)),
        );
        statements.join("\n")
    }

    /// Column clause; `inline_primary_key` is set outside of CREATE TABLE
    fn column_definition(table_name: &str, col: &ColumnSpec, inline_primary_key: bool) -> String {
        let mut def = format!("{} {}", quote(&col.name), col.data_type);

        if col.auto_increment {
            def.push_str(" GENERATED BY DEFAULT AS IDENTITY");
        }
        if !col.allow_null {
            def.push_str(" NOT NULL");
        }
        if let Some(ref default) = col.default_value {
            def.push_str(&format!(" DEFAULT {}", default.to_sql()));
        }
        if col.primary_key && inline_primary_key {
            def.push_str(" PRIMARY KEY");
        }
        if col.unique {
            def.push_str(&format!(
                " CONSTRAINT {} UNIQUE",
                quote(&unique_constraint_name(table_name, &col.name))
            ));
        }
        if let Some(ref target) = col.references {
            def.push_str(&format!(
                " CONSTRAINT {} REFERENCES {} ({})",
                quote(&foreign_key_name(table_name, &col.name)),
                quote(&target.table),
                quote(&target.column)
            ));
            if let Some(on_delete) = target.on_delete {
                def.push_str(&format!(" ON DELETE {}", on_delete.as_sql()));
            }
            if let Some(on_update) = target.on_update {
                def.push_str(&format!(" ON UPDATE {}", on_update.as_sql()));
            }
        }
        def
    }

    fn change_column_sql(table_name: &str, col: &ColumnSpec) -> String {
        let table = quote(table_name);
        let column = quote(&col.name);
        let mut statements = vec![format!(
            "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{};",
            table, column, col.data_type, column, col.data_type
        )];

        statements.push(format!(
            "ALTER TABLE {} ALTER COLUMN {} {} NOT NULL;",
            table,
            column,
            if col.allow_null { "DROP" } else { "SET" }
        ));

        // identity columns reject SET/DROP DEFAULT
        if !col.auto_increment {
            match col.default_value {
                Some(ref default) => statements.push(format!(
                    "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {};",
                    table,
                    column,
                    default.to_sql()
                )),
                None => statements.push(format!(
                    "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT;",
                    table, column
                )),
            }
        }

        let unique_name = quote(&unique_constraint_name(table_name, &col.name));
        statements.push(format!(
            "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {};",
            table, unique_name
        ));
        if col.unique {
            statements.push(format!(
                "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({});",
                table, unique_name, column
            ));
        }

        let fk_name = quote(&foreign_key_name(table_name, &col.name));
        statements.push(format!(
            "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {};",
            table, fk_name
        ));
        if let Some(ref target) = col.references {
            let mut sql = format!(
                "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
                table,
                fk_name,
                column,
                quote(&target.table),
                quote(&target.column)
            );
            if let Some(on_delete) = target.on_delete {
                sql.push_str(&format!(" ON DELETE {}", on_delete.as_sql()));
            }
            if let Some(on_update) = target.on_update {
                sql.push_str(&format!(" ON UPDATE {}", on_update.as_sql()));
            }
            sql.push(';');
            statements.push(sql);
        }

        statements.join("\n")
    }

    fn create_index_sql(table_name: &str, index: &IndexSpec) -> String {
        let cols: Vec<String> = index.columns.iter().map(|c| quote(c)).collect();
        format!(
            "CREATE {}INDEX {} ON {} ({});",
            if index.unique { "UNIQUE " } else { "" },
            quote(&index.name),
            quote(table_name),
            cols.join(", ")
        )
    }
}

/// Double-quote an identifier
fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn unique_constraint_name(table: &str, column: &str) -> String {
    format!("{}_{}_key", table, column)
}

fn foreign_key_name(table: &str, column: &str) -> String {
    format!("{}_{}_fkey", table, column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{DataType, DefaultValue, ForeignKeyRef, ReferentialAction};

    #[test]
    fn test_create_table_with_primary_key_and_index() {
        let table = TableSpec::new("users")
            .with_column(ColumnSpec::new("email", DataType::VarChar(255)).not_null().unique())
            .with_column(ColumnSpec::new("id", DataType::Integer).primary_key().auto_increment())
            .with_index(IndexSpec::new("users_email_lower", ["email"]));

        let sql = PostgresDdl::statement(&Action::CreateTable { table });
        assert_eq!(
            sql,
            "CREATE TABLE \"users\" (\n    \"id\" integer GENERATED BY DEFAULT AS IDENTITY NOT NULL,\n    \"email\" varchar(255) NOT NULL CONSTRAINT \"users_email_key\" UNIQUE,\n    PRIMARY KEY (\"id\")\n);\nCREATE INDEX \"users_email_lower\" ON \"users\" (\"email\");"
        );
    }

    #[test]
    fn test_add_column_with_foreign_key() {
        let column = ColumnSpec::new("team_id", DataType::BigInt).references(
            ForeignKeyRef::new("teams", "id").on_delete(ReferentialAction::SetNull),
        );
        let sql = PostgresDdl::statement(&Action::AddColumn {
            table_name: "users".into(),
            column,
        });
        assert_eq!(
            sql,
            "ALTER TABLE \"users\" ADD COLUMN \"team_id\" bigint CONSTRAINT \"users_team_id_fkey\" REFERENCES \"teams\" (\"id\") ON DELETE SET NULL;"
        );
    }

    #[test]
    fn test_change_column_is_absolute() {
        let column = ColumnSpec::new("status", DataType::VarChar(16))
            .not_null()
            .default_value(DefaultValue::Literal("active".into()));
        let sql = PostgresDdl::statement(&Action::ChangeColumn {
            table_name: "users".into(),
            column_name: "status".into(),
            column,
        });
        let lines: Vec<&str> = sql.lines().collect();
        assert_eq!(lines[0], "ALTER TABLE \"users\" ALTER COLUMN \"status\" TYPE varchar(16) USING \"status\"::varchar(16);");
        assert_eq!(lines[1], "ALTER TABLE \"users\" ALTER COLUMN \"status\" SET NOT NULL;");
        assert_eq!(lines[2], "ALTER TABLE \"users\" ALTER COLUMN \"status\" SET DEFAULT 'active';");
        assert!(lines.contains(&"ALTER TABLE \"users\" DROP CONSTRAINT IF EXISTS \"users_status_fkey\";"));
        assert!(!sql.contains("ADD CONSTRAINT"));
    }

    #[test]
    fn test_change_identity_column_leaves_default_alone() {
        let column = ColumnSpec::new("id", DataType::BigInt).primary_key().auto_increment();
        let sql = PostgresDdl::statement(&Action::ChangeColumn {
            table_name: "users".into(),
            column_name: "id".into(),
            column,
        });
        let lines: Vec<&str> = sql.lines().collect();
        assert_eq!(lines[0], "ALTER TABLE \"users\" ALTER COLUMN \"id\" TYPE bigint USING \"id\"::bigint;");
        assert_eq!(lines[1], "ALTER TABLE \"users\" ALTER COLUMN \"id\" SET NOT NULL;");
        assert!(!sql.contains("DEFAULT"));
    }

    #[test]
    fn test_index_statements() {
        let add = PostgresDdl::statement(&Action::AddIndex {
            table_name: "events".into(),
            index: IndexSpec::new("events_lookup", ["kind", "at"]).unique(),
        });
        assert_eq!(add, "CREATE UNIQUE INDEX \"events_lookup\" ON \"events\" (\"kind\", \"at\");");

        let remove = PostgresDdl::statement(&Action::RemoveIndex {
            table_name: "events".into(),
            index_name: "events_lookup".into(),
        });
        assert_eq!(remove, "DROP INDEX IF EXISTS \"events_lookup\";");
    }

    #[test]
    fn test_identifiers_are_escaped() {
        assert_eq!(quote("we\"ird"), "\"we\"\"ird\"");
    }
}
