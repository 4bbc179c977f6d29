//! Script generator
//!
//! Renders actions 1:1 into executable command descriptors and summary
//! lines, and bundles the forward and reverse renders into a
//! [`MigrationScript`]. Rendering never reorders, merges or drops actions.

use crate::error::SchemaError;
use crate::migration::sql::PostgresDdl;
use crate::snapshot::{Action, ActionKind, DiffEngine, SchemaState};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One executable operation: a query-interface call and its SQL form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Operation name, e.g. `addColumn`
    #[serde(rename = "fn")]
    pub op: ActionKind,
    /// Positional structural arguments of the operation
    pub params: Vec<Value>,
    /// PostgreSQL statements performing the same change
    pub sql: String,
}

/// Output of one render pass
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedActions {
    pub commands: Vec<Command>,
    pub summaries: Vec<String>,
}

/// Forward and backward commands for one revision transition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationScript {
    commands_up: Vec<Command>,
    commands_down: Vec<Command>,
    console_out: Vec<String>,
}

impl MigrationScript {
    /// Commands that move the schema forward
    pub fn commands_up(&self) -> &[Command] {
        &self.commands_up
    }

    /// Commands that undo `commands_up`
    pub fn commands_down(&self) -> &[Command] {
        &self.commands_down
    }

    /// One summary line per forward action
    pub fn console_out(&self) -> &[String] {
        &self.console_out
    }

    pub fn up_sql(&self) -> String {
        join_sql(&self.commands_up)
    }

    pub fn down_sql(&self) -> String {
        join_sql(&self.commands_down)
    }
}

fn join_sql(commands: &[Command]) -> String {
    commands
        .iter()
        .map(|c| c.sql.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub struct ScriptGenerator;

impl ScriptGenerator {
    /// Render actions into commands and summaries, preserving order 1:1
    pub fn render(actions: &[Action]) -> RenderedActions {
        RenderedActions {
            commands: actions.iter().map(Self::command).collect(),
            summaries: actions.iter().map(Action::description).collect(),
        }
    }

    /// Diff both directions and render the script.
    ///
    /// Returns `None` when `from` and `to` have no structural difference.
    pub fn generate(from: &SchemaState, to: &SchemaState) -> Result<Option<MigrationScript>, SchemaError> {
        let up = DiffEngine::diff(from, to)?;
        if up.is_empty() {
            return Ok(None);
        }
        let down = DiffEngine::diff(to, from)?;
        Ok(Some(Self::from_actions(&up, &down)))
    }

    /// Bundle already computed forward and reverse actions
    pub fn from_actions(up: &[Action], down: &[Action]) -> MigrationScript {
        let forward = Self::render(up);
        let backward = Self::render(down);
        MigrationScript {
            commands_up: forward.commands,
            commands_down: backward.commands,
            console_out: forward.summaries,
        }
    }

    /// Convert a single action to its command descriptor
    pub fn command(action: &Action) -> Command {
        Command {
            op: action.kind(),
            params: Self::params(action),
            sql: PostgresDdl::statement(action),
        }
    }

    fn params(action: &Action) -> Vec<Value> {
        match action {
            Action::CreateTable { table } => {
                let columns: serde_json::Map<String, Value> = table
                    .columns
                    .iter()
                    .map(|(name, col)| (name.clone(), to_value(col)))
                    .collect();
                let indexes: Vec<Value> = table.indexes.values().map(to_value).collect();
                vec![
                    json!(table.name),
                    Value::Object(columns),
                    json!({ "indexes": indexes }),
                ]
            }
            Action::DropTable { table_name } => vec![json!(table_name)],
            Action::AddColumn { table_name, column } => {
                vec![json!(table_name), json!(column.name), to_value(column)]
            }
            Action::RemoveColumn { table_name, column_name } => {
                vec![json!(table_name), json!(column_name)]
            }
            Action::ChangeColumn { table_name, column_name, column } => {
                vec![json!(table_name), json!(column_name), to_value(column)]
            }
            Action::AddIndex { table_name, index } => vec![
                json!(table_name),
                json!(index.columns),
                json!({ "name": index.name, "unique": index.unique }),
            ],
            Action::RemoveIndex { table_name, index_name } => {
                vec![json!(table_name), json!(index_name)]
            }
        }
    }
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{ColumnSpec, DataType, IndexSpec, TableSpec};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn users(email_nullable: bool) -> TableSpec {
        TableSpec::new("users")
            .with_column(ColumnSpec::new("id", DataType::Integer).primary_key().auto_increment())
            .with_column(ColumnSpec::new("email", DataType::VarChar(255)).nullable(email_nullable))
    }

    #[test]
    fn test_render_preserves_order_one_to_one() {
        let actions = vec![
            Action::RemoveIndex { table_name: "t".into(), index_name: "i".into() },
            Action::AddColumn { table_name: "t".into(), column: ColumnSpec::new("c", DataType::Text) },
            Action::DropTable { table_name: "a".into() },
        ];
        let rendered = ScriptGenerator::render(&actions);
        let ops: Vec<ActionKind> = rendered.commands.iter().map(|c| c.op).collect();
        assert_eq!(ops, vec![ActionKind::RemoveIndex, ActionKind::AddColumn, ActionKind::DropTable]);
        assert_eq!(
            rendered.summaries,
            vec![
                "remove index i from table t",
                "add column c to table t",
                "drop table a",
            ]
        );
    }

    #[test]
    fn test_new_table_script() {
        let previous = SchemaState::new(1, BTreeMap::new());
        let current = previous.next(BTreeMap::new()).with_table(users(false));

        let script = ScriptGenerator::generate(&previous, &current).unwrap().unwrap();
        assert_eq!(script.commands_up().len(), 1);
        assert_eq!(script.commands_down().len(), 1);
        assert_eq!(script.commands_up()[0].op, ActionKind::CreateTable);
        assert_eq!(script.commands_down()[0].op, ActionKind::DropTable);
        assert_eq!(script.console_out(), ["create table users"]);
        assert_eq!(script.down_sql(), "DROP TABLE \"users\";");
    }

    #[test]
    fn test_no_changes_yields_none() {
        let state = SchemaState::empty().with_table(users(true));
        assert!(ScriptGenerator::generate(&state, &state).unwrap().is_none());
    }

    #[test]
    fn test_change_column_params_carry_whole_column() {
        let previous = SchemaState::empty().with_table(users(false));
        let current = SchemaState::empty().with_table(users(true));
        let script = ScriptGenerator::generate(&previous, &current).unwrap().unwrap();

        let up = &script.commands_up()[0];
        assert_eq!(up.params[0], json!("users"));
        assert_eq!(up.params[1], json!("email"));
        assert_eq!(up.params[2]["allowNull"], json!(true));
        assert_eq!(up.params[2]["dataType"], json!("varchar(255)"));

        let down = &script.commands_down()[0];
        assert_eq!(down.params[2]["allowNull"], json!(false));
    }

    #[test]
    fn test_command_serialized_shape() {
        let command = ScriptGenerator::command(&Action::AddIndex {
            table_name: "users".into(),
            index: IndexSpec::new("users_email", ["email"]).unique(),
        });
        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(value["fn"], json!("addIndex"));
        assert_eq!(
            value["params"],
            json!(["users", ["email"], { "name": "users_email", "unique": true }])
        );
    }
}
