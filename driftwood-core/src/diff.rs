use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::model::ModelFieldDescriptor;
use crate::schema::ColumnDescriptor;
use crate::sqlgen;

/// Audit timestamp columns models gain implicitly; never reported as drops.
pub const AUDIT_COLUMNS: [&str; 3] = ["created_at", "updated_at", "deleted_at"];

/// Classification of one discrepancy between a model and a live table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    AddColumn,
    DropColumn,
    ModifyColumn,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChangeKind::AddColumn => "add_column",
            ChangeKind::DropColumn => "drop_column",
            ChangeKind::ModifyColumn => "modify_column",
        };
        f.write_str(label)
    }
}

/// One column change with its forward and backward DDL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeDescriptor {
    pub kind: ChangeKind,
    pub table: String,
    pub column: String,
    pub up_sql: String,
    pub down_sql: String,
}

pub fn is_audit_column(name: &str) -> bool {
    AUDIT_COLUMNS.contains(&name)
}

/// Loose compatibility check: the live type only has to contain the expected
/// type, so `INT(11)` satisfies `INT`. Width changes on a compatible base type
/// are therefore not reported.
pub fn is_type_compatible(live_type: &str, expected_type: &str) -> bool {
    live_type
        .to_ascii_uppercase()
        .contains(&expected_type.to_ascii_uppercase())
}

/// Compares one table. Output order: adds (model order), drops (live order),
/// then modifies (model order).
pub fn diff_table(
    table: &str,
    fields: &[ModelFieldDescriptor],
    columns: &[ColumnDescriptor],
) -> Vec<ChangeDescriptor> {
    let live: HashMap<&str, &ColumnDescriptor> =
        columns.iter().map(|c| (c.name.as_str(), c)).collect();
    let declared: HashMap<&str, &ModelFieldDescriptor> =
        fields.iter().map(|f| (f.db_name.as_str(), f)).collect();

    let mut changes = Vec::new();

    for field in fields {
        if !live.contains_key(field.db_name.as_str()) {
            changes.push(ChangeDescriptor {
                kind: ChangeKind::AddColumn,
                table: table.to_owned(),
                column: field.db_name.clone(),
                up_sql: sqlgen::add_column(table, field),
                down_sql: sqlgen::drop_column(table, &field.db_name),
            });
        }
    }

    for column in columns {
        if declared.contains_key(column.name.as_str()) || is_audit_column(&column.name) {
            continue;
        }
        changes.push(ChangeDescriptor {
            kind: ChangeKind::DropColumn,
            table: table.to_owned(),
            column: column.name.clone(),
            up_sql: sqlgen::drop_column(table, &column.name),
            down_sql: sqlgen::add_live_column(table, column),
        });
    }

    for field in fields {
        let Some(column) = live.get(field.db_name.as_str()) else {
            continue;
        };
        if is_type_compatible(&column.sql_type, &sqlgen::expected_type(field)) {
            continue;
        }
        changes.push(ChangeDescriptor {
            kind: ChangeKind::ModifyColumn,
            table: table.to_owned(),
            column: field.db_name.clone(),
            up_sql: sqlgen::modify_column(table, field),
            down_sql: sqlgen::restore_live_column(table, column),
        });
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldDef, ModelDef};
    use crate::types::FieldType;

    fn tag_model() -> ModelDef {
        ModelDef::new("Tag", "blog_tag")
            .field(FieldDef::scalar("id", FieldType::Int64).tag("primary_key"))
            .field(FieldDef::scalar("name", FieldType::String).tag("size:100"))
            .field(FieldDef::scalar("state", FieldType::UInt8).tag("default:1"))
    }

    fn col(name: &str, sql_type: &str) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.to_owned(),
            sql_type: sql_type.to_owned(),
            nullable: true,
            default_value: None,
            key: String::new(),
            extra: String::new(),
        }
    }

    #[test]
    fn empty_live_table_is_add_only() {
        let fields = tag_model().descriptors();
        let changes = diff_table("blog_tag", &fields, &[]);
        assert_eq!(changes.len(), fields.len());
        assert!(changes.iter().all(|c| c.kind == ChangeKind::AddColumn));
        let columns: Vec<&str> = changes.iter().map(|c| c.column.as_str()).collect();
        assert_eq!(columns, vec!["id", "name", "state"]);
    }

    #[test]
    fn audit_columns_are_never_dropped() {
        let fields = tag_model().descriptors();
        let live = vec![
            col("id", "bigint(20)"),
            col("name", "varchar(100)"),
            col("state", "tinyint unsigned"),
            col("created_at", "datetime"),
            col("updated_at", "datetime"),
            col("deleted_at", "datetime"),
        ];
        let changes = diff_table("blog_tag", &fields, &live);
        assert!(changes.is_empty(), "{:?}", changes);
    }

    #[test]
    fn classifies_and_orders_changes() {
        let fields = tag_model().descriptors();
        let live = vec![
            col("legacy_b", "int(11)"),
            col("id", "int(11)"),
            col("legacy_a", "text"),
            col("state", "tinyint unsigned"),
        ];
        let changes = diff_table("blog_tag", &fields, &live);
        let summary: Vec<(ChangeKind, &str)> = changes
            .iter()
            .map(|c| (c.kind, c.column.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (ChangeKind::AddColumn, "name"),
                (ChangeKind::DropColumn, "legacy_b"),
                (ChangeKind::DropColumn, "legacy_a"),
                (ChangeKind::ModifyColumn, "id"),
            ]
        );

        let modify = &changes[3];
        assert_eq!(
            modify.up_sql,
            "ALTER TABLE `blog_tag` MODIFY COLUMN `id` BIGINT NOT NULL;"
        );
        assert_eq!(
            modify.down_sql,
            "ALTER TABLE `blog_tag` MODIFY COLUMN `id` int(11) NULL;"
        );
        assert_eq!(
            changes[1].down_sql,
            "ALTER TABLE `blog_tag` ADD COLUMN `legacy_b` int(11) NULL;"
        );
    }

    #[test]
    fn type_compatibility_is_substring_based() {
        assert!(is_type_compatible("int(11)", "INT"));
        assert!(is_type_compatible("VARCHAR(200)", "VARCHAR(200)"));
        assert!(!is_type_compatible("varchar(100)", "VARCHAR(200)"));
        // width changes on an integer go unnoticed
        assert!(is_type_compatible("bigint(11)", "INT"));
    }

    #[test]
    fn sized_title_scenario() {
        let model = ModelDef::new("Article", "blog_article")
            .field(FieldDef::scalar("id", FieldType::Int64))
            .field(FieldDef::scalar("title", FieldType::String).tag("size:200"));
        let changes = diff_table("blog_article", &model.descriptors(), &[col("id", "bigint")]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::AddColumn);
        assert!(changes[0].up_sql.contains("VARCHAR(200)"));
        assert!(changes[0].up_sql.contains("NOT NULL"));
    }

    #[test]
    fn change_kind_labels() {
        assert_eq!(ChangeKind::ModifyColumn.to_string(), "modify_column");
        assert_eq!(
            serde_json::to_string(&ChangeKind::DropColumn).unwrap(),
            "\"drop_column\""
        );
    }
}
