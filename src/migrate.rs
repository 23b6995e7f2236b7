//! Schema differ: computes an ordered, reversible set of change operations
//! between an existing schema snapshot and the authored ERD.

use crate::ast::{Field, FieldReference, Table};
use crate::serializer::field_to_string;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MigrationPlan {
    pub up: Vec<Operation>,
    pub down: Vec<Operation>,
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.up.is_empty() && self.down.is_empty()
    }

    /// Render the plan as neutral text, one operation per line.
    pub fn to_text(&self) -> String {
        if self.is_empty() {
            return "no schema changes\n".to_string();
        }
        let mut text = String::from("-- up\n");
        for operation in &self.up {
            text.push_str(&operation.to_string());
            text.push('\n');
        }
        text.push_str("\n-- down\n");
        for operation in &self.down {
            text.push_str(&operation.to_string());
            text.push('\n');
        }
        text
    }
}

/// Abstract change records; rendering them into a target dialect or ORM is a
/// downstream serialization concern.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    CreateTable(Table),
    DropTable(String),
    AlterTable { table: String, changes: Vec<Change> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    AddColumn(Field),
    DropColumn(String),
    AlterType {
        field: String,
        typ: String,
        is_unsigned: bool,
    },
    SetPrimaryKey {
        field: String,
        is_primary_key: bool,
    },
    SetUnique {
        field: String,
        is_unique: bool,
    },
    SetNullable {
        field: String,
        is_null: bool,
    },
    AddForeignKey {
        field: String,
        references: FieldReference,
    },
    DropForeignKey {
        field: String,
    },
}

/// Diff `existing` (the database as it is) against `desired` (the ERD as
/// authored). Up operations transform existing into desired; down operations
/// are the structural inverse, prepended so they run in reverse order.
pub fn diff_schemas(existing: &[Table], desired: &[Table]) -> MigrationPlan {
    let mut plan = MigrationPlan::default();

    for table in existing {
        if !desired.iter().any(|desired| desired.name == table.name) {
            // A table absent from the ERD is never dropped.
            log::warn!(
                "table {:?} exists in the schema but not in the ERD, no drop is generated",
                table.name
            );
        }
    }

    for table in sort_tables(desired) {
        let Some(existing_table) = existing.iter().find(|candidate| candidate.name == table.name)
        else {
            plan.up.push(Operation::CreateTable(table.clone()));
            plan.down.insert(0, Operation::DropTable(table.name.clone()));
            continue;
        };
        let (up_changes, down_changes) = diff_fields(existing_table, table);
        if !up_changes.is_empty() {
            plan.up.push(Operation::AlterTable {
                table: table.name.clone(),
                changes: up_changes,
            });
        }
        if !down_changes.is_empty() {
            plan.down.insert(
                0,
                Operation::AlterTable {
                    table: table.name.clone(),
                    changes: down_changes,
                },
            );
        }
    }

    plan
}

/// Order tables so referenced tables come before the tables referencing
/// them. Cycles keep their input order.
pub fn sort_tables(tables: &[Table]) -> Vec<&Table> {
    let mut sorted: Vec<&Table> = tables.iter().collect();
    for _ in 0..sorted.len() {
        for table in tables {
            for field in &table.fields {
                let Some(reference) = &field.references else {
                    continue;
                };
                let Some(self_index) = sorted.iter().position(|entry| entry.name == table.name)
                else {
                    continue;
                };
                let Some(other_index) = sorted
                    .iter()
                    .position(|entry| entry.name == reference.table)
                else {
                    continue;
                };
                if other_index <= self_index {
                    continue;
                }
                sorted.swap(self_index, other_index);
            }
        }
    }
    sorted
}

fn diff_fields(existing: &Table, desired: &Table) -> (Vec<Change>, Vec<Change>) {
    let mut up = Vec::new();
    let mut down = Vec::new();

    for field in &desired.fields {
        if let Some(existing_field) = existing.field(&field.name) {
            compare_column(field, existing_field, &mut up, &mut down);
        }
    }

    for field in &desired.fields {
        if existing.field(&field.name).is_none() {
            up.push(Change::AddColumn(field.clone()));
            down.insert(0, Change::DropColumn(field.name.clone()));
        }
    }

    for existing_field in &existing.fields {
        // created_at/updated_at are commonly maintained outside the ERD;
        // never drop them.
        if matches!(existing_field.name.as_str(), "created_at" | "updated_at") {
            continue;
        }
        if desired.field(&existing_field.name).is_none() {
            up.push(Change::DropColumn(existing_field.name.clone()));
            down.insert(0, Change::AddColumn(existing_field.clone()));
        }
    }

    (up, down)
}

fn compare_column(field: &Field, existing: &Field, up: &mut Vec<Change>, down: &mut Vec<Change>) {
    let name = field.name.clone();

    if field.typ != existing.typ || field.is_unsigned != existing.is_unsigned {
        up.push(Change::AlterType {
            field: name.clone(),
            typ: field.typ.clone(),
            is_unsigned: field.is_unsigned,
        });
        down.insert(
            0,
            Change::AlterType {
                field: name.clone(),
                typ: existing.typ.clone(),
                is_unsigned: existing.is_unsigned,
            },
        );
    }

    if field.is_primary_key != existing.is_primary_key {
        up.push(Change::SetPrimaryKey {
            field: name.clone(),
            is_primary_key: field.is_primary_key,
        });
        down.insert(
            0,
            Change::SetPrimaryKey {
                field: name.clone(),
                is_primary_key: existing.is_primary_key,
            },
        );
    }

    if field.is_unique != existing.is_unique {
        up.push(Change::SetUnique {
            field: name.clone(),
            is_unique: field.is_unique,
        });
        down.insert(
            0,
            Change::SetUnique {
                field: name.clone(),
                is_unique: existing.is_unique,
            },
        );
    }

    if field.is_null != existing.is_null {
        up.push(Change::SetNullable {
            field: name.clone(),
            is_null: field.is_null,
        });
        down.insert(
            0,
            Change::SetNullable {
                field: name.clone(),
                is_null: existing.is_null,
            },
        );
    }

    match (&field.references, &existing.references) {
        (Some(references), None) => {
            up.push(Change::AddForeignKey {
                field: name.clone(),
                references: references.clone(),
            });
            down.insert(0, Change::DropForeignKey { field: name });
        }
        (None, Some(existing_references)) => {
            up.push(Change::DropForeignKey {
                field: name.clone(),
            });
            down.insert(
                0,
                Change::AddForeignKey {
                    field: name,
                    references: existing_references.clone(),
                },
            );
        }
        (Some(references), Some(existing_references))
            if !references.same_target(existing_references) =>
        {
            // The old constraint must be gone before the new one appears,
            // in both directions independently.
            up.push(Change::DropForeignKey {
                field: name.clone(),
            });
            down.insert(
                0,
                Change::AddForeignKey {
                    field: name.clone(),
                    references: existing_references.clone(),
                },
            );
            up.push(Change::AddForeignKey {
                field: name.clone(),
                references: references.clone(),
            });
            down.insert(0, Change::DropForeignKey { field: name });
        }
        _ => {}
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateTable(table) => {
                let fields: Vec<String> = table.fields.iter().map(field_to_string).collect();
                write!(f, "create table {} ({})", table.name, fields.join(", "))
            }
            Operation::DropTable(name) => write!(f, "drop table {name}"),
            Operation::AlterTable { table, changes } => {
                let changes: Vec<String> = changes.iter().map(Change::to_string).collect();
                write!(f, "alter table {}: {}", table, changes.join("; "))
            }
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::AddColumn(field) => write!(f, "add column {}", field_to_string(field)),
            Change::DropColumn(name) => write!(f, "drop column {name}"),
            Change::AlterType {
                field,
                typ,
                is_unsigned,
            } => {
                write!(f, "alter column {field} type to {typ}")?;
                if *is_unsigned {
                    write!(f, " unsigned")?;
                }
                Ok(())
            }
            Change::SetPrimaryKey {
                field,
                is_primary_key: true,
            } => write!(f, "set primary key on {field}"),
            Change::SetPrimaryKey { field, .. } => write!(f, "drop primary key on {field}"),
            Change::SetUnique {
                field,
                is_unique: true,
            } => write!(f, "set unique on {field}"),
            Change::SetUnique { field, .. } => write!(f, "drop unique on {field}"),
            Change::SetNullable {
                field,
                is_null: true,
            } => write!(f, "set column {field} nullable"),
            Change::SetNullable { field, .. } => write!(f, "set column {field} not nullable"),
            Change::AddForeignKey { field, references } => write!(
                f,
                "add foreign key {field} references {}.{}",
                references.table, references.field
            ),
            Change::DropForeignKey { field } => write!(f, "drop foreign key {field}"),
        }
    }
}
