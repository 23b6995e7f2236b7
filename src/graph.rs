//! Bidirectional navigable graph over an immutable schema model.
//!
//! Nodes live in an arena indexed by [`TableId`]/[`FieldId`]; all navigation
//! goes through the arena, so the model itself is never mutated and carries
//! no back-pointers.

use crate::ast::{Field, Table};
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("table not found: {0:?}")]
    TableNotFound(String),
    #[error("field not found: {table}.{field}")]
    FieldNotFound { table: String, field: String },
    #[error("duplicate table name: {0:?}")]
    DuplicateTable(String),
    #[error("{table}.{field} references unknown table {target:?}")]
    UnknownReferencedTable {
        table: String,
        field: String,
        target: String,
    },
    #[error("{table}.{field} references unknown field {target_table}.{target_field}")]
    UnknownReferencedField {
        table: String,
        field: String,
        target_table: String,
        target_field: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId {
    pub table: TableId,
    pub index: usize,
}

/// A resolved foreign-key edge.
#[derive(Debug, Clone)]
pub struct ReferenceEdge {
    pub from: FieldId,
    pub to: FieldId,
    /// Natural join alias for the referenced table: the referencing field
    /// name with a trailing `_id` stripped, suppressed when it would equal
    /// the referenced table's own name.
    pub alias: Option<String>,
}

pub struct SchemaGraph<'a> {
    tables: &'a [Table],
    index: HashMap<&'a str, TableId>,
    /// Outgoing edge per field, shaped like `tables[t].fields[f]`.
    outgoing: Vec<Vec<Option<ReferenceEdge>>>,
    /// Per table: the fields of other tables that reference it.
    incoming: Vec<Vec<FieldId>>,
}

impl<'a> SchemaGraph<'a> {
    /// Build the graph, validating model consistency: duplicate table names
    /// and dangling references fail here, not at parse time.
    pub fn build(tables: &'a [Table]) -> Result<Self, GraphError> {
        let mut index = HashMap::new();
        for (position, table) in tables.iter().enumerate() {
            if index.insert(table.name.as_str(), TableId(position)).is_some() {
                return Err(GraphError::DuplicateTable(table.name.clone()));
            }
        }

        let mut outgoing = Vec::with_capacity(tables.len());
        let mut incoming = vec![Vec::new(); tables.len()];
        for (table_pos, table) in tables.iter().enumerate() {
            let mut edges = Vec::with_capacity(table.fields.len());
            for (field_pos, field) in table.fields.iter().enumerate() {
                let Some(reference) = &field.references else {
                    edges.push(None);
                    continue;
                };
                let target_table = index.get(reference.table.as_str()).copied().ok_or_else(
                    || GraphError::UnknownReferencedTable {
                        table: table.name.clone(),
                        field: field.name.clone(),
                        target: reference.table.clone(),
                    },
                )?;
                let target_index = tables[target_table.0]
                    .fields
                    .iter()
                    .position(|target| target.name == reference.field)
                    .ok_or_else(|| GraphError::UnknownReferencedField {
                        table: table.name.clone(),
                        field: field.name.clone(),
                        target_table: reference.table.clone(),
                        target_field: reference.field.clone(),
                    })?;
                let from = FieldId {
                    table: TableId(table_pos),
                    index: field_pos,
                };
                let to = FieldId {
                    table: target_table,
                    index: target_index,
                };
                incoming[target_table.0].push(from);
                edges.push(Some(ReferenceEdge {
                    from,
                    to,
                    alias: join_alias(&field.name, &reference.table),
                }));
            }
            outgoing.push(edges);
        }

        Ok(Self {
            tables,
            index,
            outgoing,
            incoming,
        })
    }

    pub fn table(&self, name: &str) -> Result<TableId, GraphError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::TableNotFound(name.to_string()))
    }

    pub fn field(&self, table: TableId, name: &str) -> Result<FieldId, GraphError> {
        self.tables[table.0]
            .fields
            .iter()
            .position(|field| field.name == name)
            .map(|index| FieldId { table, index })
            .ok_or_else(|| GraphError::FieldNotFound {
                table: self.tables[table.0].name.clone(),
                field: name.to_string(),
            })
    }

    pub fn table_data(&self, id: TableId) -> &Table {
        &self.tables[id.0]
    }

    pub fn table_name(&self, id: TableId) -> &str {
        &self.tables[id.0].name
    }

    pub fn field_data(&self, id: FieldId) -> &Field {
        &self.tables[id.table.0].fields[id.index]
    }

    pub fn field_name(&self, id: FieldId) -> &str {
        &self.field_data(id).name
    }

    /// The field's resolved outgoing reference, if any.
    pub fn reference(&self, id: FieldId) -> Option<&ReferenceEdge> {
        self.outgoing[id.table.0][id.index].as_ref()
    }

    /// Fields of other tables that reference this table.
    pub fn incoming(&self, id: TableId) -> &[FieldId] {
        &self.incoming[id.0]
    }
}

fn join_alias(field_name: &str, target_table: &str) -> Option<String> {
    if field_name == "id" {
        return None;
    }
    let alias = field_name.strip_suffix("_id").unwrap_or(field_name);
    if alias.is_empty() || alias == target_table {
        None
    } else {
        Some(alias.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn sample() -> Vec<Table> {
        parse(
            "
user
----
id
username text

product
-------
id
owner_id fk >0- user
name text
",
        )
        .unwrap()
        .tables
    }

    #[test]
    fn test_forward_and_reverse_links() {
        let tables = sample();
        let graph = SchemaGraph::build(&tables).unwrap();
        let product = graph.table("product").unwrap();
        let owner_id = graph.field(product, "owner_id").unwrap();

        let edge = graph.reference(owner_id).unwrap();
        assert_eq!(graph.table_name(edge.to.table), "user");
        assert_eq!(graph.field_name(edge.to), "id");

        let user = graph.table("user").unwrap();
        assert_eq!(graph.incoming(user), &[owner_id]);
    }

    #[test]
    fn test_join_alias_stripped_from_field_name() {
        let tables = sample();
        let graph = SchemaGraph::build(&tables).unwrap();
        let product = graph.table("product").unwrap();
        let owner_id = graph.field(product, "owner_id").unwrap();
        assert_eq!(graph.reference(owner_id).unwrap().alias.as_deref(), Some("owner"));
    }

    #[test]
    fn test_join_alias_suppressed_when_equal_to_table_name() {
        let tables = parse("user\n----\nid\n\npost\n----\nid\nuser_id fk\n")
            .unwrap()
            .tables;
        let graph = SchemaGraph::build(&tables).unwrap();
        let post = graph.table("post").unwrap();
        let user_id = graph.field(post, "user_id").unwrap();
        assert!(graph.reference(user_id).unwrap().alias.is_none());
    }

    #[test]
    fn test_lookups_fail_fast() {
        let tables = sample();
        let graph = SchemaGraph::build(&tables).unwrap();
        assert!(matches!(
            graph.table("missing"),
            Err(GraphError::TableNotFound(_))
        ));
        let user = graph.table("user").unwrap();
        assert!(matches!(
            graph.field(user, "missing"),
            Err(GraphError::FieldNotFound { .. })
        ));
    }

    #[test]
    fn test_reference_to_unknown_table_is_inconsistent() {
        let tables = parse("post\n----\nid\nauthor_id fk >- user\n").unwrap().tables;
        assert!(matches!(
            SchemaGraph::build(&tables),
            Err(GraphError::UnknownReferencedTable { .. })
        ));
    }

    #[test]
    fn test_reference_to_unknown_field_is_inconsistent() {
        let tables = parse("user\n----\nid\n\npost\n----\nauthor_id fk >- user.uid\n")
            .unwrap()
            .tables;
        assert!(matches!(
            SchemaGraph::build(&tables),
            Err(GraphError::UnknownReferencedField { .. })
        ));
    }

    #[test]
    fn test_duplicate_table_names_are_rejected() {
        let tables = vec![Table::new("user"), Table::new("user")];
        assert!(matches!(
            SchemaGraph::build(&tables),
            Err(GraphError::DuplicateTable(_))
        ));
    }
}
