//! Join-path query resolver: turns a set of requested columns into a
//! connected join tree over the schema graph.

use crate::ast::Table;
use crate::graph::{FieldId, GraphError, SchemaGraph, TableId};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub table: String,
    pub field: String,
}

/// Parse the textual request form: one `table.field` per line. Lines that do
/// not look like a column request are skipped.
pub fn parse_columns(text: &str) -> Vec<Column> {
    text.lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.trim().split('.').collect();
            match parts.as_slice() {
                [table, field] if !table.is_empty() && !field.is_empty() => Some(Column {
                    table: table.to_string(),
                    field: field.to_string(),
                }),
                _ => None,
            }
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("cannot join disconnected tables: {}", .tables.join(", "))]
    Disconnected { tables: Vec<String> },
}

/// A resolved query: one root table, the joins reaching every requested
/// table, and the final aliased column list.
#[derive(Debug, Clone, Default)]
pub struct Select {
    pub from: String,
    pub joins: Vec<Join>,
    pub columns: Vec<SelectColumn>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Base name of the joined table.
    pub table: String,
    pub alias: Option<String>,
    /// Join condition, newly joined side first.
    pub on_left: QualifiedColumn,
    pub on_right: QualifiedColumn,
}

/// A column qualified by the instance (table or alias) it is read from.
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedColumn {
    pub table: String,
    pub field: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectColumn {
    pub table: String,
    pub field: String,
    pub alias: Option<String>,
}

impl Select {
    pub fn to_sql(&self) -> String {
        if self.columns.is_empty() {
            return String::new();
        }
        let mut sql = String::from("select");
        for (position, column) in self.columns.iter().enumerate() {
            sql.push_str(if position == 0 { "\n  " } else { "\n, " });
            sql.push_str(&format!("{}.{}", column.table, column.field));
            if let Some(alias) = &column.alias {
                sql.push_str(&format!(" as {alias}"));
            }
        }
        sql.push_str(&format!("\nfrom {}", self.from));
        for join in &self.joins {
            sql.push_str(&format!("\ninner join {}", join.table));
            if let Some(alias) = &join.alias {
                sql.push_str(&format!(" as {alias}"));
            }
            sql.push_str(&format!(
                " on {}.{} = {}.{}",
                join.on_left.table, join.on_left.field, join.on_right.table, join.on_right.field
            ));
        }
        sql
    }
}

/// Resolve `columns` against `tables` and return the join plan.
pub fn generate_query(columns: &[Column], tables: &[Table]) -> Result<Select, QueryError> {
    let graph = SchemaGraph::build(tables)?;
    resolve(columns, &graph)
}

struct Instance {
    table: TableId,
    /// Qualification name: the join alias when one exists, else the table
    /// name.
    name: String,
}

/// A proposed join edge: a requested foreign-key field whose target table is
/// also requested.
struct Candidate {
    from_field: FieldId,
    to_field: FieldId,
    alias: Option<String>,
    emitted: bool,
}

struct Resolution {
    instances: Vec<Instance>,
    joins: Vec<Join>,
    unreachable: Vec<TableId>,
}

pub fn resolve(columns: &[Column], graph: &SchemaGraph) -> Result<Select, QueryError> {
    let mut seen = HashSet::new();
    let mut requests = Vec::new();
    for column in columns {
        if !seen.insert((column.table.as_str(), column.field.as_str())) {
            continue;
        }
        let table = graph.table(&column.table)?;
        requests.push(graph.field(table, &column.field)?);
    }

    if requests.is_empty() {
        return Ok(Select::default());
    }

    let mut best = resolve_from_root(requests[0].table, &requests, graph);

    // Re-rooting heuristic: when the first rooting leaves tables unreachable,
    // retry from each disconnected candidate and keep the best rooting found.
    // This is best-effort, not a full search over all possible roots.
    if !best.unreachable.is_empty() {
        for request in &requests[1..] {
            if !best.unreachable.contains(&request.table) {
                continue;
            }
            let attempt = resolve_from_root(request.table, &requests, graph);
            if attempt.unreachable.len() < best.unreachable.len() {
                best = attempt;
                if best.unreachable.is_empty() {
                    break;
                }
            }
        }
    }

    if !best.unreachable.is_empty() {
        return Err(QueryError::Disconnected {
            tables: best
                .unreachable
                .iter()
                .map(|id| graph.table_name(*id).to_string())
                .collect(),
        });
    }

    Ok(finalize(&best, &requests, graph))
}

fn resolve_from_root(root: TableId, requests: &[FieldId], graph: &SchemaGraph) -> Resolution {
    let requested_tables: HashSet<TableId> =
        requests.iter().map(|request| request.table).collect();
    let requested_fields: HashSet<FieldId> = requests.iter().copied().collect();

    let mut candidates: Vec<Candidate> = requests
        .iter()
        .filter_map(|request| graph.reference(*request))
        .filter(|edge| requested_tables.contains(&edge.to.table))
        .map(|edge| Candidate {
            from_field: edge.from,
            to_field: edge.to,
            alias: edge.alias.clone(),
            emitted: false,
        })
        .collect();

    let mut instances = vec![Instance {
        table: root,
        name: graph.table_name(root).to_string(),
    }];
    let mut joins = Vec::new();

    loop {
        let mut progress = false;

        // Every candidate is emitted once either of its sides is connected;
        // two foreign keys into the same table fan out into two instances.
        for position in 0..candidates.len() {
            let candidate = &candidates[position];
            if candidate.emitted {
                continue;
            }
            let left_connected = has_instance(&instances, candidate.from_field.table);
            let right_connected = has_instance(&instances, candidate.to_field.table);
            if !left_connected && !right_connected {
                continue;
            }
            let candidate = &mut candidates[position];
            candidate.emitted = true;
            progress = true;
            if left_connected {
                join_referenced_side(
                    candidate.from_field,
                    candidate.to_field,
                    candidate.alias.clone(),
                    &mut instances,
                    &mut joins,
                    graph,
                );
            } else {
                join_referencing_side(
                    candidate.from_field,
                    candidate.to_field,
                    &mut instances,
                    &mut joins,
                    graph,
                );
            }
        }

        // Fallback for requests whose table no candidate reaches: the
        // field's own outgoing reference, then any incoming graph edge from
        // a connected table (requested referencing fields take precedence).
        for request in requests {
            let table = request.table;
            if has_instance(&instances, table) {
                continue;
            }
            if let Some(edge) = graph.reference(*request) {
                if has_instance(&instances, edge.to.table) {
                    join_referencing_side(
                        edge.from,
                        edge.to,
                        &mut instances,
                        &mut joins,
                        graph,
                    );
                    progress = true;
                    continue;
                }
            }
            let incoming = graph.incoming(table);
            let pick = incoming
                .iter()
                .copied()
                .find(|from| {
                    requested_fields.contains(from) && has_instance(&instances, from.table)
                })
                .or_else(|| {
                    incoming
                        .iter()
                        .copied()
                        .find(|from| has_instance(&instances, from.table))
                });
            if let Some(edge) = pick.and_then(|from_field| graph.reference(from_field)) {
                join_referenced_side(
                    edge.from,
                    edge.to,
                    edge.alias.clone(),
                    &mut instances,
                    &mut joins,
                    graph,
                );
                progress = true;
            }
        }

        if !progress {
            break;
        }
    }

    let mut unreachable = Vec::new();
    for request in requests {
        if !has_instance(&instances, request.table) && !unreachable.contains(&request.table) {
            unreachable.push(request.table);
        }
    }

    Resolution {
        instances,
        joins,
        unreachable,
    }
}

fn has_instance(instances: &[Instance], table: TableId) -> bool {
    instances.iter().any(|instance| instance.table == table)
}

fn instance_name(instances: &[Instance], table: TableId) -> String {
    instances
        .iter()
        .find(|instance| instance.table == table)
        .map(|instance| instance.name.clone())
        .unwrap_or_default()
}

/// Join the referenced table as a new (possibly aliased) instance:
/// `inner join user as courier on courier.id = shipment.courier_id`.
fn join_referenced_side(
    from_field: FieldId,
    to_field: FieldId,
    alias: Option<String>,
    instances: &mut Vec<Instance>,
    joins: &mut Vec<Join>,
    graph: &SchemaGraph,
) {
    let table = graph.table_name(to_field.table).to_string();
    let name = alias.clone().unwrap_or_else(|| table.clone());
    let connected = instance_name(instances, from_field.table);
    joins.push(Join {
        table,
        alias,
        on_left: QualifiedColumn {
            table: name.clone(),
            field: graph.field_name(to_field).to_string(),
        },
        on_right: QualifiedColumn {
            table: connected,
            field: graph.field_name(from_field).to_string(),
        },
    });
    instances.push(Instance {
        table: to_field.table,
        name,
    });
}

/// Join the referencing table through its own foreign key:
/// `inner join order on order.product_id = product.id`.
fn join_referencing_side(
    from_field: FieldId,
    to_field: FieldId,
    instances: &mut Vec<Instance>,
    joins: &mut Vec<Join>,
    graph: &SchemaGraph,
) {
    let name = graph.table_name(from_field.table).to_string();
    let connected = instance_name(instances, to_field.table);
    joins.push(Join {
        table: name.clone(),
        alias: None,
        on_left: QualifiedColumn {
            table: name.clone(),
            field: graph.field_name(from_field).to_string(),
        },
        on_right: QualifiedColumn {
            table: connected,
            field: graph.field_name(to_field).to_string(),
        },
    });
    instances.push(Instance {
        table: from_field.table,
        name,
    });
}

/// Emit columns per instance (root first, joins in emission order), then
/// table-qualify every field name selected from more than one instance.
fn finalize(resolution: &Resolution, requests: &[FieldId], graph: &SchemaGraph) -> Select {
    let mut columns = Vec::new();
    for instance in &resolution.instances {
        for request in requests {
            if request.table != instance.table {
                continue;
            }
            columns.push(SelectColumn {
                table: instance.name.clone(),
                field: graph.field_name(*request).to_string(),
                alias: None,
            });
        }
    }

    for position in 0..columns.len() {
        let duplicated = columns
            .iter()
            .filter(|column| column.field == columns[position].field)
            .count()
            > 1;
        if duplicated {
            let column = &mut columns[position];
            column.alias = Some(format!("{}_{}", column.table, column.field));
        }
    }

    Select {
        from: resolution.instances[0].name.clone(),
        joins: resolution.joins.clone(),
        columns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn query(schema_text: &str, query_text: &str) -> Result<Select, QueryError> {
        let schema = parse(schema_text.trim()).unwrap();
        let columns = parse_columns(query_text.trim());
        generate_query(&columns, &schema.tables)
    }

    #[test]
    fn test_parse_columns_skips_malformed_lines() {
        let columns = parse_columns("user.username\n\nnot-a-column\na.b.c\nproduct.name\n");
        assert_eq!(
            columns,
            vec![
                Column {
                    table: "user".into(),
                    field: "username".into()
                },
                Column {
                    table: "product".into(),
                    field: "name".into()
                },
            ]
        );
    }

    #[test]
    fn test_joins_tables_according_to_selected_columns() {
        let select = query(
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

order
-----
id
product_id fk

shipment
--------
id
order_id fk
courier_id fk >0- user
",
            "
product.name
order.product_id
shipment.order_id
shipment.courier_id
user.username
",
        )
        .unwrap();
        assert_eq!(
            select.to_sql(),
            "select
  product.name
, order.product_id
, shipment.order_id
, shipment.courier_id
, courier.username
from product
inner join order on order.product_id = product.id
inner join shipment on shipment.order_id = order.id
inner join user as courier on courier.id = shipment.courier_id"
        );
    }

    #[test]
    fn test_aliases_column_names_when_duplicated() {
        let select = query(
            "
product
-------
id
name text
category_id fk

category
--------
id
name text
",
            "
product.id
product.name
product.category_id
category.name
",
        )
        .unwrap();
        assert_eq!(
            select.to_sql(),
            "select
  product.id
, product.name as product_name
, product.category_id
, category.name as category_name
from product
inner join category on category.id = product.category_id"
        );
    }

    #[test]
    fn test_fan_out_when_joined_by_multiple_foreign_keys() {
        let select = query(
            "
post
----
id
author_id fk >- user
editor_id fk >- user

user
----
id
username text
",
            "
post.id
post.author_id
post.editor_id
user.username
",
        )
        .unwrap();
        assert_eq!(
            select.to_sql(),
            "select
  post.id
, post.author_id
, post.editor_id
, author.username as author_username
, editor.username as editor_username
from post
inner join user as author on author.id = post.author_id
inner join user as editor on editor.id = post.editor_id"
        );
    }

    #[test]
    fn test_attaches_through_unrequested_foreign_key() {
        // `owner_id` is not requested; the resolver re-roots at product and
        // reaches user through the incoming edge, alias included.
        let select = query(
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
            "
user.username
product.name
",
        )
        .unwrap();
        assert_eq!(
            select.to_sql(),
            "select
  product.name
, owner.username
from product
inner join user as owner on owner.id = product.owner_id"
        );
    }

    #[test]
    fn test_disconnected_tables_fail_with_names() {
        let result = query(
            "
user
----
id
username text

invoice
-------
id
amount integer
",
            "
user.username
invoice.amount
",
        );
        match result {
            Err(QueryError::Disconnected { tables }) => {
                assert_eq!(tables, vec!["invoice".to_string()]);
            }
            other => panic!("expected disconnected error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_table_is_a_lookup_error() {
        let result = query("user\n----\nid\n", "ghost.id\n");
        assert!(matches!(
            result,
            Err(QueryError::Graph(GraphError::TableNotFound(_)))
        ));
    }

    #[test]
    fn test_empty_request_yields_empty_select() {
        let select = query("user\n----\nid\n", "").unwrap();
        assert_eq!(select.to_sql(), "");
    }

    #[test]
    fn test_single_table_request() {
        let select = query("user\n----\nid\nusername text\n", "user.username\n").unwrap();
        assert_eq!(select.to_sql(), "select\n  user.username\nfrom user");
    }

    #[test]
    fn test_duplicate_requests_are_deduplicated() {
        let select = query(
            "user\n----\nid\nusername text\n",
            "user.username\nuser.username\n",
        )
        .unwrap();
        assert_eq!(select.columns.len(), 1);
    }
}
