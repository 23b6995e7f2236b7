//! Formatter for converting a schema back to canonical ERD text.

use crate::ast::{format_enum, Field, Schema, Table};
use unicode_width::UnicodeWidthStr;

/// Serialize a whole document: table blocks separated by blank lines, then
/// the metadata comment lines. `parse(schema_to_text(s))` is semantically
/// identical to `s`, and formatting canonical text is a no-op.
pub fn schema_to_text(schema: &Schema) -> String {
    let mut output = String::new();

    let mut first = true;
    for table in &schema.tables {
        if table.is_virtual {
            continue;
        }
        if !first {
            output.push('\n');
        }
        first = false;
        output.push_str(&table_to_string(table));
    }

    let metadata = metadata_lines(schema);
    if !metadata.is_empty() {
        output.push('\n');
        for line in metadata {
            output.push_str(&line);
            output.push('\n');
        }
    }

    output
}

/// One table block: name, a dash ruler as wide as the name, one field per
/// line.
pub fn table_to_string(table: &Table) -> String {
    let mut output = String::new();
    output.push_str(&table.name);
    output.push('\n');
    output.push_str(&"-".repeat(UnicodeWidthStr::width(table.name.as_str()).max(1)));
    output.push('\n');
    for field in &table.fields {
        output.push_str(&field_to_string(field));
        output.push('\n');
    }
    output
}

/// Modifier order: type, `unsigned`, `NULL`, `unique`, `PK`, `FK`, `default`.
pub fn field_to_string(field: &Field) -> String {
    let typ = if field.typ.to_lowercase().starts_with("enum") {
        format_enum(&field.typ)
    } else {
        field.typ.clone()
    };
    let mut text = format!("{} {}", field.name, typ);
    if field.is_unsigned {
        text.push_str(" unsigned");
    }
    if field.is_null {
        text.push_str(" NULL");
    }
    if field.is_unique {
        text.push_str(" unique");
    }
    if field.is_primary_key {
        text.push_str(" PK");
    }
    if let Some(reference) = &field.references {
        text.push_str(&format!(
            " FK {} {}.{}",
            reference.typ.as_str(),
            reference.table,
            reference.field
        ));
    }
    if let Some(value) = &field.default_value {
        text.push_str(&format!(" default {value}"));
    }
    text
}

fn metadata_lines(schema: &Schema) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(zoom) = schema.zoom {
        lines.push(format!("# zoom: {zoom:.3}"));
    }
    if let Some(view) = schema.view {
        lines.push(format!("# view: ({:.0}, {:.0})", view.x, view.y));
    }
    let theme = &schema.theme;
    for (channel, color) in [
        ("text_bg_color", &theme.text_bg_color),
        ("text_color", &theme.text_color),
        ("diagram_bg_color", &theme.diagram_bg_color),
        ("diagram_text_color", &theme.diagram_text_color),
        ("table_bg_color", &theme.table_bg_color),
        ("table_text_color", &theme.table_text_color),
    ] {
        if let Some(color) = color {
            lines.push(format!("# {channel}: {color}"));
        }
    }
    for table in &schema.tables {
        if let Some(position) = &table.position {
            let mut line = format!("# {} ({:.0}, {:.0}", table.name, position.x, position.y);
            if let Some(color) = &position.color {
                line.push_str(&format!(", {color}"));
            }
            line.push(')');
            lines.push(line);
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FieldReference, RelationType};
    use crate::parser::parse;

    #[test]
    fn test_ruler_matches_table_name_length() {
        let text = schema_to_text(&parse("post\n-\nid\n").unwrap());
        assert!(text.contains("post\n----\n"));
    }

    #[test]
    fn test_ruler_uses_display_width() {
        let mut table = Table::new("ユーザー");
        table.fields.push(Field::new("id", "integer"));
        assert!(table_to_string(&table).contains(&"-".repeat(8)));
    }

    #[test]
    fn test_default_column_type_is_integer() {
        let text = schema_to_text(&parse("post\n-\nid\n").unwrap());
        assert!(text.contains("id integer"));
    }

    #[test]
    fn test_inferred_primary_key_is_emitted() {
        let text = schema_to_text(&parse("post\n-\nid\nuser_id fk\n").unwrap());
        let line = text.lines().find(|line| line.starts_with("id ")).unwrap();
        assert!(line.contains(" PK"));
    }

    #[test]
    fn test_foreign_key_shorthand_is_expanded() {
        let text = schema_to_text(&parse("post\n-\nid\nuser_id fk\n").unwrap());
        let line = text
            .lines()
            .find(|line| line.starts_with("user_id "))
            .unwrap();
        assert!(line.contains("FK >0- user.id"));
    }

    #[test]
    fn test_modifier_order() {
        let mut field = Field::new("owner_id", "int");
        field.is_unsigned = true;
        field.is_null = true;
        field.is_unique = true;
        field.is_primary_key = true;
        field.references = Some(FieldReference {
            table: "user".into(),
            field: "id".into(),
            typ: RelationType::ManyToOne,
        });
        field.default_value = Some("0".into());
        assert_eq!(
            field_to_string(&field),
            "owner_id int unsigned NULL unique PK FK >- user.id default 0"
        );
    }

    #[test]
    fn test_enum_type_is_normalized() {
        let field = Field::new("status", "enum(t,f)");
        assert_eq!(field_to_string(&field), "status enum('t','f')");
    }

    #[test]
    fn test_virtual_tables_are_not_emitted() {
        let mut shadow = Table::new("search_index_data");
        shadow.is_virtual = true;
        let schema = Schema::from_tables(vec![
            {
                let mut table = Table::new("user");
                table.fields.push(Field::new("id", "integer"));
                table
            },
            shadow,
        ]);
        let text = schema_to_text(&schema);
        assert!(text.contains("user\n"));
        assert!(!text.contains("search_index_data"));
    }

    #[test]
    fn test_metadata_lines_are_preserved() {
        let source = "
post
-
id
user_id fk

# zoom: 0.895
# view: (12, 34)
# post (56, 78)
";
        let text = schema_to_text(&parse(source).unwrap());
        assert!(text.contains("# zoom: 0.895"));
        assert!(text.contains("# view: (12, 34)"));
        assert!(text.contains("# post (56, 78)"));
    }

    #[test]
    fn test_round_trip_is_semantically_identity() {
        let source = "
user
----
id
username varchar(32) unique
created_at datetime

post
----
id
author_id fk >- user
status enum('draft','live') default 'draft'

# zoom: 1.250
# view: (0, 0)
# user (10, 20, #112233)
";
        let schema = parse(source).unwrap();
        let reparsed = parse(&schema_to_text(&schema)).unwrap();
        assert_eq!(schema, reparsed);
    }

    #[test]
    fn test_format_is_noop_on_canonical_text() {
        let canonical = "user\n----\nid integer PK\nusername text unique\n\npost\n----\nid integer PK\nuser_id integer FK >0- user.id\n\n# zoom: 1.000\n# user (10, 20)\n";
        let schema = parse(canonical).unwrap();
        assert_eq!(schema_to_text(&schema), canonical);
    }
}
