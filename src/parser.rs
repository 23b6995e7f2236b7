//! Line-oriented parser for ERD text.

use crate::ast::{
    format_enum, Field, FieldReference, Position, RelationType, Schema, Table, TablePosition,
};
use regex::Regex;
use std::sync::LazyLock;

const DEFAULT_FIELD_TYPE: &str = "integer";

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("expected a name, got: {line:?}")]
    Name { line: String },
    #[error("expected a table header delimiter after: {line:?}")]
    TableHeader { line: String },
    #[error("expected a field name after '.', got: {line:?}")]
    ForeignKeyReference { line: String },
    #[error("unexpected trailing text on field line: {line:?}")]
    TrailingTokens { line: String },
}

/// Parse ERD text into a [`Schema`].
pub fn parse(input: &str) -> Result<Schema, ParseError> {
    Parser::new(input).parse()
}

/// One parse call owns one cursor; never reused across inputs.
pub struct Parser<'a> {
    input: &'a str,
    lines: Vec<String>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        let lines = input
            .lines()
            .map(strip_comment)
            .filter(|line| !line.is_empty())
            .collect();
        Self {
            input,
            lines,
            pos: 0,
        }
    }

    pub fn parse(&mut self) -> Result<Schema, ParseError> {
        let mut tables = Vec::new();
        while self.pos < self.lines.len() {
            if !self.at_table_header() {
                return Err(ParseError::TableHeader {
                    line: self.lines[self.pos].clone(),
                });
            }
            tables.push(self.parse_table()?);
        }
        let mut schema = Schema::from_tables(tables);
        self.apply_metadata(&mut schema);
        Ok(schema)
    }

    /// Lookahead predicate: a name line followed by a `-+` delimiter line.
    fn at_table_header(&self) -> bool {
        match (self.lines.get(self.pos), self.lines.get(self.pos + 1)) {
            (Some(name), Some(delimiter)) => !name.is_empty() && is_dash_line(delimiter),
            _ => false,
        }
    }

    fn parse_table(&mut self) -> Result<Table, ParseError> {
        let header = self.lines[self.pos].clone();
        let mut rest = header.as_str();
        let name = take_name(&mut rest).ok_or(ParseError::Name {
            line: header.clone(),
        })?;
        self.pos += 2; // name line + delimiter line

        let mut table = Table::new(name);
        while self.pos < self.lines.len() && !self.at_table_header() {
            let line = self.lines[self.pos].clone();
            table.fields.push(parse_field(&line)?);
            self.pos += 1;
        }
        table.infer_primary_key();
        Ok(table)
    }

    /// Second pass: scan the whole original input for metadata lines. They
    /// are independent of table structure and may appear anywhere.
    fn apply_metadata(&self, schema: &mut Schema) {
        for raw in self.input.lines() {
            let line = raw.trim();
            if let Some(captures) = ZOOM_RE.captures(line) {
                schema.zoom = captures[1].parse().ok();
            } else if let Some(captures) = VIEW_RE.captures(line) {
                if let (Ok(x), Ok(y)) = (captures[1].parse(), captures[2].parse()) {
                    schema.view = Some(Position { x, y });
                }
            } else if let Some(captures) = THEME_RE.captures(line) {
                let color = Some(captures[2].to_string());
                let theme = &mut schema.theme;
                match &captures[1] {
                    "text_bg_color" => theme.text_bg_color = color,
                    "text_color" => theme.text_color = color,
                    "diagram_bg_color" => theme.diagram_bg_color = color,
                    "diagram_text_color" => theme.diagram_text_color = color,
                    "table_bg_color" => theme.table_bg_color = color,
                    "table_text_color" => theme.table_text_color = color,
                    _ => {}
                }
            } else if let Some(captures) = TABLE_POS_RE.captures(line) {
                let name = &captures[1];
                let Some(table) = schema.tables.iter_mut().find(|table| table.name == name)
                else {
                    continue;
                };
                if let (Ok(x), Ok(y)) = (captures[2].parse(), captures[3].parse()) {
                    table.position = Some(TablePosition {
                        x,
                        y,
                        color: captures.get(4).map(|color| color.as_str().to_string()),
                    });
                }
            }
        }
    }
}

static ZOOM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^# zoom: ([0-9.]+)$").unwrap());
static VIEW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^# view: \((-?[0-9.]+), (-?[0-9.]+)\)$").unwrap());
static TABLE_POS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^# (\w+) \((-?[0-9.]+), (-?[0-9.]+)(?:, (#[0-9a-fA-F]{3,8}))?\)$").unwrap()
});
static THEME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^# (text_bg_color|text_color|diagram_bg_color|diagram_text_color|table_bg_color|table_text_color): (#[0-9a-fA-F]{3,8})$",
    )
    .unwrap()
});

/// Strip trailing `#...`/`//...` comments, but keep an all-dash line intact:
/// it is a table-header delimiter, not a comment.
fn strip_comment(raw: &str) -> String {
    let line = raw.trim();
    if is_dash_line(line) {
        return line.to_string();
    }
    let line = match line.find('#') {
        Some(index) => &line[..index],
        None => line,
    };
    let line = match line.find("//") {
        Some(index) => &line[..index],
        None => line,
    };
    line.trim().to_string()
}

fn is_dash_line(line: &str) -> bool {
    !line.is_empty() && line.chars().all(|c| c == '-')
}

fn parse_field(line: &str) -> Result<Field, ParseError> {
    let mut rest = line;
    let name = take_name(&mut rest).ok_or(ParseError::Name { line: line.into() })?;
    let mut field = Field::new(name, "");
    let mut typ: Option<String> = None;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        let Some(token) = take_token(&mut rest) else {
            // Leftover text that does not tokenize at all.
            if typ.is_some() {
                return Err(ParseError::TrailingTokens { line: line.into() });
            }
            log::warn!("ignoring unrecognized text on field line: {line:?}");
            break;
        };
        match token.to_uppercase().as_str() {
            "NULL" => field.is_null = true,
            "UNIQUE" => field.is_unique = true,
            "UNSIGNED" => field.is_unsigned = true,
            "PK" => field.is_primary_key = true,
            "FK" => field.references = Some(parse_reference(&field.name, &mut rest, line)?),
            "DEFAULT" => field.default_value = take_default_value(&mut rest),
            _ => {
                if typ.is_none() {
                    typ = Some(collect_type(token, &mut rest));
                } else {
                    // Deliberate leniency: unknown annotations are tolerated.
                    log::warn!("ignoring unknown token {token:?} on field line: {line:?}");
                }
            }
        }
    }

    field.typ = match typ {
        Some(typ) if typ.to_lowercase().starts_with("enum") => format_enum(&typ),
        Some(typ) => typ,
        None => DEFAULT_FIELD_TYPE.to_string(),
    };
    Ok(field)
}

/// `FK [<rel>] [<table>[.<field>]]`. A bare `fk` on a `x_id` field expands to
/// `references x.id` with the default `>0-` relation.
fn parse_reference(
    field_name: &str,
    rest: &mut &str,
    line: &str,
) -> Result<FieldReference, ParseError> {
    *rest = rest.trim_start();

    let mut typ = RelationType::DEFAULT;
    if let Some(word) = rest.split_whitespace().next() {
        if let Some(relation) = RelationType::parse(word) {
            typ = relation;
            *rest = rest[word.len()..].trim_start();
        }
    }

    let table = match peek_is_modifier(rest) {
        true => default_reference_table(field_name),
        false => take_name(rest).unwrap_or_else(|| default_reference_table(field_name)),
    };

    let field = if let Some(after_dot) = rest.strip_prefix('.') {
        *rest = after_dot;
        take_name(rest).ok_or(ParseError::ForeignKeyReference { line: line.into() })?
    } else {
        "id".to_string()
    };

    Ok(FieldReference { table, field, typ })
}

/// The word after `fk` is a target table only when it is not itself a
/// modifier keyword (`user_id fk default 0` has no explicit target).
fn peek_is_modifier(rest: &str) -> bool {
    match rest.split_whitespace().next() {
        Some(word) => matches!(
            word.to_uppercase().as_str(),
            "NULL" | "UNIQUE" | "UNSIGNED" | "PK" | "FK" | "DEFAULT"
        ),
        None => false,
    }
}

fn default_reference_table(field_name: &str) -> String {
    match field_name.strip_suffix("_id") {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => field_name.to_string(),
    }
}

/// Leading `[A-Za-z0-9_]+` run.
fn take_name(rest: &mut &str) -> Option<String> {
    *rest = rest.trim_start();
    let end = rest
        .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    let name = rest[..end].to_string();
    *rest = &rest[end..];
    Some(name)
}

/// Leading modifier/type token: a run of word characters plus the
/// punctuation that appears inside type text (`varchar(32)`, `enum('a','b')`).
fn take_token(rest: &mut &str) -> Option<String> {
    *rest = rest.trim_start();
    let end = rest
        .find(|c: char| {
            !c.is_ascii_alphanumeric() && !matches!(c, '_' | '(' | ')' | ',' | '"' | '\'')
        })
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    let token = rest[..end].to_string();
    *rest = &rest[end..];
    Some(token)
}

/// An `enum(` type may contain spaces between values; keep consuming tokens
/// until its parentheses balance.
fn collect_type(first: String, rest: &mut &str) -> String {
    let mut typ = first;
    if typ.to_lowercase().starts_with("enum") {
        while paren_depth(&typ) > 0 {
            *rest = rest.trim_start();
            match take_token(rest) {
                Some(token) => typ.push_str(&token),
                None => break,
            }
        }
    }
    typ
}

fn paren_depth(text: &str) -> i32 {
    text.chars().fold(0, |depth, c| match c {
        '(' => depth + 1,
        ')' => depth - 1,
        _ => depth,
    })
}

/// One default value: quoted (`'...'`, `"..."`, backtick) or a run up to the
/// next space. The raw literal text is preserved, quotes included.
fn take_default_value(rest: &mut &str) -> Option<String> {
    *rest = rest.trim_start();
    if rest.is_empty() {
        return None;
    }
    let quote = rest.chars().next().filter(|&c| matches!(c, '\'' | '"' | '`'));
    let value = match quote {
        Some(quote) => match rest[1..].find(quote) {
            Some(index) => {
                let end = index + 2;
                let value = rest[..end].to_string();
                *rest = &rest[end..];
                value
            }
            None => {
                let value = rest.to_string();
                *rest = "";
                value
            }
        },
        None => {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            let value = rest[..end].to_string();
            *rest = &rest[end..];
            value
        }
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_single_table(text: &str) -> Table {
        let schema = parse(text).unwrap();
        assert_eq!(schema.tables.len(), 1);
        schema.tables.into_iter().next().unwrap()
    }

    #[test]
    fn test_parse_varchar() {
        let table = parse_single_table(
            "
user
----
id pk
username varchar(32)
",
        );
        assert_eq!(table.fields.len(), 2);
        assert_eq!(table.fields[1].name, "username");
        assert_eq!(table.fields[1].typ, "varchar(32)");
    }

    #[test]
    fn test_parse_datetime() {
        let table = parse_single_table(
            "
user
----
created_at datetime
",
        );
        assert_eq!(table.fields[0].name, "created_at");
        assert_eq!(table.fields[0].typ, "datetime");
    }

    #[test]
    fn test_parse_unsigned_type() {
        let table = parse_single_table(
            "
user
----
id int(10) unsigned PK
level int(10)
score int(10) unsigned
",
        );
        assert_eq!(table.fields[0].typ, "int(10)");
        assert!(table.fields[0].is_unsigned);
        assert!(table.fields[0].is_primary_key);
        assert!(!table.fields[1].is_unsigned);
        assert!(table.fields[2].is_unsigned);
    }

    #[test]
    fn test_default_field_type_is_integer() {
        let table = parse_single_table("user\n----\nid\n");
        assert_eq!(table.fields[0].typ, "integer");
    }

    #[test]
    fn test_infers_id_as_primary_key() {
        let table = parse_single_table(
            "
user
----
id
username text
",
        );
        assert!(table.fields[0].is_primary_key);
        assert!(!table.fields[1].is_primary_key);
    }

    #[test]
    fn test_no_inference_when_primary_key_is_marked() {
        let table = parse_single_table(
            "
user
----
id
user_id pk
username text
",
        );
        assert!(!table.fields[0].is_primary_key);
        assert!(table.fields[1].is_primary_key);
        assert!(!table.fields[2].is_primary_key);
    }

    #[test]
    fn test_parse_unique_field() {
        let table = parse_single_table(
            "
user
----
username text unique
domain text
",
        );
        assert!(table.fields[0].is_unique);
        assert!(!table.fields[1].is_unique);
    }

    #[test]
    fn test_parse_null_modifier() {
        let table = parse_single_table("user\n----\nnickname text NULL\n");
        assert!(table.fields[0].is_null);
    }

    #[test]
    fn test_foreign_key_shorthand() {
        let table = parse_single_table("post\n----\nid\nuser_id fk\n");
        let reference = table.fields[1].references.as_ref().unwrap();
        assert_eq!(reference.table, "user");
        assert_eq!(reference.field, "id");
        assert_eq!(reference.typ, RelationType::ZeroOrManyToOne);
    }

    #[test]
    fn test_foreign_key_with_relation_and_table() {
        let table = parse_single_table("product\n----\nid\nowner_id fk >0- user\n");
        let reference = table.fields[1].references.as_ref().unwrap();
        assert_eq!(reference.table, "user");
        assert_eq!(reference.field, "id");
        assert_eq!(reference.typ, RelationType::ZeroOrManyToOne);
    }

    #[test]
    fn test_foreign_key_with_explicit_field() {
        let table = parse_single_table("post\n----\nauthor_id fk >- user.uid\n");
        let reference = table.fields[0].references.as_ref().unwrap();
        assert_eq!(reference.table, "user");
        assert_eq!(reference.field, "uid");
        assert_eq!(reference.typ, RelationType::ManyToOne);
    }

    #[test]
    fn test_foreign_key_malformed_field_continuation() {
        let result = parse("post\n----\nauthor_id fk >- user.\n");
        assert!(matches!(
            result,
            Err(ParseError::ForeignKeyReference { .. })
        ));
    }

    #[test]
    fn test_default_values() {
        let table = parse_single_table(
            "
user
----
score integer default 0
nickname text default 'anonymous'
",
        );
        assert_eq!(table.fields[0].default_value.as_deref(), Some("0"));
        assert_eq!(
            table.fields[1].default_value.as_deref(),
            Some("'anonymous'")
        );
    }

    #[test]
    fn test_enum_type_is_normalized() {
        let table = parse_single_table("user\n----\nstatus enum(active, banned)\n");
        assert_eq!(table.fields[0].typ, "enum('active','banned')");
    }

    #[test]
    fn test_comments_are_stripped() {
        let table = parse_single_table(
            "
# a leading note
user
----
id # inline comment
username text // another note
",
        );
        assert_eq!(table.fields.len(), 2);
        assert_eq!(table.fields[1].typ, "text");
    }

    #[test]
    fn test_unknown_trailing_tokens_are_tolerated() {
        let table = parse_single_table("user\n----\nid integer auto_increment\n");
        assert_eq!(table.fields[0].typ, "integer");
    }

    #[test]
    fn test_untokenizable_trailing_text_fails() {
        let result = parse("user\n----\nid integer %%%\n");
        assert!(matches!(result, Err(ParseError::TrailingTokens { .. })));
    }

    #[test]
    fn test_line_without_table_header_fails() {
        let result = parse("user\nid integer\n");
        assert!(matches!(result, Err(ParseError::TableHeader { .. })));
    }

    #[test]
    fn test_empty_input_yields_empty_schema() {
        let schema = parse("").unwrap();
        assert!(schema.tables.is_empty());
    }

    #[test]
    fn test_multiple_tables() {
        let schema = parse(
            "
user
----
id
username text

post
----
id
user_id fk
",
        )
        .unwrap();
        assert_eq!(schema.tables.len(), 2);
        assert_eq!(schema.tables[1].name, "post");
    }

    #[test]
    fn test_metadata_lines() {
        let schema = parse(
            "
user
----
id

# zoom: 0.895
# view: (12, 34)
# user (56, 78, #112233)
# table_bg_color: #aabbcc
",
        )
        .unwrap();
        assert_eq!(schema.zoom, Some(0.895));
        let view = schema.view.unwrap();
        assert_eq!((view.x, view.y), (12.0, 34.0));
        let position = schema.tables[0].position.as_ref().unwrap();
        assert_eq!((position.x, position.y), (56.0, 78.0));
        assert_eq!(position.color.as_deref(), Some("#112233"));
        assert_eq!(schema.theme.table_bg_color.as_deref(), Some("#aabbcc"));
    }

    #[test]
    fn test_position_for_unknown_table_is_ignored() {
        let schema = parse("user\n----\nid\n\n# ghost (1, 2)\n").unwrap();
        assert!(schema.tables[0].position.is_none());
    }
}
