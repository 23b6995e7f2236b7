//! Schema model shared by the parser, formatter, graph, resolver and differ.

use regex::Regex;
use std::sync::LazyLock;

/// A parsed ERD document: the table list plus the view-state metadata that
/// rides along in trailing comment lines.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    pub tables: Vec<Table>,
    pub zoom: Option<f64>,
    pub view: Option<Position>,
    pub theme: Theme,
}

impl Schema {
    pub fn from_tables(tables: Vec<Table>) -> Self {
        Self {
            tables,
            ..Self::default()
        }
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|table| table.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub fields: Vec<Field>,
    /// Engine-internal tables (e.g. full-text-index shadow tables) are kept
    /// in the model but never emitted by the formatter.
    pub is_virtual: bool,
    /// Diagram placement, carried only for round-tripping.
    pub position: Option<TablePosition>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            is_virtual: false,
            position: None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// A field literally named `id` becomes the primary key when no field is
    /// explicitly marked. Must not fire otherwise.
    pub fn infer_primary_key(&mut self) {
        if self.fields.iter().any(|field| field.is_primary_key) {
            return;
        }
        if let Some(field) = self.fields.iter_mut().find(|field| field.name == "id") {
            field.is_primary_key = true;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    /// Free-form, dialect-specific type text. `enum(...)` is recognized and
    /// normalized by the formatter.
    pub typ: String,
    pub is_primary_key: bool,
    pub is_unique: bool,
    pub is_null: bool,
    pub is_unsigned: bool,
    /// Raw default literal, dialect-opaque (quotes preserved as written).
    pub default_value: Option<String>,
    pub references: Option<FieldReference>,
}

impl Field {
    pub fn new(name: impl Into<String>, typ: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            typ: typ.into(),
            is_primary_key: false,
            is_unique: false,
            is_null: false,
            is_unsigned: false,
            default_value: None,
            references: None,
        }
    }
}

/// A foreign-key reference always resolves to exactly one target field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldReference {
    pub table: String,
    pub field: String,
    pub typ: RelationType,
}

impl FieldReference {
    /// Equality as the differ sees it: the cardinality token is
    /// presentation-only, a changed arrowhead is not a schema change.
    pub fn same_target(&self, other: &FieldReference) -> bool {
        self.table == other.table && self.field == other.field
    }
}

/// Relation-cardinality token: optionality/multiplicity on each side of a
/// foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationType {
    /// `|`
    OneToOne,
    /// `-<`
    OneToMany,
    /// `>-`
    ManyToOne,
    /// `>-<`
    ManyToMany,
    /// `-0`
    OneToZeroOrOne,
    /// `0-`
    ZeroOrOneToOne,
    /// `0-0`
    ZeroOrOneToZeroOrOne,
    /// `-0<`
    OneToZeroOrMany,
    /// `>0-`
    ZeroOrManyToOne,
}

impl RelationType {
    /// Default relation for the `x_id fk` shorthand.
    pub const DEFAULT: RelationType = RelationType::ZeroOrManyToOne;

    pub fn as_str(self) -> &'static str {
        match self {
            RelationType::OneToOne => "|",
            RelationType::OneToMany => "-<",
            RelationType::ManyToOne => ">-",
            RelationType::ManyToMany => ">-<",
            RelationType::OneToZeroOrOne => "-0",
            RelationType::ZeroOrOneToOne => "0-",
            RelationType::ZeroOrOneToZeroOrOne => "0-0",
            RelationType::OneToZeroOrMany => "-0<",
            RelationType::ZeroOrManyToOne => ">0-",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "|" => Some(RelationType::OneToOne),
            "-<" => Some(RelationType::OneToMany),
            ">-" => Some(RelationType::ManyToOne),
            ">-<" => Some(RelationType::ManyToMany),
            "-0" => Some(RelationType::OneToZeroOrOne),
            "0-" => Some(RelationType::ZeroOrOneToOne),
            "0-0" => Some(RelationType::ZeroOrOneToZeroOrOne),
            "-0<" => Some(RelationType::OneToZeroOrMany),
            ">0-" => Some(RelationType::ZeroOrManyToOne),
            _ => None,
        }
    }
}

static ENUM_COMMA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(" ?, ?").unwrap());

/// Normalize `enum(...)` type text to single-quoted, comma-separated,
/// no-space values. Idempotent; keyword case is preserved.
pub fn format_enum(typ: &str) -> String {
    let quoted = typ.replace('(', "('").replace(')', "')");
    let joined = ENUM_COMMA_RE.replace_all(&quoted, "','");
    joined.replace("''", "'")
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TablePosition {
    pub x: f64,
    pub y: f64,
    pub color: Option<String>,
}

/// The six overridable theme channels, each a `#hex` color.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Theme {
    pub text_bg_color: Option<String>,
    pub text_color: Option<String>,
    pub diagram_bg_color: Option<String>,
    pub diagram_text_color: Option<String>,
    pub table_bg_color: Option<String>,
    pub table_text_color: Option<String>,
}

impl Theme {
    pub fn is_empty(&self) -> bool {
        self.text_bg_color.is_none()
            && self.text_color.is_none()
            && self.diagram_bg_color.is_none()
            && self.diagram_text_color.is_none()
            && self.table_bg_color.is_none()
            && self.table_text_color.is_none()
    }
}
