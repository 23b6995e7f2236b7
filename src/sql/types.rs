//! Imported SQL type normalization.

use super::Dialect;
use crate::ast::format_enum;

/// Normalize a raw column type from a DDL dump into the form the ERD text
/// uses: lowercased, size arguments kept, dialect-specific spellings folded
/// into their plain equivalents. `enum(...)` keeps its keyword case and gets
/// the standard quoting.
pub fn normalize_type(raw: &str, dialect: Dialect) -> String {
    let raw = raw.trim();
    if raw.to_lowercase().starts_with("enum") {
        return format_enum(raw);
    }

    let lower = raw.to_lowercase();
    if dialect == Dialect::MySQL && lower == "tinyint(1)" {
        return "boolean".to_string();
    }

    let (base, args) = match lower.find('(') {
        Some(index) => (lower[..index].trim_end(), &lower[index..]),
        None => (lower.as_str(), ""),
    };

    let mapped = match base {
        // PostgreSQL auto-increment and aliased integer types
        "serial" | "serial4" | "int4" => "integer",
        "bigserial" | "serial8" | "int8" => "bigint",
        "smallserial" | "serial2" | "int2" => "smallint",

        // Multi-word spellings
        "character varying" => "varchar",
        "double precision" => "double",

        // Timezone-qualified timestamps
        "timestamptz" => "timestamp",

        other => other,
    };

    format!("{mapped}{args}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_serial_becomes_integer() {
        assert_eq!(normalize_type("SERIAL", Dialect::PostgreSQL), "integer");
        assert_eq!(normalize_type("BIGSERIAL", Dialect::PostgreSQL), "bigint");
    }

    #[test]
    fn test_size_arguments_are_kept() {
        assert_eq!(normalize_type("VARCHAR(255)", Dialect::Generic), "varchar(255)");
        assert_eq!(
            normalize_type("character varying(64)", Dialect::PostgreSQL),
            "varchar(64)"
        );
    }

    #[test]
    fn test_mysql_tinyint1_is_boolean() {
        assert_eq!(normalize_type("tinyint(1)", Dialect::MySQL), "boolean");
        assert_eq!(normalize_type("tinyint(4)", Dialect::MySQL), "tinyint(4)");
    }

    #[test]
    fn test_enum_is_normalized_with_case_preserved() {
        assert_eq!(
            normalize_type("ENUM('a','b')", Dialect::MySQL),
            "ENUM('a','b')"
        );
        assert_eq!(normalize_type("enum(t,f)", Dialect::MySQL), "enum('t','f')");
    }
}
