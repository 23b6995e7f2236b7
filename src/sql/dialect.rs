//! SQL dialect detection for imported DDL dumps.

/// SQL dialect variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// Auto-detect from dump content
    #[default]
    Auto,
    /// Standard SQL
    Generic,
    /// SQLite
    SQLite,
    /// PostgreSQL
    PostgreSQL,
    /// MySQL
    MySQL,
}

impl Dialect {
    /// Parse dialect from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "generic" => Some(Self::Generic),
            "sqlite" | "sqlite3" => Some(Self::SQLite),
            "postgres" | "postgresql" | "pg" => Some(Self::PostgreSQL),
            "mysql" => Some(Self::MySQL),
            _ => None,
        }
    }

    /// Detect dialect from DDL content.
    pub fn detect(content: &str) -> Self {
        let lower = content.to_lowercase();

        // Check header comments
        if lower.contains("postgresql database dump") || lower.contains("pg_dump") {
            return Self::PostgreSQL;
        }
        if lower.contains("mysql dump") || lower.contains("mysqldump") {
            return Self::MySQL;
        }

        // Check dialect-specific keywords
        if lower.contains("sqlite_sequence") || lower.contains("autoincrement") {
            return Self::SQLite;
        }
        if lower.contains("serial") || lower.contains("timestamptz") || lower.contains("::text") {
            return Self::PostgreSQL;
        }
        if lower.contains("auto_increment") || lower.contains("engine=") || lower.contains("unsigned")
        {
            return Self::MySQL;
        }

        Self::Generic
    }

    /// Resolve Auto to a concrete dialect.
    pub fn resolve(self, content: &str) -> Self {
        match self {
            Self::Auto => Self::detect(content),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_postgres() {
        let sql = "-- PostgreSQL database dump\nCREATE TABLE users (id SERIAL);";
        assert_eq!(Dialect::detect(sql), Dialect::PostgreSQL);
    }

    #[test]
    fn test_detect_mysql() {
        let sql = "CREATE TABLE users (id INT AUTO_INCREMENT) ENGINE=InnoDB;";
        assert_eq!(Dialect::detect(sql), Dialect::MySQL);
    }

    #[test]
    fn test_detect_sqlite() {
        let sql = "CREATE TABLE users (id integer primary key autoincrement);";
        assert_eq!(Dialect::detect(sql), Dialect::SQLite);
    }

    #[test]
    fn test_detect_generic() {
        let sql = "CREATE TABLE users (id INTEGER PRIMARY KEY);";
        assert_eq!(Dialect::detect(sql), Dialect::Generic);
    }

    #[test]
    fn test_resolve_keeps_explicit_choice() {
        let sql = "CREATE TABLE users (id SERIAL);";
        assert_eq!(Dialect::MySQL.resolve(sql), Dialect::MySQL);
        assert_eq!(Dialect::Auto.resolve(sql), Dialect::PostgreSQL);
    }
}
