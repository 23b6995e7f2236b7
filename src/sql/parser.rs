//! Parser for the CREATE TABLE subset of SQL dumps.

use super::dialect::Dialect;
use super::lexer::{Lexer, Token};
use super::types::normalize_type;
use crate::ast::{Field, FieldReference, RelationType, Schema, Table};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlParseError {
    #[error("expected {expected}, found {found:?}")]
    Expected { expected: &'static str, found: Token },
    #[error("unexpected end of input")]
    UnexpectedEof,
}

/// Tables an fts virtual table creates alongside itself.
const SHADOW_SUFFIXES: [&str; 5] = ["_data", "_idx", "_content", "_docsize", "_config"];

/// Parse a DDL dump into the schema model. Statements outside the supported
/// subset are skipped.
pub fn parse_sql(input: &str, dialect: Dialect) -> Result<Schema, SqlParseError> {
    let dialect = dialect.resolve(input);
    let tokens = Lexer::new(input).tokenize();
    Parser::new(tokens, dialect).parse()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    dialect: Dialect,
}

impl Parser {
    fn new(tokens: Vec<Token>, dialect: Dialect) -> Self {
        Self {
            tokens,
            pos: 0,
            dialect,
        }
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn parse(&mut self) -> Result<Schema, SqlParseError> {
        let mut tables: Vec<Table> = Vec::new();
        let mut virtual_tables: Vec<String> = Vec::new();

        while self.current() != &Token::Eof {
            match self.current() {
                Token::Create => {
                    self.advance();
                    match self.current().clone() {
                        Token::Virtual => {
                            self.advance();
                            if self.current() == &Token::Table {
                                self.advance();
                                self.skip_if_not_exists();
                                if let Some(name) = self.try_table_name() {
                                    virtual_tables.push(name.clone());
                                    let mut table = Table::new(name);
                                    table.is_virtual = true;
                                    tables.push(table);
                                }
                            }
                            self.skip_statement();
                        }
                        Token::Table => {
                            self.advance();
                            self.skip_if_not_exists();
                            match self.try_table_name() {
                                Some(name) => {
                                    if let Some(table) = self.parse_create_table(name)? {
                                        tables.push(table);
                                    }
                                }
                                None => self.skip_statement(),
                            }
                        }
                        Token::Unique | Token::Index => {
                            self.parse_create_index(&mut tables)?;
                        }
                        _ => self.skip_statement(),
                    }
                }
                Token::Alter => self.parse_alter_table(&mut tables)?,
                _ => self.advance(),
            }
        }

        // fts shadow tables appear as plain CREATE TABLEs after the virtual
        // table itself.
        for name in &virtual_tables {
            for suffix in SHADOW_SUFFIXES {
                let shadow = format!("{name}{suffix}");
                if let Some(table) = tables.iter_mut().find(|table| table.name == shadow) {
                    table.is_virtual = true;
                }
            }
        }

        Ok(Schema::from_tables(tables))
    }

    fn parse_create_table(&mut self, name: String) -> Result<Option<Table>, SqlParseError> {
        if self.current() != &Token::LParen {
            self.skip_statement();
            return Ok(None);
        }
        self.advance();

        let mut table = Table::new(name);
        let mut pk_columns: Vec<String> = Vec::new();
        let mut fk_constraints: Vec<(String, FieldReference)> = Vec::new();

        loop {
            match self.current().clone() {
                Token::RParen => {
                    self.advance();
                    break;
                }
                Token::Eof => return Err(SqlParseError::UnexpectedEof),
                Token::Comma => self.advance(),
                Token::Constraint => {
                    self.advance();
                    if let Token::Ident(_) = self.current() {
                        self.advance();
                    }
                }
                Token::Primary => {
                    self.advance();
                    if self.current() == &Token::Key {
                        self.advance();
                    }
                    pk_columns.extend(self.parse_name_list()?);
                }
                Token::Foreign => {
                    if let Some(constraint) = self.parse_foreign_key_clause()? {
                        fk_constraints.push(constraint);
                    }
                    self.skip_item();
                }
                Token::Unique => {
                    self.advance();
                    if self.current() == &Token::Key {
                        self.advance();
                    }
                    let columns = self.parse_name_list()?;
                    if let [column] = columns.as_slice() {
                        if let Some(field) =
                            table.fields.iter_mut().find(|field| &field.name == column)
                        {
                            field.is_unique = true;
                        }
                    }
                }
                Token::Check => {
                    self.advance();
                    if self.current() == &Token::LParen {
                        self.skip_parens();
                    }
                }
                Token::Key | Token::Index => self.skip_item(),
                Token::Ident(_) => table.fields.push(self.parse_column()?),
                _ => self.advance(),
            }
        }

        // table options (ENGINE=..., WITHOUT ROWID) up to the semicolon
        self.skip_statement();

        for name in pk_columns {
            if let Some(field) = table.fields.iter_mut().find(|field| field.name == name) {
                field.is_primary_key = true;
            }
        }
        for (column, reference) in fk_constraints {
            if let Some(field) = table.fields.iter_mut().find(|field| field.name == column) {
                field.references = Some(reference);
            }
        }

        Ok(Some(table))
    }

    fn parse_column(&mut self) -> Result<Field, SqlParseError> {
        let name = match self.current().clone() {
            Token::Ident(name) => {
                self.advance();
                name
            }
            token => {
                return Err(SqlParseError::Expected {
                    expected: "column name",
                    found: token,
                })
            }
        };

        let mut raw_type = String::new();
        loop {
            match self.current().clone() {
                Token::Ident(word) => {
                    if raw_type.is_empty() {
                        raw_type = word;
                    } else if matches!(word.to_lowercase().as_str(), "precision" | "varying") {
                        raw_type.push(' ');
                        raw_type.push_str(&word);
                    } else {
                        break;
                    }
                    self.advance();
                }
                Token::LParen if !raw_type.is_empty() => {
                    raw_type.push_str(&self.capture_paren_group()?);
                }
                _ => break,
            }
        }

        let mut field = Field::new(name, "");
        // DDL columns are nullable unless marked NOT NULL.
        field.is_null = true;

        loop {
            match self.current().clone() {
                Token::Primary => {
                    self.advance();
                    if self.current() == &Token::Key {
                        self.advance();
                    }
                    field.is_primary_key = true;
                }
                Token::Not => {
                    self.advance();
                    if self.current() == &Token::Null {
                        self.advance();
                        field.is_null = false;
                    }
                }
                Token::Null => {
                    self.advance();
                    field.is_null = true;
                }
                Token::Unique => {
                    self.advance();
                    field.is_unique = true;
                }
                Token::Unsigned => {
                    self.advance();
                    field.is_unsigned = true;
                }
                Token::Default => {
                    self.advance();
                    field.default_value = self.parse_default_value()?;
                }
                Token::References => {
                    self.advance();
                    if let Some(target) = self.try_table_name() {
                        let target_field = if self.current() == &Token::LParen {
                            self.parse_name_list()?
                                .into_iter()
                                .next()
                                .unwrap_or_else(|| "id".to_string())
                        } else {
                            "id".to_string()
                        };
                        field.references = Some(FieldReference {
                            table: target,
                            field: target_field,
                            typ: RelationType::ManyToOne,
                        });
                    }
                }
                Token::Check => {
                    self.advance();
                    if self.current() == &Token::LParen {
                        self.skip_parens();
                    }
                }
                // COLLATE x, AUTO_INCREMENT, ON DELETE actions and other
                // annotations that do not land in the model
                Token::On | Token::Key | Token::Ident(_) | Token::Num(_) | Token::Str(_)
                | Token::Other(_) => self.advance(),
                _ => break,
            }
        }

        field.typ = if raw_type.is_empty() {
            "integer".to_string()
        } else {
            normalize_type(&raw_type, self.dialect)
        };
        Ok(field)
    }

    /// `FOREIGN KEY (col) REFERENCES table (col)`, starting at `FOREIGN`.
    fn parse_foreign_key_clause(
        &mut self,
    ) -> Result<Option<(String, FieldReference)>, SqlParseError> {
        self.advance(); // FOREIGN
        if self.current() == &Token::Key {
            self.advance();
        }
        let columns = self.parse_name_list()?;
        if self.current() != &Token::References {
            return Ok(None);
        }
        self.advance();
        let Some(target) = self.try_table_name() else {
            return Ok(None);
        };
        let target_field = if self.current() == &Token::LParen {
            self.parse_name_list()?
                .into_iter()
                .next()
                .unwrap_or_else(|| "id".to_string())
        } else {
            "id".to_string()
        };
        let Some(column) = columns.into_iter().next() else {
            return Ok(None);
        };
        Ok(Some((
            column,
            FieldReference {
                table: target,
                field: target_field,
                typ: RelationType::ManyToOne,
            },
        )))
    }

    /// `CREATE [UNIQUE] INDEX name ON table (col)`, starting after `CREATE`.
    fn parse_create_index(&mut self, tables: &mut [Table]) -> Result<(), SqlParseError> {
        let unique = self.current() == &Token::Unique;
        if unique {
            self.advance();
        }
        if self.current() != &Token::Index {
            self.skip_statement();
            return Ok(());
        }
        self.advance();
        self.skip_if_not_exists();
        if let Token::Ident(_) = self.current() {
            self.advance();
        }
        if self.current() != &Token::On {
            self.skip_statement();
            return Ok(());
        }
        self.advance();
        let Some(table_name) = self.try_table_name() else {
            self.skip_statement();
            return Ok(());
        };
        let columns = self.parse_name_list()?;
        if unique {
            if let [column] = columns.as_slice() {
                if let Some(field) = tables
                    .iter_mut()
                    .find(|table| table.name == table_name)
                    .and_then(|table| table.fields.iter_mut().find(|field| &field.name == column))
                {
                    field.is_unique = true;
                }
            }
        }
        self.skip_statement();
        Ok(())
    }

    /// `ALTER TABLE t ADD [CONSTRAINT name] FOREIGN KEY ...`, starting at
    /// `ALTER`. Other alterations are skipped.
    fn parse_alter_table(&mut self, tables: &mut [Table]) -> Result<(), SqlParseError> {
        self.advance(); // ALTER
        if self.current() != &Token::Table {
            self.skip_statement();
            return Ok(());
        }
        self.advance();
        let Some(table_name) = self.try_table_name() else {
            self.skip_statement();
            return Ok(());
        };
        loop {
            match self.current() {
                Token::Semicolon | Token::Eof => break,
                Token::Foreign => {
                    if let Some((column, reference)) = self.parse_foreign_key_clause()? {
                        if let Some(field) = tables
                            .iter_mut()
                            .find(|table| table.name == table_name)
                            .and_then(|table| {
                                table.fields.iter_mut().find(|field| field.name == column)
                            })
                        {
                            field.references = Some(reference);
                        }
                    }
                }
                _ => self.advance(),
            }
        }
        self.skip_statement();
        Ok(())
    }

    fn parse_default_value(&mut self) -> Result<Option<String>, SqlParseError> {
        match self.current().clone() {
            Token::Str(value) => {
                self.advance();
                Ok(Some(format!("'{value}'")))
            }
            Token::Num(value) => {
                self.advance();
                Ok(Some(value))
            }
            Token::Null => {
                self.advance();
                Ok(Some("null".to_string()))
            }
            Token::Ident(word) => {
                self.advance();
                if self.current() == &Token::LParen {
                    let group = self.capture_paren_group()?;
                    Ok(Some(format!("{word}{group}")))
                } else {
                    Ok(Some(word))
                }
            }
            Token::LParen => Ok(Some(self.capture_paren_group()?)),
            Token::Other('-') => {
                self.advance();
                if let Token::Num(value) = self.current().clone() {
                    self.advance();
                    Ok(Some(format!("-{value}")))
                } else {
                    Ok(None)
                }
            }
            _ => Ok(None),
        }
    }

    /// `name` or `schema.name`; the schema qualifier is dropped.
    fn try_table_name(&mut self) -> Option<String> {
        let Token::Ident(first) = self.current().clone() else {
            return None;
        };
        self.advance();
        if self.current() == &Token::Dot {
            self.advance();
            if let Token::Ident(second) = self.current().clone() {
                self.advance();
                return Some(second);
            }
        }
        Some(first)
    }

    /// `(a, b, c)`; an empty list when no parenthesis follows.
    fn parse_name_list(&mut self) -> Result<Vec<String>, SqlParseError> {
        let mut names = Vec::new();
        if self.current() != &Token::LParen {
            return Ok(names);
        }
        self.advance();
        loop {
            match self.current().clone() {
                Token::RParen => {
                    self.advance();
                    return Ok(names);
                }
                Token::Eof => return Err(SqlParseError::UnexpectedEof),
                Token::Comma => self.advance(),
                Token::Ident(name) => {
                    names.push(name);
                    self.advance();
                }
                _ => self.advance(),
            }
        }
    }

    /// Rebuild a parenthesized group as text: `(255)`, `('a','b')`.
    fn capture_paren_group(&mut self) -> Result<String, SqlParseError> {
        let mut group = String::from("(");
        self.advance(); // LParen
        let mut depth = 1;
        loop {
            match self.current().clone() {
                Token::LParen => {
                    depth += 1;
                    group.push('(');
                    self.advance();
                }
                Token::RParen => {
                    depth -= 1;
                    group.push(')');
                    self.advance();
                    if depth == 0 {
                        return Ok(group);
                    }
                }
                Token::Eof => return Err(SqlParseError::UnexpectedEof),
                Token::Ident(word) => {
                    group.push_str(&word);
                    self.advance();
                }
                Token::Num(value) => {
                    group.push_str(&value);
                    self.advance();
                }
                Token::Str(value) => {
                    group.push('\'');
                    group.push_str(&value);
                    group.push('\'');
                    self.advance();
                }
                Token::Comma => {
                    group.push(',');
                    self.advance();
                }
                _ => self.advance(),
            }
        }
    }

    fn skip_if_not_exists(&mut self) {
        if self.current() == &Token::If {
            self.advance();
            if self.current() == &Token::Not {
                self.advance();
            }
            if self.current() == &Token::Exists {
                self.advance();
            }
        }
    }

    /// Skip to the end of the current table-body item.
    fn skip_item(&mut self) {
        loop {
            match self.current() {
                Token::Comma | Token::RParen | Token::Eof => return,
                Token::LParen => self.skip_parens(),
                _ => self.advance(),
            }
        }
    }

    /// Skip a balanced parenthesized group, starting at `(`.
    fn skip_parens(&mut self) {
        self.advance();
        let mut depth = 1;
        while depth > 0 {
            match self.current() {
                Token::LParen => depth += 1,
                Token::RParen => depth -= 1,
                Token::Eof => return,
                _ => {}
            }
            self.advance();
        }
    }

    fn skip_statement(&mut self) {
        while !matches!(self.current(), Token::Semicolon | Token::Eof) {
            self.advance();
        }
        if self.current() == &Token::Semicolon {
            self.advance();
        }
    }
}
