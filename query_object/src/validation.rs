//! Identifier validation
//!
//! Every table, column and relation name that ends up in generated SQL is
//! server-authored, but it still passes through these checks before it is
//! interpolated.

use std::fmt;
use thiserror::Error;

/// Why an identifier was refused
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Identifier '{0}' may only contain ASCII letters, digits and underscores")]
    InvalidCharacters(String),

    /// PostgreSQL truncates identifiers past 63 bytes
    #[error("Identifier '{name}' is {length} characters long (max {max_length})")]
    TooLong {
        name: String,
        length: usize,
        max_length: usize,
    },

    #[error("Identifier cannot be empty")]
    Empty,

    #[error("Identifier '{0}' must start with a letter or underscore")]
    InvalidStartCharacter(String),

    #[error("Identifier '{0}' is a reserved SQL keyword")]
    ReservedKeyword(String),
}

/// Longest identifier PostgreSQL keeps without truncation
const MAX_IDENTIFIER_LEN: usize = 63;

/// Words that would change the meaning of a statement if spliced in bare.
/// Kept sorted for the binary search.
const RESERVED: &[&str] = &[
    "ALL", "ALTER", "AND", "ANY", "AS", "ASC", "BETWEEN", "BY", "CASE", "CAST", "CREATE",
    "DELETE", "DESC", "DISTINCT", "DROP", "ELSE", "END", "EXISTS", "FALSE", "FROM", "FULL",
    "GRANT", "GROUP", "HAVING", "ILIKE", "IN", "INNER", "INSERT", "INTO", "IS", "JOIN", "LEFT",
    "LIKE", "LIMIT", "NOT", "NULL", "OFFSET", "ON", "OR", "ORDER", "OUTER", "RETURNING",
    "REVOKE", "RIGHT", "SELECT", "SET", "SOME", "TABLE", "THEN", "TRUE", "TRUNCATE", "UNION",
    "UPDATE", "USING", "VALUES", "WHEN", "WHERE", "WITH",
];

fn check_identifier(name: &str) -> Result<(), ValidationError> {
    let mut chars = name.chars();
    match chars.next() {
        None => return Err(ValidationError::Empty),
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        Some(_) => return Err(ValidationError::InvalidStartCharacter(name.to_string())),
    }

    if chars.any(|c| c != '_' && !c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidCharacters(name.to_string()));
    }

    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::TooLong {
            name: name.to_string(),
            length: name.len(),
            max_length: MAX_IDENTIFIER_LEN,
        });
    }

    if RESERVED.binary_search(&name.to_ascii_uppercase().as_str()).is_ok() {
        return Err(ValidationError::ReservedKeyword(name.to_string()));
    }

    Ok(())
}

/// Table name that passed [`check_identifier`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedTableName(String);

impl ValidatedTableName {
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        check_identifier(name).map(|()| Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatedTableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Single column or relation name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedFieldName(String);

impl ValidatedFieldName {
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        check_identifier(name).map(|()| Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatedFieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A dotted reference such as `column`, `table.column` or
/// `relation.nested.column` where every segment is a valid identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedColumnRef(String);

impl ValidatedColumnRef {
    pub fn new(reference: &str) -> Result<Self, ValidationError> {
        if reference.is_empty() {
            return Err(ValidationError::Empty);
        }
        for segment in reference.split('.') {
            check_identifier(segment)?;
        }
        Ok(Self(reference.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split off the trailing column: `a.b.c` gives `(Some("a.b"), "c")`
    pub fn split_last(&self) -> (Option<&str>, &str) {
        match self.0.rsplit_once('.') {
            Some((path, column)) => (Some(path), column),
            None => (None, &self.0),
        }
    }
}

impl fmt::Display for ValidatedColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
