use crate::validation::ValidationError;
use thiserror::Error;

/// Errors raised by the query layer.
///
/// These describe server-side misconfiguration (unknown scopes or relations,
/// unsafe identifiers) or execution failures, never bad client input.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Unknown scope `{scope}` on `{table}`")]
    UnknownScope { table: String, scope: String },

    #[error("Unknown relation `{relation}` on `{table}`")]
    UnknownRelation { table: String, relation: String },

    #[error("Relation `{relation}` on `{table}` is not a {expected} relation")]
    RelationMismatch {
        table: String,
        relation: String,
        expected: &'static str,
    },

    #[error("Scope `{scope}` rejected its arguments: {reason}")]
    ScopeArguments { scope: String, reason: String },

    #[error("Invalid identifier: {0}")]
    Validation(#[from] ValidationError),

    #[error("Model already registered: {0}")]
    ModelAlreadyRegistered(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl QueryError {
    pub fn unknown_scope(table: &str, scope: &str) -> Self {
        Self::UnknownScope {
            table: table.to_string(),
            scope: scope.to_string(),
        }
    }

    pub fn unknown_relation(table: &str, relation: &str) -> Self {
        Self::UnknownRelation {
            table: table.to_string(),
            relation: relation.to_string(),
        }
    }

    pub fn scope_arguments(scope: &str, reason: impl Into<String>) -> Self {
        Self::ScopeArguments {
            scope: scope.to_string(),
            reason: reason.into(),
        }
    }
}
