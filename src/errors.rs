//! Error types for the QueryHaus crate
//!
//! Client errors (unknown or malformed directives) are kept apart from server
//! faults (misconfigured subjects, query engine failures) so a transport layer
//! can map them to 4xx and 5xx responses.

use config::ConfigError;
use query_object::QueryError;
use thiserror::Error;

/// Errors of the [`crate::QueryHaus`] coordinator
#[derive(Error, Debug)]
pub enum QueryHausError {
    #[error("Database connection error: {0}")]
    DatabaseConnection(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Model registry error: {0}")]
    Query(#[from] QueryError),

    #[error("No [database] section configured")]
    MissingDatabaseConfig,

    #[error("Not connected to a database")]
    NotConnected,
}

#[derive(Error, Debug)]
pub enum QueryBuilderError {
    #[error("Invalid subject: {0}")]
    InvalidSubject(String),

    #[error(
        "Requested filter(s) `{}` are not allowed. Allowed filter(s) are `{}`.",
        .unknown.join(", "),
        .allowed.join(", ")
    )]
    InvalidFilterQuery {
        unknown: Vec<String>,
        allowed: Vec<String>,
    },

    #[error(
        "Requested sort(s) `{}` is not allowed. Allowed sort(s) are `{}`.",
        .unknown.join(", "),
        .allowed.join(", ")
    )]
    InvalidSortQuery {
        unknown: Vec<String>,
        allowed: Vec<String>,
    },

    #[error(
        "Requested include(s) `{}` are not allowed. Allowed include(s) are `{}`.",
        .unknown.join(", "),
        .allowed.join(", ")
    )]
    InvalidIncludeQuery {
        unknown: Vec<String>,
        allowed: Vec<String>,
    },

    #[error(
        "Requested field(s) `{}` are not allowed. Allowed field(s) are `{}`.",
        .unknown.join(", "),
        .allowed.join(", ")
    )]
    InvalidFieldQuery {
        unknown: Vec<String>,
        allowed: Vec<String>,
    },

    #[error(
        "Requested append(s) `{}` are not allowed. Allowed append(s) are `{}`.",
        .unknown.join(", "),
        .allowed.join(", ")
    )]
    InvalidAppendQuery {
        unknown: Vec<String>,
        allowed: Vec<String>,
    },

    #[error("Invalid value for `{name}`: {reason}")]
    InvalidDirectiveValue { name: String, reason: String },

    #[error(
        "Invalid query parameters: {}",
        .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
    )]
    InvalidDirectives(Vec<QueryBuilderError>),

    #[error(transparent)]
    Query(#[from] QueryError),
}

impl QueryBuilderError {
    pub fn invalid_value(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDirectiveValue {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Scope failure while applying the `property` directive.
    ///
    /// Arguments a scope rejects came from the client; every other query
    /// error stays a server fault.
    pub fn from_scope(property: &str, err: QueryError) -> Self {
        match err {
            QueryError::ScopeArguments { reason, .. } => Self::invalid_value(property, reason),
            other => Self::Query(other),
        }
    }

    /// Bad request input rather than a server fault
    pub fn is_client_error(&self) -> bool {
        match self {
            QueryBuilderError::InvalidSubject(_) | QueryBuilderError::Query(_) => false,
            QueryBuilderError::InvalidDirectives(errors) => {
                errors.iter().all(QueryBuilderError::is_client_error)
            }
            _ => true,
        }
    }

    /// Every directive name this error rejects
    pub fn unknown_names(&self) -> Vec<&str> {
        match self {
            QueryBuilderError::InvalidFilterQuery { unknown, .. }
            | QueryBuilderError::InvalidSortQuery { unknown, .. }
            | QueryBuilderError::InvalidIncludeQuery { unknown, .. }
            | QueryBuilderError::InvalidFieldQuery { unknown, .. }
            | QueryBuilderError::InvalidAppendQuery { unknown, .. } => {
                unknown.iter().map(String::as_str).collect()
            }
            QueryBuilderError::InvalidDirectiveValue { name, .. } => vec![name.as_str()],
            QueryBuilderError::InvalidDirectives(errors) => {
                errors.iter().flat_map(|e| e.unknown_names()).collect()
            }
            QueryBuilderError::InvalidSubject(_) | QueryBuilderError::Query(_) => Vec::new(),
        }
    }
}
