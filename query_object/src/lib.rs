//! Query Object - composable SQL query layer for QueryHaus
//!
//! This crate provides the query representation the request engine drives:
//! model schemas, relations, the `QueryContract` trait, a PostgreSQL `Query`
//! implementation of it, identifier validation and query execution.

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        $crate::tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        $crate::tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod column;
pub mod contract;
pub mod errors;
pub mod executor;
pub mod model;
pub mod prelude;
pub mod query_builder;
pub mod registry;
pub mod relation;
pub mod validation;

pub use column::ColumnType;
pub use contract::{EagerConstraint, QueryContract};
pub use errors::QueryError;
pub use executor::{QueryExecutor, Row};
pub use model::{GlobalScope, Model, ModelSchema, Scope, ScopeFn, SoftDelete};
pub use query_builder::{
    EagerLoad, GlobalScopeMode, JoinClause, JoinType, LogicalOperator, Query, QueryFilter,
    QueryOperator, RelationSubquery, SelectField, SortOrder, TrashedMode,
};
pub use registry::ModelRegistry;
pub use relation::{Relation, RelationKind, RelationQuery};
pub use validation::{ValidatedColumnRef, ValidatedFieldName, ValidatedTableName, ValidationError};

#[doc(hidden)]
pub use tracing;
