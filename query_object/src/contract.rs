//! The query contract
//!
//! Everything the request engine needs from a query type. [`crate::Query`]
//! is the PostgreSQL implementation; strategies are written against this
//! trait only.

use crate::column::ColumnType;
use crate::errors::QueryError;
use crate::query_builder::{JoinClause, QueryFilter, QueryOperator, SortOrder};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Constraint applied to the related query of an eager load
pub type EagerConstraint<Q> = Arc<dyn Fn(Q) -> Q + Send + Sync>;

pub trait QueryContract: Clone + fmt::Debug + Send + Sync + Sized + 'static {
    /// Table rows are selected from
    fn table_name(&self) -> &str;

    /// `table.column`; already-qualified references pass through
    fn qualify_column(&self, column: &str) -> String {
        if column.contains('.') {
            column.to_string()
        } else {
            format!("{}.{}", self.table_name(), column)
        }
    }

    /// Whether `path` (dotted for nested relations) names a relation
    fn has_relation(&self, path: &str) -> bool;

    /// Declared type of a subject column or of a `relation.column` reference
    fn column_type(&self, _column: &str) -> Option<ColumnType> {
        None
    }

    fn where_op(self, field: &str, operator: QueryOperator, value: Value) -> Self;

    fn where_in(self, field: &str, values: Vec<Value>) -> Self;

    fn where_null(self, field: &str) -> Self;

    fn where_not_null(self, field: &str) -> Self;

    /// Add a pre-built (possibly grouped) condition
    fn where_filter(self, filter: QueryFilter) -> Self;

    /// Require at least one related row matching `constraint`
    fn where_has(self, path: &str, constraint: Option<QueryFilter>) -> Result<Self, QueryError>;

    /// Require no related row matching `constraint`
    fn where_doesnt_have(
        self,
        path: &str,
        constraint: Option<QueryFilter>,
    ) -> Result<Self, QueryError>;

    /// Rows owned by any of `keys` through a belongs-to relation
    fn where_belongs_to(self, relation: &str, keys: Vec<Value>) -> Result<Self, QueryError>;

    fn order_by(self, field: &str, order: SortOrder) -> Self;

    /// Add `join` unless its table is already joined
    fn join_if_absent(self, join: JoinClause) -> Self;

    fn call_scope(self, name: &str, args: &[Value]) -> Result<Self, QueryError>;

    /// Eager load a relation path, optionally constraining the related query
    fn with(
        self,
        path: &str,
        constraint: Option<EagerConstraint<Self>>,
    ) -> Result<Self, QueryError>;

    /// Add a related-row count column named `alias`
    fn with_count(self, relation: &str, alias: &str) -> Result<Self, QueryError>;

    /// Add a related-row existence column named `alias`
    fn with_exists(self, relation: &str, alias: &str) -> Result<Self, QueryError>;

    /// Restrict the selected columns of the subject table
    fn select(self, columns: Vec<String>) -> Self;

    fn with_trashed(self) -> Self;

    fn only_trashed(self) -> Self;

    fn without_trashed(self) -> Self;

    fn without_global_scopes(self) -> Self;

    fn without_global_scope(self, name: &str) -> Self;

    /// SQL text and bound values in placeholder order
    fn build(&self) -> (String, Vec<Value>);

    fn to_sql(&self) -> String {
        self.build().0
    }
}
