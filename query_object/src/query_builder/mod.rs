//! Query builder utilities
//!
//! This module provides the `Query` type and the SQL building blocks it renders from.

pub mod builder;
pub mod eager;
pub mod filter;
pub mod join;
pub mod ordering;
pub mod pagination;
pub mod select;
pub mod sql_generation;
pub mod subquery;

#[cfg(test)]
mod tests;

pub use builder::{GlobalScopeMode, Query, TrashedMode};
pub use eager::EagerLoad;
pub use filter::{LogicalOperator, QueryCondition, QueryFilter, QueryOperator};
pub use join::{JoinClause, JoinType};
pub use ordering::SortOrder;
pub use pagination::Pagination;
pub use select::SelectField;
pub use subquery::RelationSubquery;
