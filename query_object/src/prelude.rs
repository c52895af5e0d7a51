//! Convenience re-exports for defining models and building queries
//!
//! ```rust
//! use query_object::prelude::*;
//! ```

pub use crate::column::ColumnType;
pub use crate::contract::{EagerConstraint, QueryContract};
pub use crate::errors::QueryError;
pub use crate::executor::{QueryExecutor, Row};
pub use crate::model::{GlobalScope, Model, ModelSchema, Scope, SoftDelete};
pub use crate::query_builder::{
    JoinClause, JoinType, Query, QueryFilter, QueryOperator, SortOrder, TrashedMode,
};
pub use crate::registry::ModelRegistry;
pub use crate::relation::{Relation, RelationKind, RelationQuery};

pub use async_trait::async_trait;
pub use serde_json::{json, Value};
