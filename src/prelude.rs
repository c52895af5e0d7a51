//! Convenience re-exports for common QueryHaus usage
//!
//! ```rust
//! use queryhaus::prelude::*;
//!
//! let filter: AllowedFilter = AllowedFilter::exact("id");
//! assert_eq!(filter.internal_name, "id");
//! ```

// Core QueryHaus components
pub use crate::allowed::{
    AllowedAppend, AllowedField, AllowedFilter, AllowedInclude, AllowedSort, DefaultSort,
};
pub use crate::builder::QueryBuilder;
pub use crate::core::QueryHaus;
pub use crate::errors::{QueryBuilderError, QueryHausError};
pub use crate::filters::{Filter, FilterOperator};
pub use crate::includes::Include;
pub use crate::request::QueryRequest;
pub use crate::sorts::Sort;
pub use crate::subject::Subject;

// Re-export centralized config
pub use config::{QueryConfig, StrictMode};

// Query layer
pub use query_object::prelude::*;

// Common external dependencies
pub use sqlx;
pub use sqlx::PgPool;
