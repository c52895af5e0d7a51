//! # QueryHaus
//!
//! Build PostgreSQL queries from untrusted request parameters. The server
//! declares which filters, sorts, includes, fields and appends a client may
//! use; everything else is rejected (or ignored in lenient mode).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use queryhaus::prelude::*;
//!
//! struct User;
//!
//! impl Model for User {
//!     fn table_name() -> &'static str {
//!         "users"
//!     }
//!
//!     fn relations() -> Vec<Relation> {
//!         vec![Relation::has_many::<Post>("posts", "user_id")]
//!     }
//! }
//!
//! struct Post;
//!
//! impl Model for Post {
//!     fn table_name() -> &'static str {
//!         "posts"
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let haus = QueryHaus::from_env().await?;
//!
//!     // ?filter[name]=john&sort=-created_at&include=posts
//!     let request = json!({
//!         "filter": {"name": "john"},
//!         "sort": "-created_at",
//!         "include": "posts",
//!     });
//!
//!     let users = haus
//!         .query::<User>(request)?
//!         .allowed_filters([AllowedFilter::partial("name"), AllowedFilter::exact("id")])
//!         .allowed_sorts(["name", "created_at"])
//!         .allowed_includes(["posts"])
//!         .get(haus.pool().ok_or("not connected")?)
//!         .await?;
//!
//!     println!("{} users", users.len());
//!     Ok(())
//! }
//! ```

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
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
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod allowed;
pub mod builder;
pub mod core;
pub mod errors;
pub mod filters;
pub mod includes;
pub mod prelude;
pub mod request;
pub mod resolver;
pub mod sorts;
pub mod subject;

// Re-export the main public types for convenience
pub use allowed::{
    AllowedAppend, AllowedField, AllowedFilter, AllowedInclude, AllowedSort, DefaultSort,
};
pub use builder::QueryBuilder;
pub use core::QueryHaus;
pub use errors::{QueryBuilderError, QueryHausError};
pub use request::{Directive, DirectiveKind, ParsedRequest, QueryRequest};
pub use resolver::{AppliedDirective, Resolution};
pub use subject::Subject;

// Re-export centralized config
pub use config::{ConfigError, DatabaseConfig, QueryConfig, StrictMode};

// Re-export the query layer used in the public API
pub use query_object;

// Re-export external dependencies used in public API
pub use async_trait;
pub use sqlx;
