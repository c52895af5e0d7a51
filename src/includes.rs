//! Include strategies
//!
//! Relationship includes become eager loads; count and exists includes add
//! an aggregate column named after the relation in snake case
//! (`relatedModels` gives `related_models_count`).

use crate::errors::QueryBuilderError;
use convert_case::{Case, Casing};
use query_object::{EagerConstraint, QueryContract};
use std::fmt;
use std::sync::Arc;

/// A caller-defined include
pub trait Include<Q: QueryContract>: Send + Sync {
    fn apply(&self, query: Q, property: &str) -> Result<Q, QueryBuilderError>;
}

pub enum IncludeStrategy<Q: QueryContract> {
    Relationship,
    Count,
    Exists,
    Custom(Arc<dyn Include<Q>>),
}

impl<Q: QueryContract> Clone for IncludeStrategy<Q> {
    fn clone(&self) -> Self {
        match self {
            IncludeStrategy::Relationship => IncludeStrategy::Relationship,
            IncludeStrategy::Count => IncludeStrategy::Count,
            IncludeStrategy::Exists => IncludeStrategy::Exists,
            IncludeStrategy::Custom(include) => IncludeStrategy::Custom(Arc::clone(include)),
        }
    }
}

impl<Q: QueryContract> fmt::Debug for IncludeStrategy<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IncludeStrategy::Relationship => "Relationship",
            IncludeStrategy::Count => "Count",
            IncludeStrategy::Exists => "Exists",
            IncludeStrategy::Custom(_) => "Custom",
        })
    }
}

impl<Q: QueryContract> IncludeStrategy<Q> {
    /// `fields` are the requested columns of the included relation; an
    /// empty list loads every column.
    pub fn apply(
        &self,
        query: Q,
        property: &str,
        fields: &[String],
    ) -> Result<Q, QueryBuilderError> {
        match self {
            IncludeStrategy::Relationship => {
                let constraint: Option<EagerConstraint<Q>> = if fields.is_empty() {
                    None
                } else {
                    let fields = fields.to_vec();
                    Some(Arc::new(move |related: Q| related.select(fields.clone())))
                };
                Ok(query.with(property, constraint)?)
            }
            IncludeStrategy::Count => Ok(query.with_count(property, &count_alias(property))?),
            IncludeStrategy::Exists => Ok(query.with_exists(property, &exists_alias(property))?),
            IncludeStrategy::Custom(include) => include.apply(query, property),
        }
    }
}

pub fn count_alias(relation: &str) -> String {
    format!("{}_count", relation.to_case(Case::Snake))
}

pub fn exists_alias(relation: &str) -> String {
    format!("{}_exists", relation.to_case(Case::Snake))
}
