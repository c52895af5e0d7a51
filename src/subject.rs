//! What a session queries
//!
//! A session can start from a ready query, a model, one parent row's
//! relation, or a model name looked up in a [`ModelRegistry`]. All of them
//! normalise to one [`Query`].

use crate::errors::QueryBuilderError;
use query_object::{Model, ModelRegistry, ModelSchema, Query, RelationQuery};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum Subject {
    Query(Query),
    Model(ModelSchema),
    Relation(RelationQuery),
    Named {
        name: String,
        registry: Arc<ModelRegistry>,
    },
}

impl Subject {
    pub fn model<M: Model>() -> Self {
        Subject::Model(ModelSchema::of::<M>())
    }

    pub fn named(name: impl Into<String>, registry: Arc<ModelRegistry>) -> Self {
        Subject::Named {
            name: name.into(),
            registry,
        }
    }

    /// The query handle for this subject. Relation subjects keep whatever was
    /// attached to the relation query (pivot columns, eager loads, scopes).
    pub fn into_query(self) -> Result<Query, QueryBuilderError> {
        let query = match self {
            Subject::Query(query) => query,
            Subject::Model(schema) => Query::new(schema),
            Subject::Relation(relation) => {
                if relation.parent_key().is_null() {
                    return Err(QueryBuilderError::InvalidSubject(format!(
                        "relation `{}` of `{}` has no parent key",
                        relation.relation().name,
                        relation.parent().table_name()
                    )));
                }
                relation.into_query()
            }
            Subject::Named { name, registry } => match registry.get(&name) {
                Some(schema) => Query::new(schema.clone()),
                None => {
                    return Err(QueryBuilderError::InvalidSubject(format!(
                        "no model named `{}` (registered: {})",
                        name,
                        registry.names().join(", ")
                    )));
                }
            },
        };

        query
            .schema()
            .validate()
            .map_err(|e| QueryBuilderError::InvalidSubject(e.to_string()))?;
        Ok(query)
    }
}

impl From<Query> for Subject {
    fn from(query: Query) -> Self {
        Subject::Query(query)
    }
}

impl From<ModelSchema> for Subject {
    fn from(schema: ModelSchema) -> Self {
        Subject::Model(schema)
    }
}

impl From<RelationQuery> for Subject {
    fn from(relation: RelationQuery) -> Self {
        Subject::Relation(relation)
    }
}
