//! Sort strategies

use crate::errors::QueryBuilderError;
use query_object::{QueryContract, SortOrder};
use serde_json::json;
use std::fmt;
use std::sync::Arc;

/// A caller-defined sort
pub trait Sort<Q: QueryContract>: Send + Sync {
    fn apply(&self, query: Q, descending: bool, property: &str) -> Result<Q, QueryBuilderError>;
}

pub type SortCallback<Q> = Arc<dyn Fn(Q, bool, &str) -> Result<Q, QueryBuilderError> + Send + Sync>;

pub enum SortStrategy<Q: QueryContract> {
    /// `ORDER BY <property>`
    Field,
    /// Named model scope called with `"asc"` or `"desc"`
    Scope,
    Callback(SortCallback<Q>),
    Custom(Arc<dyn Sort<Q>>),
}

impl<Q: QueryContract> Clone for SortStrategy<Q> {
    fn clone(&self) -> Self {
        match self {
            SortStrategy::Field => SortStrategy::Field,
            SortStrategy::Scope => SortStrategy::Scope,
            SortStrategy::Callback(callback) => SortStrategy::Callback(Arc::clone(callback)),
            SortStrategy::Custom(sort) => SortStrategy::Custom(Arc::clone(sort)),
        }
    }
}

impl<Q: QueryContract> fmt::Debug for SortStrategy<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortStrategy::Field => "Field",
            SortStrategy::Scope => "Scope",
            SortStrategy::Callback(_) => "Callback",
            SortStrategy::Custom(_) => "Custom",
        })
    }
}

impl<Q: QueryContract> SortStrategy<Q> {
    pub fn targets_column(&self) -> bool {
        matches!(self, SortStrategy::Field)
    }

    pub fn apply(
        &self,
        query: Q,
        descending: bool,
        property: &str,
    ) -> Result<Q, QueryBuilderError> {
        let order = SortOrder::from_descending(descending);
        match self {
            SortStrategy::Field => Ok(query.order_by(property, order)),
            SortStrategy::Scope => query
                .call_scope(property, &[json!(order.as_str())])
                .map_err(|err| QueryBuilderError::from_scope(property, err)),
            SortStrategy::Callback(callback) => callback(query, descending, property),
            SortStrategy::Custom(sort) => sort.apply(query, descending, property),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_object::{JoinClause, Model, Query, QueryError, Scope};

    struct Post;

    impl Model for Post {
        fn table_name() -> &'static str {
            "posts"
        }

        fn scopes() -> Vec<Scope> {
            vec![
                Scope::new("popularity", |query, args| {
                    let order = match args.first().and_then(|v| v.as_str()) {
                        Some("desc") => SortOrder::Desc,
                        _ => SortOrder::Asc,
                    };
                    Ok(query.order_by("likes", order))
                }),
                Scope::new("newestOnly", |query, args| {
                    match args.first().and_then(|v| v.as_str()) {
                        Some("desc") => Ok(query.order_by("created_at", SortOrder::Desc)),
                        _ => Err(QueryError::scope_arguments(
                            "newestOnly",
                            "only sorts descending",
                        )),
                    }
                }),
            ]
        }
    }

    struct AuthorNameSort;

    impl Sort<Query> for AuthorNameSort {
        fn apply(
            &self,
            query: Query,
            descending: bool,
            _property: &str,
        ) -> Result<Query, QueryBuilderError> {
            Ok(query
                .join_if_absent(JoinClause::inner("authors", "posts.author_id", "authors.id"))
                .order_by("authors.name", SortOrder::from_descending(descending)))
        }
    }

    #[test]
    fn test_field_sort() {
        let query = SortStrategy::<Query>::Field
            .apply(Query::for_model::<Post>(), true, "title")
            .unwrap();
        assert_eq!(query.to_sql(), "SELECT posts.* FROM posts ORDER BY posts.title DESC");
    }

    #[test]
    fn test_scope_sort_receives_direction() {
        let query = SortStrategy::<Query>::Scope
            .apply(Query::for_model::<Post>(), true, "popularity")
            .unwrap();
        assert_eq!(query.to_sql(), "SELECT posts.* FROM posts ORDER BY posts.likes DESC");
    }

    #[test]
    fn test_scope_sort_rejecting_direction_is_a_client_error() {
        let err = SortStrategy::<Query>::Scope
            .apply(Query::for_model::<Post>(), false, "newestOnly")
            .unwrap_err();
        assert!(matches!(
            err,
            QueryBuilderError::InvalidDirectiveValue { ref name, .. } if name == "newestOnly"
        ));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_custom_sort_joins_once() {
        let sort = SortStrategy::Custom(Arc::new(AuthorNameSort));
        let query = Query::for_model::<Post>();
        let query = sort.apply(query, false, "author").unwrap();
        let query = sort.apply(query, true, "author").unwrap();

        assert_eq!(query.joins().len(), 1);
        assert_eq!(
            query.to_sql(),
            "SELECT posts.* FROM posts INNER JOIN authors ON posts.author_id = authors.id \
             ORDER BY authors.name ASC, authors.name DESC"
        );
    }
}
