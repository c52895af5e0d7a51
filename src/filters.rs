//! Filter strategies
//!
//! Each strategy turns one validated filter value into constraints on the
//! query, through the query contract only.

use crate::errors::QueryBuilderError;
use query_object::{QueryContract, QueryFilter, QueryOperator};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A caller-defined filter
pub trait Filter<Q: QueryContract>: Send + Sync {
    fn apply(&self, query: Q, value: &Value, property: &str) -> Result<Q, QueryBuilderError>;
}

pub type FilterCallback<Q> =
    Arc<dyn Fn(Q, &Value, &str) -> Result<Q, QueryBuilderError> + Send + Sync>;

/// Operator of an operator filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Fixed(QueryOperator),
    /// Read the operator from the value itself: `>=10`, `!=draft`
    Dynamic,
}

pub enum FilterStrategy<Q: QueryContract> {
    /// Equality, `IN` for lists. With `relation_constraint`, `relation.column`
    /// constrains the relation instead of a joined column.
    Exact { relation_constraint: bool },
    /// Case-insensitive substring match
    Partial { relation_constraint: bool },
    BeginsWithStrict,
    EndsWithStrict,
    Operator(FilterOperator),
    Scope,
    Callback(FilterCallback<Q>),
    Custom(Arc<dyn Filter<Q>>),
    /// Owner key(s) of a belongs-to relation
    BelongsTo,
    /// Existence of related rows
    Has,
    /// Soft-delete visibility: `with`, `only`, anything else is the default
    Trashed,
}

impl<Q: QueryContract> Clone for FilterStrategy<Q> {
    fn clone(&self) -> Self {
        match self {
            FilterStrategy::Exact { relation_constraint } => FilterStrategy::Exact {
                relation_constraint: *relation_constraint,
            },
            FilterStrategy::Partial { relation_constraint } => FilterStrategy::Partial {
                relation_constraint: *relation_constraint,
            },
            FilterStrategy::BeginsWithStrict => FilterStrategy::BeginsWithStrict,
            FilterStrategy::EndsWithStrict => FilterStrategy::EndsWithStrict,
            FilterStrategy::Operator(operator) => FilterStrategy::Operator(*operator),
            FilterStrategy::Scope => FilterStrategy::Scope,
            FilterStrategy::Callback(callback) => FilterStrategy::Callback(Arc::clone(callback)),
            FilterStrategy::Custom(filter) => FilterStrategy::Custom(Arc::clone(filter)),
            FilterStrategy::BelongsTo => FilterStrategy::BelongsTo,
            FilterStrategy::Has => FilterStrategy::Has,
            FilterStrategy::Trashed => FilterStrategy::Trashed,
        }
    }
}

impl<Q: QueryContract> fmt::Debug for FilterStrategy<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterStrategy::Exact { relation_constraint } => f
                .debug_struct("Exact")
                .field("relation_constraint", relation_constraint)
                .finish(),
            FilterStrategy::Partial { relation_constraint } => f
                .debug_struct("Partial")
                .field("relation_constraint", relation_constraint)
                .finish(),
            FilterStrategy::BeginsWithStrict => f.write_str("BeginsWithStrict"),
            FilterStrategy::EndsWithStrict => f.write_str("EndsWithStrict"),
            FilterStrategy::Operator(operator) => {
                f.debug_tuple("Operator").field(operator).finish()
            }
            FilterStrategy::Scope => f.write_str("Scope"),
            FilterStrategy::Callback(_) => f.write_str("Callback"),
            FilterStrategy::Custom(_) => f.write_str("Custom"),
            FilterStrategy::BelongsTo => f.write_str("BelongsTo"),
            FilterStrategy::Has => f.write_str("Has"),
            FilterStrategy::Trashed => f.write_str("Trashed"),
        }
    }
}

impl<Q: QueryContract> FilterStrategy<Q> {
    /// Whether the property is interpolated as a column reference
    pub fn targets_column(&self) -> bool {
        matches!(
            self,
            FilterStrategy::Exact { .. }
                | FilterStrategy::Partial { .. }
                | FilterStrategy::BeginsWithStrict
                | FilterStrategy::EndsWithStrict
                | FilterStrategy::Operator(_)
        )
    }

    pub fn apply(&self, query: Q, value: &Value, property: &str) -> Result<Q, QueryBuilderError> {
        match self {
            FilterStrategy::Exact { relation_constraint } => {
                let scalars = scalars(value, property)?;
                check_column_type(&query, property, &scalars)?;
                constrain(query, property, *relation_constraint, |column| {
                    exact_filter(column, value, scalars)
                })
            }
            FilterStrategy::Partial { relation_constraint } => {
                let scalars = scalars(value, property)?;
                constrain(query, property, *relation_constraint, |column| {
                    pattern_filter(column, value, scalars, QueryOperator::ILike, |v| {
                        format!("%{}%", v)
                    })
                })
            }
            FilterStrategy::BeginsWithStrict => {
                let scalars = scalars(value, property)?;
                constrain(query, property, false, |column| {
                    pattern_filter(column, value, scalars, QueryOperator::Like, |v| {
                        format!("{}%", v)
                    })
                })
            }
            FilterStrategy::EndsWithStrict => {
                let scalars = scalars(value, property)?;
                constrain(query, property, false, |column| {
                    pattern_filter(column, value, scalars, QueryOperator::Like, |v| {
                        format!("%{}", v)
                    })
                })
            }
            FilterStrategy::Operator(operator) => {
                let scalars = scalars(value, property)?;
                let mut filters = Vec::with_capacity(scalars.len());
                for scalar in &scalars {
                    let filter = operator_filter(property, *operator, scalar)?;
                    if let QueryFilter::Condition(condition) = &filter {
                        check_column_type(&query, property, condition.value.as_slice())?;
                    }
                    filters.push(filter);
                }
                let filter = match filters.len() {
                    1 => filters.remove(0),
                    _ => QueryFilter::or(filters),
                };
                Ok(query.where_filter(filter))
            }
            FilterStrategy::Scope => {
                let args = match value {
                    Value::Array(values) => values.clone(),
                    other => vec![other.clone()],
                };
                query
                    .call_scope(property, &args)
                    .map_err(|err| QueryBuilderError::from_scope(property, err))
            }
            FilterStrategy::Callback(callback) => callback(query, value, property),
            FilterStrategy::Custom(filter) => filter.apply(query, value, property),
            FilterStrategy::BelongsTo => {
                let keys = scalars(value, property)?;
                Ok(query.where_belongs_to(property, keys)?)
            }
            FilterStrategy::Has => {
                if truthy(value, property)? {
                    Ok(query.where_has(property, None)?)
                } else {
                    Ok(query.where_doesnt_have(property, None)?)
                }
            }
            FilterStrategy::Trashed => Ok(match value.as_str() {
                Some("with") => query.with_trashed(),
                Some("only") => query.only_trashed(),
                _ => query.without_trashed(),
            }),
        }
    }
}

/// Flatten a filter value into scalars; nested mappings are rejected
fn scalars(value: &Value, property: &str) -> Result<Vec<Value>, QueryBuilderError> {
    match value {
        Value::Object(_) => Err(QueryBuilderError::invalid_value(
            property,
            "expected a value or a list of values",
        )),
        Value::Array(values) => {
            if values.iter().any(|v| v.is_object() || v.is_array()) {
                return Err(QueryBuilderError::invalid_value(
                    property,
                    "lists may only contain plain values",
                ));
            }
            Ok(values.clone())
        }
        other => Ok(vec![other.clone()]),
    }
}

/// Reject values the column's declared type cannot hold
fn check_column_type<Q: QueryContract>(
    query: &Q,
    property: &str,
    values: &[Value],
) -> Result<(), QueryBuilderError> {
    let Some(column_type) = query.column_type(property) else {
        return Ok(());
    };
    match values.iter().find(|value| !column_type.admits(value)) {
        Some(value) => Err(QueryBuilderError::invalid_value(
            property,
            format!("`{}` is not a valid {}", scalar_text(value), column_type),
        )),
        None => Ok(()),
    }
}

/// Apply `build(column)` to the query, or to the relation named by the
/// property prefix when that prefix is a relation
fn constrain<Q, F>(
    query: Q,
    property: &str,
    relation_constraint: bool,
    build: F,
) -> Result<Q, QueryBuilderError>
where
    Q: QueryContract,
    F: FnOnce(&str) -> QueryFilter,
{
    if relation_constraint {
        if let Some((relation, column)) = property.rsplit_once('.') {
            if query.has_relation(relation) {
                return Ok(query.where_has(relation, Some(build(column)))?);
            }
        }
    }

    let column = query.qualify_column(property);
    Ok(query.where_filter(build(&column)))
}

fn exact_filter(column: &str, value: &Value, scalars: Vec<Value>) -> QueryFilter {
    match value {
        Value::Null => QueryFilter::is_null(column),
        Value::Array(_) => QueryFilter::in_values(column, scalars),
        other => QueryFilter::eq(column, other.clone()),
    }
}

fn pattern_filter(
    column: &str,
    value: &Value,
    scalars: Vec<Value>,
    operator: QueryOperator,
    pattern: impl Fn(&str) -> String,
) -> QueryFilter {
    if value.is_null() {
        return QueryFilter::is_null(column);
    }

    let mut filters: Vec<QueryFilter> = scalars
        .iter()
        .map(|scalar| {
            let text = escape_like(&scalar_text(scalar));
            QueryFilter::condition(column, operator, Some(Value::String(pattern(&text))))
        })
        .collect();

    match filters.len() {
        1 => filters.remove(0),
        _ => QueryFilter::or(filters),
    }
}

fn operator_filter(
    property: &str,
    operator: FilterOperator,
    value: &Value,
) -> Result<QueryFilter, QueryBuilderError> {
    if value.is_null() {
        return Ok(QueryFilter::is_null(property));
    }

    let (operator, value) = match (operator, value) {
        (FilterOperator::Fixed(operator), value) => (operator, numeric(value)),
        (FilterOperator::Dynamic, Value::String(raw)) => match QueryOperator::split_prefix(raw) {
            Some((_, "")) => {
                return Err(QueryBuilderError::invalid_value(
                    property,
                    format!("`{}` has an operator but no value", raw),
                ));
            }
            Some((operator, rest)) => (operator, numeric(&Value::String(rest.to_string()))),
            None => (QueryOperator::Eq, numeric(value)),
        },
        (FilterOperator::Dynamic, value) => (QueryOperator::Eq, value.clone()),
    };

    Ok(QueryFilter::condition(property, operator, Some(value)))
}

/// Numeric strings compare as numbers
fn numeric(value: &Value) -> Value {
    if let Value::String(raw) = value {
        if let Ok(integer) = raw.parse::<i64>() {
            return Value::from(integer);
        }
        if let Ok(float) = raw.parse::<f64>() {
            if float.is_finite() {
                return Value::from(float);
            }
        }
    }
    value.clone()
}

fn truthy(value: &Value, property: &str) -> Result<bool, QueryBuilderError> {
    match value {
        Value::Bool(flag) => Ok(*flag),
        Value::Number(number) => Ok(number.as_f64().is_some_and(|n| n != 0.0)),
        Value::String(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "yes" | "on" => Ok(true),
            "0" | "no" | "off" => Ok(false),
            _ => Err(QueryBuilderError::invalid_value(
                property,
                format!("`{}` is not a boolean", raw),
            )),
        },
        _ => Err(QueryBuilderError::invalid_value(property, "expected a boolean")),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

/// Escape LIKE wildcards so client text only ever matches literally
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_object::{ColumnType, Model, Query, QueryError, Relation, Scope};
    use serde_json::json;

    struct Author;

    impl Model for Author {
        fn table_name() -> &'static str {
            "authors"
        }

        fn columns() -> Vec<(&'static str, ColumnType)> {
            vec![
                ("id", ColumnType::Integer),
                ("name", ColumnType::Text),
                ("age", ColumnType::Integer),
                ("rating", ColumnType::Numeric),
                ("role", ColumnType::Text),
                ("status", ColumnType::Text),
                ("born", ColumnType::Date),
            ]
        }

        fn relations() -> Vec<Relation> {
            vec![Relation::has_many::<Book>("books", "author_id")]
        }

        fn scopes() -> Vec<Scope> {
            vec![Scope::new("bornBetween", |query, args| match args {
                [Value::String(from), Value::String(to)] => Ok(query
                    .where_op("born", QueryOperator::Gte, Value::String(from.clone()))
                    .where_op("born", QueryOperator::Lte, Value::String(to.clone()))),
                _ => Err(QueryError::scope_arguments("bornBetween", "expected two dates")),
            })]
        }
    }

    struct Book;

    impl Model for Book {
        fn table_name() -> &'static str {
            "books"
        }

        fn columns() -> Vec<(&'static str, ColumnType)> {
            vec![("author_id", ColumnType::Integer), ("title", ColumnType::Text)]
        }

        fn relations() -> Vec<Relation> {
            vec![Relation::belongs_to::<Author>("author", "author_id")]
        }
    }

    fn apply(
        strategy: FilterStrategy<Query>,
        value: Value,
        property: &str,
    ) -> (String, Vec<Value>) {
        strategy
            .apply(Query::for_model::<Author>(), &value, property)
            .unwrap()
            .build()
    }

    #[test]
    fn test_exact_scalar_and_list() {
        let exact = || FilterStrategy::Exact {
            relation_constraint: true,
        };

        let (sql, values) = apply(exact(), json!("john"), "name");
        assert_eq!(sql, "SELECT authors.* FROM authors WHERE authors.name = $1");
        assert_eq!(values, vec![json!("john")]);

        let (sql, _) = apply(exact(), json!(["1", "2"]), "id");
        assert_eq!(
            sql,
            "SELECT authors.* FROM authors WHERE authors.id IN ($1::bigint, $2::bigint)"
        );

        let (sql, _) = apply(exact(), Value::Null, "name");
        assert_eq!(sql, "SELECT authors.* FROM authors WHERE authors.name IS NULL");
    }

    #[test]
    fn test_exact_on_relation_column() {
        let (sql, values) = apply(
            FilterStrategy::Exact {
                relation_constraint: true,
            },
            json!("Dune"),
            "books.title",
        );
        assert_eq!(
            sql,
            "SELECT authors.* FROM authors WHERE EXISTS (SELECT 1 FROM books \
             WHERE books.author_id = authors.id AND books.title = $1)"
        );
        assert_eq!(values, vec![json!("Dune")]);

        let (sql, _) = apply(
            FilterStrategy::Exact {
                relation_constraint: false,
            },
            json!("Dune"),
            "books.title",
        );
        assert_eq!(sql, "SELECT authors.* FROM authors WHERE books.title::text = $1");
    }

    #[test]
    fn test_exact_rejects_mappings() {
        let result = FilterStrategy::<Query>::Exact {
            relation_constraint: true,
        }
        .apply(Query::for_model::<Author>(), &json!({"a": 1}), "name");
        assert!(matches!(
            result,
            Err(QueryBuilderError::InvalidDirectiveValue { ref name, .. }) if name == "name"
        ));
    }

    #[test]
    fn test_partial_escapes_wildcards() {
        let (sql, values) = apply(
            FilterStrategy::Partial {
                relation_constraint: true,
            },
            json!("50%_off"),
            "name",
        );
        assert_eq!(sql, "SELECT authors.* FROM authors WHERE authors.name ILIKE $1");
        assert_eq!(values, vec![json!("%50\\%\\_off%")]);

        let (sql, _) = apply(
            FilterStrategy::Partial {
                relation_constraint: true,
            },
            json!(["jo", "an"]),
            "name",
        );
        assert_eq!(
            sql,
            "SELECT authors.* FROM authors WHERE (authors.name ILIKE $1 OR authors.name ILIKE $2)"
        );
    }

    #[test]
    fn test_begins_and_ends_with() {
        let (_, values) = apply(FilterStrategy::BeginsWithStrict, json!("Jo"), "name");
        assert_eq!(values, vec![json!("Jo%")]);

        let (sql, values) = apply(FilterStrategy::EndsWithStrict, json!("son"), "name");
        assert_eq!(sql, "SELECT authors.* FROM authors WHERE authors.name LIKE $1");
        assert_eq!(values, vec![json!("%son")]);
    }

    #[test]
    fn test_fixed_and_dynamic_operators() {
        let (sql, values) = apply(
            FilterStrategy::Operator(FilterOperator::Fixed(QueryOperator::Gte)),
            json!("18"),
            "age",
        );
        assert_eq!(sql, "SELECT authors.* FROM authors WHERE authors.age >= $1::bigint");
        assert_eq!(values, vec![json!(18)]);

        let (sql, values) = apply(
            FilterStrategy::Operator(FilterOperator::Dynamic),
            json!("<2.5"),
            "rating",
        );
        assert_eq!(sql, "SELECT authors.* FROM authors WHERE authors.rating < $1::numeric");
        assert_eq!(values, vec![json!(2.5)]);

        let (sql, _) = apply(
            FilterStrategy::Operator(FilterOperator::Dynamic),
            json!("poet"),
            "role",
        );
        assert_eq!(sql, "SELECT authors.* FROM authors WHERE authors.role = $1");

        let result = FilterStrategy::<Query>::Operator(FilterOperator::Dynamic).apply(
            Query::for_model::<Author>(),
            &json!(">="),
            "age",
        );
        assert!(matches!(result, Err(QueryBuilderError::InvalidDirectiveValue { .. })));
    }

    #[test]
    fn test_has_and_belongs_to() {
        let (sql, _) = apply(FilterStrategy::Has, json!("0"), "books");
        assert_eq!(
            sql,
            "SELECT authors.* FROM authors WHERE NOT EXISTS (SELECT 1 FROM books \
             WHERE books.author_id = authors.id)"
        );

        let (sql, values) = FilterStrategy::<Query>::BelongsTo
            .apply(Query::for_model::<Book>(), &json!(["4", "5"]), "author")
            .unwrap()
            .build();
        assert_eq!(
            sql,
            "SELECT books.* FROM books WHERE books.author_id IN ($1::bigint, $2::bigint)"
        );
        assert_eq!(values, vec![json!("4"), json!("5")]);
    }

    #[test]
    fn test_values_outside_declared_type_are_rejected() {
        let exact = FilterStrategy::<Query>::Exact {
            relation_constraint: true,
        };
        let result = exact.apply(Query::for_model::<Author>(), &json!(["1", "two"]), "id");
        assert!(matches!(
            result,
            Err(QueryBuilderError::InvalidDirectiveValue { ref name, ref reason })
                if name == "id" && reason.contains("two")
        ));

        let result = FilterStrategy::<Query>::Operator(FilterOperator::Dynamic).apply(
            Query::for_model::<Author>(),
            &json!(">=2.5"),
            "age",
        );
        assert!(matches!(result, Err(QueryBuilderError::InvalidDirectiveValue { .. })));

        let result = exact.apply(Query::for_model::<Author>(), &json!("x"), "books.author_id");
        assert!(matches!(result, Err(QueryBuilderError::InvalidDirectiveValue { .. })));

        // Undeclared columns accept anything and compare as text
        let (sql, _) = apply(exact, json!("abc"), "nickname");
        assert_eq!(sql, "SELECT authors.* FROM authors WHERE authors.nickname::text = $1");
    }

    #[test]
    fn test_scope_rejecting_arguments_is_a_client_error() {
        let (sql, values) = apply(
            FilterStrategy::Scope,
            json!(["1990-01-01", "1999-12-31"]),
            "bornBetween",
        );
        assert_eq!(
            sql,
            "SELECT authors.* FROM authors \
             WHERE authors.born >= $1::date AND authors.born <= $2::date"
        );
        assert_eq!(values, vec![json!("1990-01-01"), json!("1999-12-31")]);

        let err = FilterStrategy::<Query>::Scope
            .apply(Query::for_model::<Author>(), &json!("1990-01-01"), "bornBetween")
            .unwrap_err();
        assert!(matches!(
            err,
            QueryBuilderError::InvalidDirectiveValue { ref name, .. } if name == "bornBetween"
        ));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_callback_receives_property() {
        let callback: FilterCallback<Query> =
            Arc::new(|query: Query, value: &Value, property: &str| {
                Ok(query.where_op(property, QueryOperator::Ne, value.clone()))
            });
        let (sql, _) = apply(FilterStrategy::Callback(callback), json!("x"), "status");
        assert_eq!(sql, "SELECT authors.* FROM authors WHERE authors.status != $1");
    }
}
