//! Query execution
//!
//! Rows come back as JSON objects so that eager-loaded relations can be
//! nested into their parents without a typed row per model.

use crate::contract::QueryContract;
use crate::errors::QueryError;
use crate::model::ModelSchema;
use crate::query_builder::{EagerLoad, Query};
use crate::relation::Relation;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;

/// One result row, column name to value
pub type Row = serde_json::Map<String, Value>;

/// Runs rendered SQL
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn fetch_rows(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, QueryError>;
}

/// How a JSON parameter is sent to PostgreSQL.
///
/// Strings are always sent as text; the `$n::<type>` casts rendered for
/// declared columns convert them on the server.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Text(String),
    BigInt(i64),
    Double(f64),
    Bool(bool),
    Null,
    Json(Value),
}

impl From<Value> for BindValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => BindValue::Text(s),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    BindValue::BigInt(i)
                } else if let Some(f) = n.as_f64() {
                    BindValue::Double(f)
                } else {
                    BindValue::Text(n.to_string())
                }
            }
            Value::Bool(b) => BindValue::Bool(b),
            Value::Null => BindValue::Null,
            other => BindValue::Json(other),
        }
    }
}

macro_rules! bind_json_param {
    ($query:expr, $param:expr) => {
        match BindValue::from($param) {
            BindValue::Text(s) => $query.bind(s),
            BindValue::BigInt(i) => $query.bind(i),
            BindValue::Double(f) => $query.bind(f),
            BindValue::Bool(b) => $query.bind(b),
            BindValue::Null => $query.bind(Option::<String>::None),
            BindValue::Json(other) => $query.bind(sqlx::types::Json(other)),
        }
    };
}

#[async_trait]
impl QueryExecutor for sqlx::PgPool {
    async fn fetch_rows(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, QueryError> {
        let wrapped = format!("SELECT row_to_json(q) AS row FROM ({}) AS q", sql);

        let mut query = sqlx::query_scalar::<_, sqlx::types::Json<Row>>(&wrapped);
        for param in params {
            query = bind_json_param!(query, param.clone());
        }

        let rows = query.fetch_all(self).await?;
        Ok(rows.into_iter().map(|row| row.0).collect())
    }
}

impl Query {
    /// Fetch every matching row with its eager-loaded relations
    pub async fn get<E>(&self, executor: &E) -> Result<Vec<Row>, QueryError>
    where
        E: QueryExecutor + ?Sized,
    {
        fetch_tree(self.clone(), executor).await
    }

    pub async fn first<E>(&self, executor: &E) -> Result<Option<Row>, QueryError>
    where
        E: QueryExecutor + ?Sized,
    {
        let rows = fetch_tree(self.clone().limit(1), executor).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn count<E>(&self, executor: &E) -> Result<i64, QueryError>
    where
        E: QueryExecutor + ?Sized,
    {
        let (sql, params) = self.build_count();
        debug_log!("[COUNT] {} ({} params)", sql, params.len());

        let rows = executor.fetch_rows(&sql, &params).await?;
        rows.first()
            .and_then(|row| row.get("aggregate"))
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                QueryError::Serialization("count query returned no aggregate".to_string())
            })
    }
}

fn fetch_tree<'a, E>(query: Query, executor: &'a E) -> BoxFuture<'a, Result<Vec<Row>, QueryError>>
where
    E: QueryExecutor + ?Sized,
{
    Box::pin(async move {
        let loads = query.eager_loads().to_vec();
        let schema = query.schema().clone();

        let mut query = query;
        for load in &loads {
            if let Some(relation) = schema.relation(&load.relation) {
                query = query.ensure_selected(&relation.parent_key_column(&schema));
            }
        }

        let (sql, params) = query.build();
        debug_log!("[QUERY] {} ({} params)", sql, params.len());

        let mut rows = executor.fetch_rows(&sql, &params).await?;
        if query.nests_pivot() {
            rows.iter_mut().for_each(nest_pivot);
        }

        for load in &loads {
            load_relation(&mut rows, &schema, load, executor).await?;
        }

        Ok(rows)
    })
}

async fn load_relation<E>(
    rows: &mut [Row],
    schema: &ModelSchema,
    load: &EagerLoad,
    executor: &E,
) -> Result<(), QueryError>
where
    E: QueryExecutor + ?Sized,
{
    let relation: Relation = schema
        .relation(&load.relation)
        .cloned()
        .ok_or_else(|| QueryError::unknown_relation(schema.table_name(), &load.relation))?;
    let related = relation.related();
    let parent_key = relation.parent_key_column(schema);

    let mut keys: Vec<Value> = Vec::new();
    for row in rows.iter() {
        if let Some(key) = row.get(&parent_key) {
            if !key.is_null() && !keys.contains(key) {
                keys.push(key.clone());
            }
        }
    }

    let mut groups: HashMap<String, Vec<Row>> = HashMap::new();
    if !keys.is_empty() {
        trace_log!(
            "[EAGER] {}.{} for {} keys",
            schema.table_name(),
            load.relation,
            keys.len()
        );

        let mut child = relation.eager_query(related.clone(), keys);
        if let Some(constraint) = &load.constraint {
            child = constraint(child);
        }
        child = relation
            .ensure_match_column(child)
            .push_eager_loads(load.nested.clone());

        for row in fetch_tree(child, executor).await? {
            if let Some(key) = relation.match_key(&related, &row) {
                groups.entry(key_string(key)).or_default().push(row);
            }
        }
    }

    for row in rows.iter_mut() {
        let matched = row
            .get(&parent_key)
            .and_then(|key| groups.get(&key_string(key)));

        let value = if relation.is_many() {
            Value::Array(
                matched
                    .map(|children| children.iter().cloned().map(Value::Object).collect())
                    .unwrap_or_default(),
            )
        } else {
            matched
                .and_then(|children| children.first())
                .cloned()
                .map(Value::Object)
                .unwrap_or(Value::Null)
        };

        row.insert(load.relation.clone(), value);
    }

    Ok(())
}

fn key_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Fold `pivot_*` columns into a nested `pivot` object
fn nest_pivot(row: &mut Row) {
    let keys: Vec<String> = row
        .keys()
        .filter(|key| key.starts_with("pivot_"))
        .cloned()
        .collect();
    if keys.is_empty() {
        return;
    }

    let mut pivot = Row::new();
    for key in keys {
        if let Some(value) = row.remove(&key) {
            pivot.insert(key["pivot_".len()..].to_string(), value);
        }
    }
    row.insert("pivot".to_string(), Value::Object(pivot));
}
