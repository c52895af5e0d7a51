//! Shared fixtures for the integration suites
//!
//! A small model graph and an in-memory executor that records every
//! statement and answers with canned rows, in order.

#![allow(dead_code)]

use async_trait::async_trait;
use query_object::{
    ColumnType, GlobalScope, Model, QueryContract, QueryError, QueryExecutor, QueryFilter,
    QueryOperator, Relation, Row, Scope, SoftDelete,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

pub struct TestModel;

impl Model for TestModel {
    fn table_name() -> &'static str {
        "test_models"
    }

    fn columns() -> Vec<(&'static str, ColumnType)> {
        vec![
            ("id", ColumnType::Integer),
            ("name", ColumnType::Text),
            ("created_at", ColumnType::Timestamp),
        ]
    }

    fn relations() -> Vec<Relation> {
        vec![
            Relation::has_many::<RelatedModel>("relatedModels", "test_model_id"),
            Relation::belongs_to_many::<RelatedThroughPivotModel>(
                "relatedThroughPivotModels",
                "pivot_models",
                "test_model_id",
                "related_through_pivot_model_id",
            ),
            Relation::belongs_to_many::<RelatedThroughPivotModel>(
                "relatedThroughPivotModelsWithPivot",
                "pivot_models",
                "test_model_id",
                "related_through_pivot_model_id",
            )
            .with_pivot(["location"]),
        ]
    }

    fn scopes() -> Vec<Scope> {
        vec![
            Scope::new("named", |query, args| {
                let name = args
                    .first()
                    .cloned()
                    .ok_or_else(|| QueryError::scope_arguments("named", "expected a name"))?;
                Ok(query.where_op("name", QueryOperator::Eq, name))
            }),
            Scope::new("createdBetween", |query, args| match args {
                [from, to] => Ok(query
                    .where_op("created_at", QueryOperator::Gte, from.clone())
                    .where_op("created_at", QueryOperator::Lte, to.clone())),
                _ => Err(QueryError::scope_arguments("createdBetween", "expected two dates")),
            }),
        ]
    }
}

pub struct RelatedModel;

impl Model for RelatedModel {
    fn table_name() -> &'static str {
        "related_models"
    }

    fn columns() -> Vec<(&'static str, ColumnType)> {
        vec![
            ("id", ColumnType::Integer),
            ("test_model_id", ColumnType::Integer),
            ("name", ColumnType::Text),
        ]
    }

    fn relations() -> Vec<Relation> {
        vec![
            Relation::belongs_to::<TestModel>("testModel", "test_model_id"),
            Relation::has_many::<NestedRelatedModel>("nestedRelatedModels", "related_model_id"),
        ]
    }
}

pub struct NestedRelatedModel;

impl Model for NestedRelatedModel {
    fn table_name() -> &'static str {
        "nested_related_models"
    }

    fn columns() -> Vec<(&'static str, ColumnType)> {
        vec![("related_model_id", ColumnType::Integer), ("name", ColumnType::Text)]
    }
}

pub struct RelatedThroughPivotModel;

impl Model for RelatedThroughPivotModel {
    fn table_name() -> &'static str {
        "related_through_pivot_models"
    }

    fn columns() -> Vec<(&'static str, ColumnType)> {
        vec![("id", ColumnType::Integer), ("name", ColumnType::Text)]
    }
}

pub struct SoftDeleteModel;

impl Model for SoftDeleteModel {
    fn table_name() -> &'static str {
        "soft_delete_models"
    }

    fn soft_delete() -> Option<SoftDelete> {
        Some(SoftDelete::DeletedAt("deleted_at".to_string()))
    }
}

pub struct ScopeModel;

impl Model for ScopeModel {
    fn table_name() -> &'static str {
        "scope_models"
    }

    fn columns() -> Vec<(&'static str, ColumnType)> {
        vec![("name", ColumnType::Text)]
    }

    fn global_scopes() -> Vec<GlobalScope> {
        vec![GlobalScope::new(
            "nameNotTest",
            QueryFilter::ne("name", Value::String("test".to_string())),
        )]
    }
}

/// Executor that records statements and replays canned result sets
#[derive(Default)]
pub struct RecordingExecutor {
    responses: Mutex<VecDeque<Vec<Row>>>,
    statements: Mutex<Vec<(String, Vec<Value>)>>,
}

impl RecordingExecutor {
    /// Answer the n-th statement with the n-th result set; later ones get no rows
    pub fn new(responses: Vec<Value>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(rows).collect()),
            statements: Mutex::new(Vec::new()),
        }
    }

    pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.statements.lock().unwrap().clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.statements().into_iter().map(|(sql, _)| sql).collect()
    }
}

#[async_trait]
impl QueryExecutor for RecordingExecutor {
    async fn fetch_rows(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, QueryError> {
        self.statements
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        Ok(self.responses.lock().unwrap().pop_front().unwrap_or_default())
    }
}

/// `[{...}, {...}]` as rows
pub fn rows(value: Value) -> Vec<Row> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
