//! WHERE clause building blocks

use super::subquery::RelationSubquery;
use crate::column::ColumnType;
use crate::model::ModelSchema;
use serde_json::Value;

/// Comparison applied by a [`QueryCondition`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    /// Case-insensitive LIKE
    ILike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl QueryOperator {
    /// Comparison operators a client may spell out, longest first so that
    /// prefix matching picks `>=` before `>`.
    const SYMBOLS: [(&'static str, QueryOperator); 7] = [
        (">=", QueryOperator::Gte),
        ("<=", QueryOperator::Lte),
        ("!=", QueryOperator::Ne),
        ("<>", QueryOperator::Ne),
        (">", QueryOperator::Gt),
        ("<", QueryOperator::Lt),
        ("=", QueryOperator::Eq),
    ];

    /// Split a leading comparison symbol off a raw value: `">=10"` gives `(Gte, "10")`
    pub fn split_prefix(raw: &str) -> Option<(Self, &str)> {
        let trimmed = raw.trim_start();
        Self::SYMBOLS.iter().find_map(|(symbol, operator)| {
            trimmed
                .strip_prefix(symbol)
                .map(|rest| (*operator, rest.trim_start()))
        })
    }

    pub fn to_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::ILike => "ILIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }
}

/// `field <operator> value`; `value` is `None` for the null checks
#[derive(Debug, Clone, PartialEq)]
pub struct QueryCondition {
    pub field: String,
    pub operator: QueryOperator,
    pub value: Option<Value>,
    /// Declared type of `field`, when known
    pub cast: Option<ColumnType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

/// WHERE tree: conditions, AND/OR groups and relation existence checks
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFilter {
    Condition(QueryCondition),
    Group {
        operator: LogicalOperator,
        filters: Vec<QueryFilter>,
    },
    /// `EXISTS (...)` / `NOT EXISTS (...)` over a related table
    Exists {
        negated: bool,
        subquery: Box<RelationSubquery>,
    },
}

impl QueryFilter {
    pub fn condition(field: &str, operator: QueryOperator, value: Option<Value>) -> Self {
        Self::Condition(QueryCondition {
            field: field.to_string(),
            operator,
            value,
            cast: None,
        })
    }

    fn group(operator: LogicalOperator, filters: Vec<QueryFilter>) -> Self {
        Self::Group { operator, filters }
    }

    pub fn and(filters: Vec<QueryFilter>) -> Self {
        Self::group(LogicalOperator::And, filters)
    }

    pub fn or(filters: Vec<QueryFilter>) -> Self {
        Self::group(LogicalOperator::Or, filters)
    }

    pub fn eq(field: &str, value: Value) -> Self {
        Self::condition(field, QueryOperator::Eq, Some(value))
    }

    pub fn ne(field: &str, value: Value) -> Self {
        Self::condition(field, QueryOperator::Ne, Some(value))
    }

    pub fn gt(field: &str, value: Value) -> Self {
        Self::condition(field, QueryOperator::Gt, Some(value))
    }

    pub fn in_values(field: &str, values: Vec<Value>) -> Self {
        Self::condition(field, QueryOperator::In, Some(Value::Array(values)))
    }

    pub fn not_in_values(field: &str, values: Vec<Value>) -> Self {
        Self::condition(field, QueryOperator::NotIn, Some(Value::Array(values)))
    }

    pub fn is_null(field: &str) -> Self {
        Self::condition(field, QueryOperator::IsNull, None)
    }

    pub fn is_not_null(field: &str) -> Self {
        Self::condition(field, QueryOperator::IsNotNull, None)
    }

    pub fn exists(subquery: RelationSubquery) -> Self {
        Self::Exists { negated: false, subquery: Box::new(subquery) }
    }

    pub fn not_exists(subquery: RelationSubquery) -> Self {
        Self::Exists { negated: true, subquery: Box::new(subquery) }
    }

    /// Prefix every unqualified condition field with `table`.
    ///
    /// Subquery internals are left alone: they are already bound to their own table.
    pub fn qualified(self, table: &str) -> Self {
        match self {
            QueryFilter::Condition(mut condition) => {
                if !condition.field.contains('.') {
                    condition.field = format!("{}.{}", table, condition.field);
                }
                QueryFilter::Condition(condition)
            }
            QueryFilter::Group { operator, filters } => QueryFilter::Group {
                operator,
                filters: filters.into_iter().map(|f| f.qualified(table)).collect(),
            },
            exists @ QueryFilter::Exists { .. } => exists,
        }
    }

    /// Attach the declared type of every condition field that belongs to `schema`
    pub fn typed(self, schema: &ModelSchema) -> Self {
        match self {
            QueryFilter::Condition(mut condition) => {
                if condition.cast.is_none() {
                    condition.cast = schema.column_type(&condition.field);
                }
                QueryFilter::Condition(condition)
            }
            QueryFilter::Group { operator, filters } => QueryFilter::Group {
                operator,
                filters: filters.into_iter().map(|f| f.typed(schema)).collect(),
            },
            exists @ QueryFilter::Exists { .. } => exists,
        }
    }
}
