//! SQL text generation
//!
//! Values are never interpolated: every value becomes a `$n` placeholder and is
//! collected, in placeholder order, for binding.
//!
//! Placeholders of a typed condition carry an explicit cast (`$1::bigint`).
//! An untyped column compared against strings is compared as `column::text`.

use crate::column::ColumnType;
use crate::query_builder::filter::{LogicalOperator, QueryCondition, QueryFilter, QueryOperator};
use crate::query_builder::join::JoinClause;
use crate::query_builder::ordering::SortOrder;
use crate::query_builder::select::SelectField;
use crate::query_builder::subquery::RelationSubquery;
use serde_json::Value;

/// Renders query parts while numbering placeholders across the whole statement
#[derive(Debug, Default)]
pub struct SqlGenerator {
    values: Vec<Value>,
}

impl SqlGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound values collected so far
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    fn placeholder(&mut self, value: Value) -> String {
        self.values.push(value);
        format!("${}", self.values.len())
    }

    /// Placeholder cast to `cast`; strings already bind as text
    fn cast_placeholder(&mut self, value: Value, cast: Option<ColumnType>) -> String {
        let cast = match cast {
            Some(ColumnType::Text) if value.is_string() => None,
            other => other,
        };
        let param = self.placeholder(value);
        match cast {
            Some(column_type) => format!("{}::{}", param, column_type.sql_type()),
            None => param,
        }
    }

    /// Build SELECT list; an empty column list selects every column of `table`
    pub fn build_select_clause(
        &mut self,
        table: &str,
        columns: &[SelectField],
        extra: &[SelectField],
    ) -> String {
        let mut parts: Vec<String> = if columns.is_empty() {
            vec![format!("{}.*", table)]
        } else {
            columns.iter().map(|field| self.build_select_field(field)).collect()
        };

        parts.extend(extra.iter().map(|field| self.build_select_field(field)));
        parts.join(", ")
    }

    fn build_select_field(&mut self, field: &SelectField) -> String {
        match field {
            SelectField::Column(name) => name.clone(),
            SelectField::ColumnAs { column, alias } => format!("{} AS {}", column, alias),
            SelectField::RelationCount { subquery, alias } => {
                format!("({}) AS {}", self.build_subquery(subquery, "COUNT(*)"), alias)
            }
            SelectField::RelationExists { subquery, alias } => {
                format!("EXISTS ({}) AS {}", self.build_subquery(subquery, "1"), alias)
            }
        }
    }

    /// Build JOIN clauses
    pub fn build_join_clause(joins: &[JoinClause]) -> String {
        joins
            .iter()
            .map(JoinClause::to_sql)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Build WHERE clause from conditions
    pub fn build_where_clause(&mut self, conditions: &[QueryFilter]) -> String {
        let conditions_sql = self.build_conjunction(conditions);

        if conditions_sql.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions_sql)
        }
    }

    fn build_conjunction(&mut self, conditions: &[QueryFilter]) -> String {
        conditions
            .iter()
            .map(|condition| self.build_condition_sql(condition))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    fn build_condition_sql(&mut self, filter: &QueryFilter) -> String {
        match filter {
            QueryFilter::Condition(condition) => self.build_single_condition_sql(condition),
            QueryFilter::Group { operator, filters } => {
                if filters.is_empty() {
                    return match operator {
                        LogicalOperator::And => "1=1".to_string(),
                        LogicalOperator::Or => "1=0".to_string(),
                    };
                }

                let operator_str = match operator {
                    LogicalOperator::And => " AND ",
                    LogicalOperator::Or => " OR ",
                };

                let group_conditions = filters
                    .iter()
                    .map(|f| self.build_condition_sql(f))
                    .collect::<Vec<_>>()
                    .join(operator_str);

                format!("({})", group_conditions)
            }
            QueryFilter::Exists { negated, subquery } => {
                let keyword = if *negated { "NOT EXISTS" } else { "EXISTS" };
                format!("{} ({})", keyword, self.build_subquery(subquery, "1"))
            }
        }
    }

    fn build_subquery(&mut self, subquery: &RelationSubquery, projection: &str) -> String {
        let mut sql = format!("SELECT {} FROM {}", projection, subquery.table);

        if !subquery.joins.is_empty() {
            sql.push(' ');
            sql.push_str(&Self::build_join_clause(&subquery.joins));
        }

        let (inner, outer) = &subquery.link;
        sql.push_str(&format!(" WHERE {} = {}", inner, outer));

        if !subquery.filters.is_empty() {
            let filters_sql = self.build_conjunction(&subquery.filters);
            sql.push_str(" AND ");
            sql.push_str(&filters_sql);
        }

        sql
    }

    fn build_single_condition_sql(&mut self, condition: &QueryCondition) -> String {
        let field = &condition.field;

        match (&condition.operator, &condition.value) {
            (QueryOperator::IsNull, _)
            | (QueryOperator::Eq, None)
            | (QueryOperator::Eq, Some(Value::Null)) => format!("{} IS NULL", field),
            (QueryOperator::IsNotNull, _)
            | (QueryOperator::Ne, None)
            | (QueryOperator::Ne, Some(Value::Null)) => format!("{} IS NOT NULL", field),
            (QueryOperator::In, Some(Value::Array(values))) => {
                if values.is_empty() {
                    return "1=0".to_string();
                }
                let (field, cast) = Self::operand(field, condition.cast, values);
                let placeholders = self.placeholders(values, cast);
                format!("{} IN ({})", field, placeholders)
            }
            (QueryOperator::NotIn, Some(Value::Array(values))) => {
                if values.is_empty() {
                    return "1=1".to_string();
                }
                let (field, cast) = Self::operand(field, condition.cast, values);
                let placeholders = self.placeholders(values, cast);
                format!("{} NOT IN ({})", field, placeholders)
            }
            (QueryOperator::In, _) => "1=0".to_string(),
            (QueryOperator::NotIn, _) => "1=1".to_string(),
            (operator @ (QueryOperator::Like | QueryOperator::ILike), Some(value)) => {
                let field = match condition.cast {
                    Some(ColumnType::Text) => field.clone(),
                    _ => format!("{}::text", field),
                };
                let param = self.cast_placeholder(value.clone(), Some(ColumnType::Text));
                format!("{} {} {}", field, operator.to_sql(), param)
            }
            (operator, Some(value)) => {
                let (field, cast) =
                    Self::operand(field, condition.cast, std::slice::from_ref(value));
                let param = self.cast_placeholder(value.clone(), cast);
                format!("{} {} {}", field, operator.to_sql(), param)
            }
            // Comparison without a value can never match
            (_, None) => "1=0".to_string(),
        }
    }

    /// Column expression and placeholder cast for comparing `field` with `values`
    fn operand(
        field: &str,
        cast: Option<ColumnType>,
        values: &[Value],
    ) -> (String, Option<ColumnType>) {
        match cast {
            Some(column_type) => (field.to_string(), Some(column_type)),
            None if values.iter().any(Value::is_string) => {
                (format!("{}::text", field), Some(ColumnType::Text))
            }
            None => (field.to_string(), None),
        }
    }

    fn placeholders(&mut self, values: &[Value], cast: Option<ColumnType>) -> String {
        values
            .iter()
            .map(|value| self.cast_placeholder(value.clone(), cast))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Build ORDER BY clause
    pub fn build_order_clause(order_by: &[(String, SortOrder)]) -> String {
        if order_by.is_empty() {
            return String::new();
        }

        let order_items: Vec<String> = order_by
            .iter()
            .map(|(field, order)| format!("{} {}", field, order.to_sql()))
            .collect();

        format!("ORDER BY {}", order_items.join(", "))
    }
}
