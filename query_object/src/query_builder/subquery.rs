use super::filter::QueryFilter;
use super::join::JoinClause;

/// A correlated subquery over a related table, linked back to the outer query.
///
/// Rendered as `EXISTS (...)` for relation-existence constraints and as a
/// scalar `COUNT(*)` / `EXISTS` column for relation counts.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationSubquery {
    pub table: String,
    pub joins: Vec<JoinClause>,
    /// `(inner column, outer column)` equated to correlate the subquery
    pub link: (String, String),
    pub filters: Vec<QueryFilter>,
}

impl RelationSubquery {
    pub fn new(
        table: impl Into<String>,
        inner_column: impl Into<String>,
        outer_column: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            joins: Vec::new(),
            link: (inner_column.into(), outer_column.into()),
            filters: Vec::new(),
        }
    }

    pub fn join(mut self, join: JoinClause) -> Self {
        if !self.joins.contains(&join) {
            self.joins.push(join);
        }
        self
    }

    pub fn filter(mut self, filter: QueryFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(mut self, filters: Vec<QueryFilter>) -> Self {
        self.filters.extend(filters);
        self
    }
}
