use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

impl JoinType {
    pub fn keyword(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
        }
    }
}

/// `<kind> table ON left = right`.
///
/// A table is joined at most once per query: `join_if_absent` keeps the first
/// clause for a table whatever its kind or operand order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: String,
    pub left: String,
    pub right: String,
}

impl JoinClause {
    pub fn on(
        join_type: JoinType,
        table: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        Self {
            join_type,
            table: table.into(),
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn inner(
        table: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        Self::on(JoinType::Inner, table, left, right)
    }

    pub fn left(
        table: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        Self::on(JoinType::Left, table, left, right)
    }

    pub fn to_sql(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for JoinClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ON {} = {}",
            self.join_type.keyword(),
            self.table,
            self.left,
            self.right
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_rendering() {
        let join =
            JoinClause::inner("related_models", "test_models.id", "related_models.test_model_id");
        assert_eq!(
            join.to_sql(),
            "INNER JOIN related_models ON test_models.id = related_models.test_model_id"
        );

        let join = JoinClause::left("pivot_models", "pivot_models.test_model_id", "test_models.id");
        assert_eq!(
            join.to_sql(),
            "LEFT JOIN pivot_models ON pivot_models.test_model_id = test_models.id"
        );
    }

    #[test]
    fn test_join_kinds_differ() {
        let (parent, child) = ("test_models.id", "related_models.test_model_id");
        let inner = JoinClause::inner("related_models", parent, child);
        let left = JoinClause::left("related_models", parent, child);

        assert_ne!(inner, left);
        assert_eq!(inner.table, left.table);
    }
}
