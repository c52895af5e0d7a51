use super::subquery::RelationSubquery;

/// One entry of the SELECT list
#[derive(Debug, Clone, PartialEq)]
pub enum SelectField {
    /// A (usually table-qualified) column
    Column(String),
    /// `column AS alias`
    ColumnAs { column: String, alias: String },
    /// `(SELECT COUNT(*) ...) AS alias`
    RelationCount {
        subquery: RelationSubquery,
        alias: String,
    },
    /// `EXISTS (SELECT 1 ...) AS alias`
    RelationExists {
        subquery: RelationSubquery,
        alias: String,
    },
}

impl SelectField {
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column(name.into())
    }

    pub fn aliased(column: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::ColumnAs {
            column: column.into(),
            alias: alias.into(),
        }
    }

    /// Output name of this field in a result row
    pub fn output_name(&self) -> &str {
        match self {
            SelectField::Column(column) => column.rsplit('.').next().unwrap_or(column),
            SelectField::ColumnAs { alias, .. }
            | SelectField::RelationCount { alias, .. }
            | SelectField::RelationExists { alias, .. } => alias,
        }
    }
}
