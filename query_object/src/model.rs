//! Model metadata
//!
//! A [`Model`] describes a table declaratively: its primary key, column types,
//! relations, named scopes, global scopes and soft-delete column. [`ModelSchema`] is the
//! runtime form of that description that queries carry around.

use crate::column::ColumnType;
use crate::errors::QueryError;
use crate::query_builder::{GlobalScopeMode, Query, QueryFilter, TrashedMode};
use crate::relation::{Relation, RelationQuery};
use crate::validation::{ValidatedFieldName, ValidatedTableName, ValidationError};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub type ScopeFn = Arc<dyn Fn(Query, &[Value]) -> Result<Query, QueryError> + Send + Sync>;

/// A named, reusable query transformation callable by name
#[derive(Clone)]
pub struct Scope {
    pub name: String,
    apply: ScopeFn,
}

impl Scope {
    pub fn new<F>(name: impl Into<String>, apply: F) -> Self
    where
        F: Fn(Query, &[Value]) -> Result<Query, QueryError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            apply: Arc::new(apply),
        }
    }

    pub fn apply(&self, query: Query, args: &[Value]) -> Result<Query, QueryError> {
        (self.apply)(query, args)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").field("name", &self.name).finish()
    }
}

/// A constraint added to every query of a model until it is switched off
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalScope {
    pub name: String,
    pub filter: QueryFilter,
}

impl GlobalScope {
    pub fn new(name: impl Into<String>, filter: QueryFilter) -> Self {
        Self {
            name: name.into(),
            filter,
        }
    }
}

/// How a model marks rows as deleted without removing them
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoftDelete {
    /// Boolean column that is `TRUE` while the row is live
    ActiveFlag(String),
    /// Nullable timestamp column set when the row is deleted
    DeletedAt(String),
}

impl SoftDelete {
    pub fn column(&self) -> &str {
        match self {
            SoftDelete::ActiveFlag(column) | SoftDelete::DeletedAt(column) => column,
        }
    }

    fn live(&self, table: &str) -> QueryFilter {
        let column = format!("{}.{}", table, self.column());
        match self {
            SoftDelete::ActiveFlag(_) => QueryFilter::eq(&column, Value::Bool(true)),
            SoftDelete::DeletedAt(_) => QueryFilter::is_null(&column),
        }
    }

    fn trashed(&self, table: &str) -> QueryFilter {
        let column = format!("{}.{}", table, self.column());
        match self {
            SoftDelete::ActiveFlag(_) => QueryFilter::eq(&column, Value::Bool(false)),
            SoftDelete::DeletedAt(_) => QueryFilter::is_not_null(&column),
        }
    }
}

/// Declarative table description
pub trait Model: Send + Sync + 'static {
    fn table_name() -> &'static str;

    fn primary_key() -> &'static str {
        "id"
    }

    /// Declared column types; undeclared columns compare as text
    fn columns() -> Vec<(&'static str, ColumnType)> {
        Vec::new()
    }

    fn relations() -> Vec<Relation> {
        Vec::new()
    }

    fn scopes() -> Vec<Scope> {
        Vec::new()
    }

    fn global_scopes() -> Vec<GlobalScope> {
        Vec::new()
    }

    fn soft_delete() -> Option<SoftDelete> {
        None
    }

    fn schema() -> ModelSchema
    where
        Self: Sized,
    {
        ModelSchema::of::<Self>()
    }

    /// Fresh query over every live row of this model
    fn query() -> Query
    where
        Self: Sized,
    {
        Query::new(Self::schema())
    }
}

/// Runtime model description
#[derive(Clone)]
pub struct ModelSchema {
    table: String,
    primary_key: String,
    columns: Vec<(String, ColumnType)>,
    relations: Vec<Relation>,
    scopes: Vec<Scope>,
    global_scopes: Vec<GlobalScope>,
    soft_delete: Option<SoftDelete>,
}

impl ModelSchema {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: "id".to_string(),
            columns: Vec::new(),
            relations: Vec::new(),
            scopes: Vec::new(),
            global_scopes: Vec::new(),
            soft_delete: None,
        }
    }

    pub fn of<M: Model>() -> Self {
        Self {
            table: M::table_name().to_string(),
            primary_key: M::primary_key().to_string(),
            columns: M::columns()
                .into_iter()
                .map(|(name, column_type)| (name.to_string(), column_type))
                .collect(),
            relations: M::relations(),
            scopes: M::scopes(),
            global_scopes: M::global_scopes(),
            soft_delete: M::soft_delete(),
        }
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    pub fn with_column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        let name = name.into();
        self.columns.retain(|(existing, _)| *existing != name);
        self.columns.push((name, column_type));
        self
    }

    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relations.retain(|existing| existing.name != relation.name);
        self.relations.push(relation);
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scopes.retain(|existing| existing.name != scope.name);
        self.scopes.push(scope);
        self
    }

    pub fn with_global_scope(mut self, scope: GlobalScope) -> Self {
        self.global_scopes.push(scope);
        self
    }

    pub fn with_soft_delete(mut self, soft_delete: SoftDelete) -> Self {
        self.soft_delete = Some(soft_delete);
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Declared type of a column of this table, bare or qualified with the table name
    pub fn column_type(&self, column: &str) -> Option<ColumnType> {
        let column = match column.rsplit_once('.') {
            Some((table, column)) if table == self.table => column,
            Some(_) => return None,
            None => column,
        };
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, column_type)| *column_type)
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|relation| relation.name == name)
    }

    pub fn scope(&self, name: &str) -> Option<&Scope> {
        self.scopes.iter().find(|scope| scope.name == name)
    }

    pub fn global_scopes(&self) -> &[GlobalScope] {
        &self.global_scopes
    }

    pub fn soft_delete(&self) -> Option<&SoftDelete> {
        self.soft_delete.as_ref()
    }

    /// `table.column`; already-qualified columns pass through
    pub fn qualify(&self, column: &str) -> String {
        if column.contains('.') {
            column.to_string()
        } else {
            format!("{}.{}", self.table, column)
        }
    }

    /// Check every identifier this schema interpolates into SQL
    pub fn validate(&self) -> Result<(), ValidationError> {
        ValidatedTableName::new(&self.table)?;
        ValidatedFieldName::new(&self.primary_key)?;
        for (column, _) in &self.columns {
            ValidatedFieldName::new(column)?;
        }
        if let Some(soft_delete) = &self.soft_delete {
            ValidatedFieldName::new(soft_delete.column())?;
        }
        for relation in &self.relations {
            ValidatedFieldName::new(&relation.name)?;
            relation.kind.validate()?;
        }
        Ok(())
    }

    /// Walk a dotted relation path, returning each relation with the schema it leads to
    pub fn resolve_relation_path(
        &self,
        path: &str,
    ) -> Result<Vec<(Relation, ModelSchema)>, QueryError> {
        let mut chain = Vec::new();
        let mut current = self.clone();

        for segment in path.split('.') {
            let relation = current
                .relation(segment)
                .cloned()
                .ok_or_else(|| QueryError::unknown_relation(current.table_name(), segment))?;
            let related = relation.related();
            related.validate()?;
            chain.push((relation, related.clone()));
            current = related;
        }

        Ok(chain)
    }

    /// Constraints implied by soft deletes and global scopes
    pub fn default_constraints(
        &self,
        trashed: TrashedMode,
        scopes: &GlobalScopeMode,
    ) -> Vec<QueryFilter> {
        let mut constraints: Vec<QueryFilter> = self
            .global_scopes
            .iter()
            .filter(|scope| scopes.applies(&scope.name))
            .map(|scope| scope.filter.clone().qualified(&self.table).typed(self))
            .collect();

        if let Some(soft_delete) = &self.soft_delete {
            match trashed {
                TrashedMode::WithoutTrashed => {
                    constraints.push(soft_delete.live(&self.table).typed(self))
                }
                TrashedMode::OnlyTrashed => {
                    constraints.push(soft_delete.trashed(&self.table).typed(self))
                }
                TrashedMode::WithTrashed => {}
            }
        }

        constraints
    }

    /// Query over the rows related to the parent row identified by `parent_key`
    pub fn relation_query(
        &self,
        name: &str,
        parent_key: Value,
    ) -> Result<RelationQuery, QueryError> {
        let relation = self
            .relation(name)
            .cloned()
            .ok_or_else(|| QueryError::unknown_relation(&self.table, name))?;
        RelationQuery::new(self.clone(), relation, parent_key)
    }
}

impl fmt::Debug for ModelSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSchema")
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("columns", &self.columns)
            .field(
                "relations",
                &self.relations.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            )
            .field(
                "scopes",
                &self.scopes.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            )
            .field("global_scopes", &self.global_scopes)
            .field("soft_delete", &self.soft_delete)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Post;

    impl Model for Post {
        fn table_name() -> &'static str {
            "posts"
        }

        fn columns() -> Vec<(&'static str, ColumnType)> {
            vec![("id", ColumnType::Integer), ("published", ColumnType::Boolean)]
        }

        fn relations() -> Vec<Relation> {
            vec![Relation::has_many::<Comment>("comments", "post_id")]
        }

        fn global_scopes() -> Vec<GlobalScope> {
            vec![GlobalScope::new(
                "published",
                QueryFilter::eq("published", Value::Bool(true)),
            )]
        }

        fn soft_delete() -> Option<SoftDelete> {
            Some(SoftDelete::DeletedAt("deleted_at".to_string()))
        }
    }

    struct Comment;

    impl Model for Comment {
        fn table_name() -> &'static str {
            "comments"
        }

        fn relations() -> Vec<Relation> {
            vec![Relation::belongs_to::<Post>("post", "post_id")]
        }
    }

    #[test]
    fn test_schema_from_model() {
        let schema = ModelSchema::of::<Post>();
        assert_eq!(schema.table_name(), "posts");
        assert_eq!(schema.primary_key(), "id");
        assert!(schema.relation("comments").is_some());
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_resolve_relation_path() {
        let schema = ModelSchema::of::<Post>();
        let chain = schema.resolve_relation_path("comments.post").unwrap();
        let tables: Vec<&str> = chain.iter().map(|(_, s)| s.table_name()).collect();
        assert_eq!(tables, vec!["comments", "posts"]);

        let err = schema.resolve_relation_path("comments.author").unwrap_err();
        assert!(matches!(
            err,
            QueryError::UnknownRelation { ref relation, .. } if relation == "author"
        ));
    }

    #[test]
    fn test_default_constraints() {
        let schema = ModelSchema::of::<Post>();

        let all = schema.default_constraints(TrashedMode::WithoutTrashed, &GlobalScopeMode::All);
        assert_eq!(
            all,
            vec![
                QueryFilter::eq("posts.published", Value::Bool(true)).typed(&schema),
                QueryFilter::is_null("posts.deleted_at"),
            ]
        );

        let bare = schema.default_constraints(TrashedMode::WithTrashed, &GlobalScopeMode::Disabled);
        assert!(bare.is_empty());

        let trashed = schema.default_constraints(
            TrashedMode::OnlyTrashed,
            &GlobalScopeMode::Except(vec!["published".to_string()]),
        );
        assert_eq!(trashed, vec![QueryFilter::is_not_null("posts.deleted_at")]);
    }

    #[test]
    fn test_declared_column_types() {
        let schema = ModelSchema::of::<Post>().with_column("title", ColumnType::Text);
        assert_eq!(schema.column_type("id"), Some(ColumnType::Integer));
        assert_eq!(schema.column_type("posts.id"), Some(ColumnType::Integer));
        assert_eq!(schema.column_type("title"), Some(ColumnType::Text));
        assert_eq!(schema.column_type("comments.id"), None);
        assert_eq!(schema.column_type("body"), None);

        let constraints =
            schema.default_constraints(TrashedMode::WithoutTrashed, &GlobalScopeMode::All);
        assert!(matches!(
            &constraints[0],
            QueryFilter::Condition(condition) if condition.cast == Some(ColumnType::Boolean)
        ));
    }

    #[test]
    fn test_invalid_table_fails_validation() {
        let schema = ModelSchema::new("posts; DROP TABLE posts");
        assert!(schema.validate().is_err());
    }
}
