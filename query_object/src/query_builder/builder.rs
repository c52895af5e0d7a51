use super::eager::EagerLoad;
use super::filter::{QueryFilter, QueryOperator};
use super::join::JoinClause;
use super::ordering::SortOrder;
use super::pagination::Pagination;
use super::select::SelectField;
use super::sql_generation::SqlGenerator;
use super::subquery::RelationSubquery;
use crate::column::ColumnType;
use crate::contract::{EagerConstraint, QueryContract};
use crate::errors::QueryError;
use crate::model::{Model, ModelSchema};
use crate::relation::RelationKind;
use serde_json::Value;
use std::sync::Arc;

/// Soft-delete visibility of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrashedMode {
    #[default]
    WithoutTrashed,
    WithTrashed,
    OnlyTrashed,
}

/// Which global scopes of the model stay active
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GlobalScopeMode {
    #[default]
    All,
    Disabled,
    Except(Vec<String>),
}

impl GlobalScopeMode {
    pub fn applies(&self, name: &str) -> bool {
        match self {
            GlobalScopeMode::All => true,
            GlobalScopeMode::Disabled => false,
            GlobalScopeMode::Except(names) => !names.iter().any(|n| n == name),
        }
    }
}

/// A SELECT over one model's table.
///
/// Every part is owned, so `clone()` yields a fully independent query.
#[derive(Debug, Clone)]
pub struct Query {
    schema: Arc<ModelSchema>,
    columns: Vec<SelectField>,
    extra_columns: Vec<SelectField>,
    joins: Vec<JoinClause>,
    conditions: Vec<QueryFilter>,
    order_by: Vec<(String, SortOrder)>,
    pagination: Pagination,
    eager_loads: Vec<EagerLoad>,
    trashed: TrashedMode,
    global_scopes: GlobalScopeMode,
    nest_pivot: bool,
}

impl Query {
    pub fn new(schema: ModelSchema) -> Self {
        Self {
            schema: Arc::new(schema),
            columns: Vec::new(),
            extra_columns: Vec::new(),
            joins: Vec::new(),
            conditions: Vec::new(),
            order_by: Vec::new(),
            pagination: Pagination::default(),
            eager_loads: Vec::new(),
            trashed: TrashedMode::default(),
            global_scopes: GlobalScopeMode::default(),
            nest_pivot: false,
        }
    }

    pub fn for_model<M: Model>() -> Self {
        Self::new(ModelSchema::of::<M>())
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    pub fn columns(&self) -> &[SelectField] {
        &self.columns
    }

    pub fn extra_columns(&self) -> &[SelectField] {
        &self.extra_columns
    }

    pub fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    pub fn conditions(&self) -> &[QueryFilter] {
        &self.conditions
    }

    pub fn orders(&self) -> &[(String, SortOrder)] {
        &self.order_by
    }

    pub fn eager_loads(&self) -> &[EagerLoad] {
        &self.eager_loads
    }

    pub fn trashed_mode(&self) -> TrashedMode {
        self.trashed
    }

    pub fn global_scope_mode(&self) -> &GlobalScopeMode {
        &self.global_scopes
    }

    /// Whether `pivot_*` columns are folded into a nested `pivot` object
    pub fn nests_pivot(&self) -> bool {
        self.nest_pivot
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.pagination = self.pagination.with_limit(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.pagination = self.pagination.with_offset(offset);
        self
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    /// Select `pivot.column AS pivot_column` for each column
    pub fn select_pivot(mut self, pivot_table: &str, columns: &[String]) -> Self {
        for column in columns {
            let field = SelectField::aliased(
                format!("{}.{}", pivot_table, column),
                format!("pivot_{}", column),
            );
            if !self.extra_columns.contains(&field) {
                self.extra_columns.push(field);
            }
        }
        self.nest_pivot = true;
        self
    }

    pub(crate) fn push_eager_loads(mut self, loads: Vec<EagerLoad>) -> Self {
        self.eager_loads.extend(loads);
        self
    }

    /// Make sure `column` is part of a restricted column list
    pub fn ensure_selected(mut self, column: &str) -> Self {
        if self.columns.is_empty() {
            return self;
        }

        let qualified = self.schema.qualify(column);
        let present = self.columns.iter().any(|field| match field {
            SelectField::Column(name) => *name == qualified,
            other => other.output_name() == column,
        });
        if !present {
            self.columns.push(SelectField::Column(qualified));
        }
        self
    }

    fn effective_conditions(&self) -> Vec<QueryFilter> {
        let mut conditions = self.conditions.clone();
        conditions.extend(
            self.schema
                .default_constraints(self.trashed, &self.global_scopes),
        );
        conditions
    }

    fn from_and_where(&self, generator: &mut SqlGenerator) -> String {
        let mut sql = format!("FROM {}", self.schema.table_name());

        if !self.joins.is_empty() {
            sql.push(' ');
            sql.push_str(&SqlGenerator::build_join_clause(&self.joins));
        }

        let where_clause = generator.build_where_clause(&self.effective_conditions());
        if !where_clause.is_empty() {
            sql.push(' ');
            sql.push_str(&where_clause);
        }

        sql
    }

    /// `SELECT COUNT(*)` over the same rows, ignoring ordering and pagination
    pub fn build_count(&self) -> (String, Vec<Value>) {
        let mut generator = SqlGenerator::new();
        let body = self.from_and_where(&mut generator);
        (
            format!("SELECT COUNT(*) AS aggregate {}", body),
            generator.into_values(),
        )
    }

    fn relation_exists(
        &self,
        path: &str,
        constraint: Option<QueryFilter>,
    ) -> Result<RelationSubquery, QueryError> {
        let chain = self.schema.resolve_relation_path(path)?;

        let mut subqueries = Vec::with_capacity(chain.len());
        let mut parent: &ModelSchema = &self.schema;
        for (relation, related) in &chain {
            subqueries.push(relation.subquery(parent, related));
            parent = related;
        }

        // Fold innermost-out: the constraint binds to the deepest table
        let mut constraint = match chain.last() {
            Some((_, deepest)) => constraint
                .map(|filter| filter.qualified(deepest.table_name()).typed(deepest)),
            None => constraint,
        };
        let mut current: Option<RelationSubquery> = None;
        for mut subquery in subqueries.into_iter().rev() {
            if let Some(inner) = current.take() {
                subquery = subquery.filter(QueryFilter::exists(inner));
            } else if let Some(filter) = constraint.take() {
                subquery = subquery.filter(filter);
            }
            current = Some(subquery);
        }

        current.ok_or_else(|| QueryError::unknown_relation(self.schema.table_name(), path))
    }

    fn direct_subquery(&self, relation: &str) -> Result<RelationSubquery, QueryError> {
        let relation_def = self
            .schema
            .relation(relation)
            .ok_or_else(|| QueryError::unknown_relation(self.schema.table_name(), relation))?;
        let related = relation_def.related();
        related.validate()?;
        Ok(relation_def.subquery(&self.schema, &related))
    }

    fn push_extra(&mut self, field: SelectField) {
        match self
            .extra_columns
            .iter()
            .position(|existing| existing.output_name() == field.output_name())
        {
            Some(index) => self.extra_columns[index] = field,
            None => self.extra_columns.push(field),
        }
    }
}

impl QueryContract for Query {
    fn table_name(&self) -> &str {
        self.schema.table_name()
    }

    fn has_relation(&self, path: &str) -> bool {
        self.schema.resolve_relation_path(path).is_ok()
    }

    fn column_type(&self, column: &str) -> Option<ColumnType> {
        if let Some((path, name)) = column.rsplit_once('.') {
            if path != self.schema.table_name() {
                let chain = self.schema.resolve_relation_path(path).ok()?;
                let (_, related) = chain.last()?;
                return related.column_type(name);
            }
        }
        self.schema.column_type(column)
    }

    fn where_op(mut self, field: &str, operator: QueryOperator, value: Value) -> Self {
        let field = self.qualify_column(field);
        let filter = QueryFilter::condition(&field, operator, Some(value)).typed(&self.schema);
        self.conditions.push(filter);
        self
    }

    fn where_in(mut self, field: &str, values: Vec<Value>) -> Self {
        let field = self.qualify_column(field);
        let filter = QueryFilter::in_values(&field, values).typed(&self.schema);
        self.conditions.push(filter);
        self
    }

    fn where_null(mut self, field: &str) -> Self {
        let field = self.qualify_column(field);
        self.conditions.push(QueryFilter::is_null(&field));
        self
    }

    fn where_not_null(mut self, field: &str) -> Self {
        let field = self.qualify_column(field);
        self.conditions.push(QueryFilter::is_not_null(&field));
        self
    }

    fn where_filter(mut self, filter: QueryFilter) -> Self {
        let filter = filter.qualified(self.schema.table_name()).typed(&self.schema);
        self.conditions.push(filter);
        self
    }

    fn where_has(
        mut self,
        path: &str,
        constraint: Option<QueryFilter>,
    ) -> Result<Self, QueryError> {
        let subquery = self.relation_exists(path, constraint)?;
        self.conditions.push(QueryFilter::exists(subquery));
        Ok(self)
    }

    fn where_doesnt_have(
        mut self,
        path: &str,
        constraint: Option<QueryFilter>,
    ) -> Result<Self, QueryError> {
        let subquery = self.relation_exists(path, constraint)?;
        self.conditions.push(QueryFilter::not_exists(subquery));
        Ok(self)
    }

    fn where_belongs_to(self, relation: &str, keys: Vec<Value>) -> Result<Self, QueryError> {
        let relation_def = self
            .schema
            .relation(relation)
            .ok_or_else(|| QueryError::unknown_relation(self.schema.table_name(), relation))?;

        let foreign_key = match &relation_def.kind {
            RelationKind::BelongsTo { foreign_key, .. } => foreign_key.clone(),
            _ => {
                return Err(QueryError::RelationMismatch {
                    table: self.schema.table_name().to_string(),
                    relation: relation.to_string(),
                    expected: "belongs-to",
                })
            }
        };

        Ok(self.where_in(&foreign_key, keys))
    }

    fn order_by(mut self, field: &str, order: SortOrder) -> Self {
        let field = self.qualify_column(field);
        self.order_by.push((field, order));
        self
    }

    fn join_if_absent(mut self, join: JoinClause) -> Self {
        if !self.joins.iter().any(|existing| existing.table == join.table) {
            self.joins.push(join);
        }
        self
    }

    fn call_scope(self, name: &str, args: &[Value]) -> Result<Self, QueryError> {
        let scope = self
            .schema
            .scope(name)
            .cloned()
            .ok_or_else(|| QueryError::unknown_scope(self.schema.table_name(), name))?;
        scope.apply(self, args)
    }

    fn with(
        mut self,
        path: &str,
        constraint: Option<EagerConstraint<Self>>,
    ) -> Result<Self, QueryError> {
        self.schema.resolve_relation_path(path)?;
        let segments: Vec<&str> = path.split('.').collect();
        EagerLoad::insert(&mut self.eager_loads, &segments, constraint);
        Ok(self)
    }

    fn with_count(mut self, relation: &str, alias: &str) -> Result<Self, QueryError> {
        let subquery = self.direct_subquery(relation)?;
        self.push_extra(SelectField::RelationCount {
            subquery,
            alias: alias.to_string(),
        });
        Ok(self)
    }

    fn with_exists(mut self, relation: &str, alias: &str) -> Result<Self, QueryError> {
        let subquery = self.direct_subquery(relation)?;
        self.push_extra(SelectField::RelationExists {
            subquery,
            alias: alias.to_string(),
        });
        Ok(self)
    }

    fn select(mut self, columns: Vec<String>) -> Self {
        let mut fields: Vec<SelectField> = Vec::with_capacity(columns.len());
        for column in columns {
            let field = SelectField::Column(self.qualify_column(&column));
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        self.columns = fields;
        self
    }

    fn with_trashed(mut self) -> Self {
        self.trashed = TrashedMode::WithTrashed;
        self
    }

    fn only_trashed(mut self) -> Self {
        self.trashed = TrashedMode::OnlyTrashed;
        self
    }

    fn without_trashed(mut self) -> Self {
        self.trashed = TrashedMode::WithoutTrashed;
        self
    }

    fn without_global_scopes(mut self) -> Self {
        self.global_scopes = GlobalScopeMode::Disabled;
        self
    }

    fn without_global_scope(mut self, name: &str) -> Self {
        self.global_scopes = match self.global_scopes {
            GlobalScopeMode::All => GlobalScopeMode::Except(vec![name.to_string()]),
            GlobalScopeMode::Disabled => GlobalScopeMode::Disabled,
            GlobalScopeMode::Except(mut names) => {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
                GlobalScopeMode::Except(names)
            }
        };
        self
    }

    fn build(&self) -> (String, Vec<Value>) {
        let mut generator = SqlGenerator::new();

        let select = generator.build_select_clause(
            self.schema.table_name(),
            &self.columns,
            &self.extra_columns,
        );
        let mut sql = format!("SELECT {} {}", select, self.from_and_where(&mut generator));

        let order_clause = SqlGenerator::build_order_clause(&self.order_by);
        if !order_clause.is_empty() {
            sql.push(' ');
            sql.push_str(&order_clause);
        }

        if !self.pagination.is_unbounded() {
            sql.push(' ');
            sql.push_str(&self.pagination.to_string());
        }

        (sql, generator.into_values())
    }
}
