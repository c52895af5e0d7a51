//! Query builder sessions
//!
//! A [`QueryBuilder`] binds one subject query to one request. The server
//! author declares what is allowed, then calls a terminal; the request is
//! parsed once and the resolution is cached until setup changes.

use crate::allowed::{
    AllowedAppend, AllowedField, AllowedFilter, AllowedInclude, AllowedSort, DefaultSort,
};
use crate::errors::QueryBuilderError;
use crate::request::{ParsedRequest, QueryRequest};
use crate::resolver::{self, AllowLists, AppliedDirective, Resolution};
use crate::subject::Subject;
use config::{QueryConfig, StrictMode};
use query_object::{Query, QueryContract, QueryError, QueryExecutor, QueryOperator, Row};
use serde_json::Value;
use std::sync::{Arc, OnceLock};

#[derive(Debug, Clone)]
pub struct QueryBuilder<Q: QueryContract = Query> {
    subject: Q,
    request: QueryRequest,
    config: Arc<QueryConfig>,
    allowed: Arc<AllowLists<Q>>,
    /// Includes as declared; the registry holds their expansion
    declared_includes: Vec<AllowedInclude<Q>>,
    default_sorts: Vec<DefaultSort>,
    parsed: OnceLock<ParsedRequest>,
    resolved: OnceLock<Resolution<Q>>,
}

impl QueryBuilder<Query> {
    /// Start a session on a query, model, relation or named model
    pub fn for_subject(
        subject: impl Into<Subject>,
        request: impl Into<QueryRequest>,
    ) -> Result<Self, QueryBuilderError> {
        let query = subject.into().into_query()?;
        Ok(Self::for_query(query, request))
    }

    pub fn limit(self, limit: i64) -> Self {
        self.tap(|query| query.limit(limit))
    }

    pub fn offset(self, offset: i64) -> Self {
        self.tap(|query| query.offset(offset))
    }

    /// Fetch the resolved rows, with eager loads and requested appends
    pub async fn get<E>(&self, executor: &E) -> Result<Vec<Row>, QueryBuilderError>
    where
        E: QueryExecutor + ?Sized,
    {
        let resolution = self.resolve()?;
        let mut rows = resolution.query.get(executor).await?;
        for row in rows.iter_mut() {
            apply_appends(row, &resolution.appends);
        }
        Ok(rows)
    }

    pub async fn first<E>(&self, executor: &E) -> Result<Option<Row>, QueryBuilderError>
    where
        E: QueryExecutor + ?Sized,
    {
        let resolution = self.resolve()?;
        let mut row = resolution.query.first(executor).await?;
        if let Some(row) = row.as_mut() {
            apply_appends(row, &resolution.appends);
        }
        Ok(row)
    }

    /// Number of rows the resolved filters match
    pub async fn count<E>(&self, executor: &E) -> Result<i64, QueryBuilderError>
    where
        E: QueryExecutor + ?Sized,
    {
        let resolution = self.resolve()?;
        Ok(resolution.query.count(executor).await?)
    }
}

impl<Q: QueryContract> QueryBuilder<Q> {
    /// Start a session on any query implementing the contract
    pub fn for_query(query: Q, request: impl Into<QueryRequest>) -> Self {
        Self {
            subject: query,
            request: request.into(),
            config: Arc::new(QueryConfig::default()),
            allowed: Arc::new(AllowLists::default()),
            declared_includes: Vec::new(),
            default_sorts: Vec::new(),
            parsed: OnceLock::new(),
            resolved: OnceLock::new(),
        }
    }

    pub fn with_config(mut self, config: impl Into<Arc<QueryConfig>>) -> Self {
        self.config = config.into();
        self.parsed = OnceLock::new();
        self.rebuild_includes();
        self.changed()
    }

    /// Strict or lenient handling of unknown names, for every kind at once
    pub fn strict(mut self, strict: bool) -> Self {
        Arc::make_mut(&mut self.config).strict = StrictMode::all(strict);
        self.changed()
    }

    pub fn strict_mode(mut self, strict: StrictMode) -> Self {
        Arc::make_mut(&mut self.config).strict = strict;
        self.changed()
    }

    pub fn allowed_filters<I>(mut self, filters: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<AllowedFilter<Q>>,
    {
        let allowed = Arc::make_mut(&mut self.allowed);
        for filter in filters {
            allowed.filters.register(filter.into());
        }
        self.changed()
    }

    pub fn allowed_sorts<I>(mut self, sorts: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<AllowedSort<Q>>,
    {
        let allowed = Arc::make_mut(&mut self.allowed);
        for sort in sorts {
            allowed.sorts.register(sort.into());
        }
        self.changed()
    }

    pub fn allowed_includes<I>(mut self, includes: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<AllowedInclude<Q>>,
    {
        self.declared_includes
            .extend(includes.into_iter().map(Into::into));
        self.rebuild_includes();
        self.changed()
    }

    pub fn allowed_fields<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<AllowedField>,
    {
        let allowed = Arc::make_mut(&mut self.allowed);
        for field in fields {
            allowed.fields.register(field.into());
        }
        self.changed()
    }

    pub fn allowed_appends<I>(mut self, appends: I) -> Self
    where
        I: IntoIterator<Item = AllowedAppend>,
    {
        let allowed = Arc::make_mut(&mut self.allowed);
        for append in appends {
            allowed.appends.register(append);
        }
        self.changed()
    }

    /// Sort used when the client requests no valid sort; `-name` is descending
    pub fn default_sort(mut self, sort: impl Into<DefaultSort>) -> Self {
        self.default_sorts.push(sort.into());
        self.changed()
    }

    pub fn default_sorts<I>(mut self, sorts: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<DefaultSort>,
    {
        self.default_sorts.extend(sorts.into_iter().map(Into::into));
        self.changed()
    }

    /// Change the subject query directly
    pub fn tap(mut self, f: impl FnOnce(Q) -> Q) -> Self {
        self.subject = f(self.subject);
        self.changed()
    }

    pub fn try_tap(
        mut self,
        f: impl FnOnce(Q) -> Result<Q, QueryError>,
    ) -> Result<Self, QueryBuilderError> {
        self.subject = f(self.subject)?;
        Ok(self.changed())
    }

    pub fn where_op(self, field: &str, operator: QueryOperator, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.tap(|query| query.where_op(field, operator, value))
    }

    pub fn scope(self, name: &str, args: &[Value]) -> Result<Self, QueryBuilderError> {
        self.try_tap(|query| query.call_scope(name, args))
    }

    pub fn with_trashed(self) -> Self {
        self.tap(QueryContract::with_trashed)
    }

    pub fn only_trashed(self) -> Self {
        self.tap(QueryContract::only_trashed)
    }

    pub fn without_global_scopes(self) -> Self {
        self.tap(QueryContract::without_global_scopes)
    }

    pub fn without_global_scope(self, name: &str) -> Self {
        self.tap(|query| query.without_global_scope(name))
    }

    /// The subject before any directive is applied
    pub fn subject(&self) -> &Q {
        &self.subject
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn allow_lists(&self) -> &AllowLists<Q> {
        &self.allowed
    }

    /// Directives of the request, parsed on first use
    pub fn parsed(&self) -> &ParsedRequest {
        self.parsed.get_or_init(|| {
            ParsedRequest::parse(&self.request, &self.config, self.subject.table_name())
        })
    }

    /// Validate and apply the request; cached until setup changes
    pub fn resolve(&self) -> Result<&Resolution<Q>, QueryBuilderError> {
        if let Some(resolution) = self.resolved.get() {
            return Ok(resolution);
        }

        let resolution = self.compute()?;
        Ok(self.resolved.get_or_init(|| resolution))
    }

    pub fn into_resolution(mut self) -> Result<Resolution<Q>, QueryBuilderError> {
        match self.resolved.take() {
            Some(resolution) => Ok(resolution),
            None => self.compute(),
        }
    }

    /// The resolved query
    pub fn build(self) -> Result<Q, QueryBuilderError> {
        Ok(self.into_resolution()?.query)
    }

    pub fn to_sql(&self) -> Result<String, QueryBuilderError> {
        Ok(self.resolve()?.query.to_sql())
    }

    /// Allow-list entries the request triggered
    pub fn applied(&self) -> Result<&[AppliedDirective], QueryBuilderError> {
        Ok(&self.resolve()?.applied)
    }

    fn compute(&self) -> Result<Resolution<Q>, QueryBuilderError> {
        debug_log!(
            "[BUILD] Resolving request against {}",
            self.subject.table_name()
        );
        resolver::resolve(
            self.subject.clone(),
            self.parsed(),
            &self.allowed,
            &self.default_sorts,
            &self.config.strict,
        )
    }

    fn rebuild_includes(&mut self) {
        let suffixes = self.config.suffixes.clone();
        let allowed = Arc::make_mut(&mut self.allowed);
        allowed.includes = self
            .declared_includes
            .iter()
            .cloned()
            .flat_map(|include| include.expand(&suffixes))
            .collect();
    }

    fn changed(mut self) -> Self {
        self.resolved = OnceLock::new();
        self
    }
}

fn apply_appends(row: &mut Row, appends: &[AllowedAppend]) {
    for append in appends {
        append.apply(row);
    }
}
