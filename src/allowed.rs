//! Allow-lists
//!
//! The server author declares every public name a client may use, what it
//! maps to internally and how it is applied. [`Registry::resolve`] is the
//! only way a directive name turns into something executable.

use crate::errors::QueryBuilderError;
use crate::filters::{Filter, FilterCallback, FilterOperator, FilterStrategy};
use crate::includes::{Include, IncludeStrategy};
use crate::sorts::{Sort, SortCallback, SortStrategy};
use config::IncludeSuffixes;
use query_object::{Query, QueryContract, QueryOperator, Row};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Anything registered under a public name
pub trait AllowedName {
    fn public_name(&self) -> &str;
}

/// Public name to entry, in declaration order
#[derive(Debug, Clone)]
pub struct Registry<T> {
    entries: Vec<T>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T: AllowedName> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-registering a name replaces the earlier entry in its original slot
    pub fn register(&mut self, entry: T) {
        match self
            .entries
            .iter()
            .position(|existing| existing.public_name() == entry.public_name())
        {
            Some(index) => self.entries[index] = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn resolve(&self, name: &str) -> Option<&T> {
        self.entries.iter().find(|entry| entry.public_name() == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.public_name().to_string())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: AllowedName> FromIterator<T> for Registry<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut registry = Self::new();
        for entry in iter {
            registry.register(entry);
        }
        registry
    }
}

/// A permitted filter
#[derive(Debug, Clone)]
pub struct AllowedFilter<Q: QueryContract = Query> {
    pub name: String,
    pub internal_name: String,
    pub strategy: FilterStrategy<Q>,
    pub default: Option<Value>,
    pub nullable: bool,
    pub ignored: Vec<Value>,
}

impl<Q: QueryContract> AllowedFilter<Q> {
    fn with_strategy(name: impl Into<String>, strategy: FilterStrategy<Q>) -> Self {
        let name = name.into();
        Self {
            internal_name: name.clone(),
            name,
            strategy,
            default: None,
            nullable: false,
            ignored: Vec::new(),
        }
    }

    pub fn exact(name: impl Into<String>) -> Self {
        Self::with_strategy(
            name,
            FilterStrategy::Exact {
                relation_constraint: true,
            },
        )
    }

    pub fn partial(name: impl Into<String>) -> Self {
        Self::with_strategy(
            name,
            FilterStrategy::Partial {
                relation_constraint: true,
            },
        )
    }

    pub fn begins_with_strict(name: impl Into<String>) -> Self {
        Self::with_strategy(name, FilterStrategy::BeginsWithStrict)
    }

    pub fn ends_with_strict(name: impl Into<String>) -> Self {
        Self::with_strategy(name, FilterStrategy::EndsWithStrict)
    }

    /// Compare with a fixed operator
    pub fn operator(name: impl Into<String>, operator: QueryOperator) -> Self {
        Self::with_strategy(name, FilterStrategy::Operator(FilterOperator::Fixed(operator)))
    }

    /// Read the operator from the value: `filter[age]=>=18`
    pub fn dynamic_operator(name: impl Into<String>) -> Self {
        Self::with_strategy(name, FilterStrategy::Operator(FilterOperator::Dynamic))
    }

    pub fn scope(name: impl Into<String>) -> Self {
        Self::with_strategy(name, FilterStrategy::Scope)
    }

    pub fn callback<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(Q, &Value, &str) -> Result<Q, QueryBuilderError> + Send + Sync + 'static,
    {
        let callback: FilterCallback<Q> = Arc::new(callback);
        Self::with_strategy(name, FilterStrategy::Callback(callback))
    }

    pub fn custom(name: impl Into<String>, filter: impl Filter<Q> + 'static) -> Self {
        Self::with_strategy(name, FilterStrategy::Custom(Arc::new(filter)))
    }

    pub fn belongs_to(name: impl Into<String>) -> Self {
        Self::with_strategy(name, FilterStrategy::BelongsTo)
    }

    pub fn has(name: impl Into<String>) -> Self {
        Self::with_strategy(name, FilterStrategy::Has)
    }

    /// `filter[trashed]=with|only`
    pub fn trashed() -> Self {
        Self::with_strategy("trashed", FilterStrategy::Trashed)
    }

    pub fn internal_name(mut self, internal_name: impl Into<String>) -> Self {
        self.internal_name = internal_name.into();
        self
    }

    /// Value used when the client sends no value for this filter
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Blank values filter on `IS NULL` instead of being skipped
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Values the filter treats as absent
    pub fn ignore<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.ignored.extend(values.into_iter().map(Into::into));
        self
    }

    /// Treat `relation.column` as a plain column reference
    pub fn without_relation_constraint(mut self) -> Self {
        match &mut self.strategy {
            FilterStrategy::Exact { relation_constraint }
            | FilterStrategy::Partial { relation_constraint } => *relation_constraint = false,
            _ => {}
        }
        self
    }

    /// The value to apply for a requested (or absent) filter; `None` skips it
    pub fn effective_value(&self, requested: Option<&Value>) -> Option<Value> {
        let value = match requested {
            Some(value) => self.strip_ignored(value)?,
            None => return self.default.clone(),
        };

        if is_blank(&value) {
            return self.nullable.then_some(Value::Null);
        }
        Some(value)
    }

    fn strip_ignored(&self, value: &Value) -> Option<Value> {
        if self.ignored.is_empty() {
            return Some(value.clone());
        }

        match value {
            Value::Array(values) => {
                let kept: Vec<Value> = values
                    .iter()
                    .filter(|value| !self.is_ignored(value))
                    .cloned()
                    .collect();
                match kept.len() {
                    0 => None,
                    _ => Some(Value::Array(kept)),
                }
            }
            value if self.is_ignored(value) => None,
            value => Some(value.clone()),
        }
    }

    fn is_ignored(&self, value: &Value) -> bool {
        self.ignored
            .iter()
            .any(|ignored| ignored == value || scalar_text(ignored) == scalar_text(value))
    }
}

impl<Q: QueryContract> AllowedName for AllowedFilter<Q> {
    fn public_name(&self) -> &str {
        &self.name
    }
}

impl<Q: QueryContract> From<&str> for AllowedFilter<Q> {
    fn from(name: &str) -> Self {
        Self::exact(name)
    }
}

impl<Q: QueryContract> From<String> for AllowedFilter<Q> {
    fn from(name: String) -> Self {
        Self::exact(name)
    }
}

/// A permitted sort
#[derive(Debug, Clone)]
pub struct AllowedSort<Q: QueryContract = Query> {
    pub name: String,
    pub internal_name: String,
    pub strategy: SortStrategy<Q>,
}

impl<Q: QueryContract> AllowedSort<Q> {
    fn with_strategy(name: impl Into<String>, strategy: SortStrategy<Q>) -> Self {
        let name = name.into();
        Self {
            internal_name: name.clone(),
            name,
            strategy,
        }
    }

    pub fn field(name: impl Into<String>) -> Self {
        Self::with_strategy(name, SortStrategy::Field)
    }

    pub fn scope(name: impl Into<String>) -> Self {
        Self::with_strategy(name, SortStrategy::Scope)
    }

    pub fn callback<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(Q, bool, &str) -> Result<Q, QueryBuilderError> + Send + Sync + 'static,
    {
        let callback: SortCallback<Q> = Arc::new(callback);
        Self::with_strategy(name, SortStrategy::Callback(callback))
    }

    pub fn custom(name: impl Into<String>, sort: impl Sort<Q> + 'static) -> Self {
        Self::with_strategy(name, SortStrategy::Custom(Arc::new(sort)))
    }

    pub fn internal_name(mut self, internal_name: impl Into<String>) -> Self {
        self.internal_name = internal_name.into();
        self
    }
}

impl<Q: QueryContract> AllowedName for AllowedSort<Q> {
    fn public_name(&self) -> &str {
        &self.name
    }
}

impl<Q: QueryContract> From<&str> for AllowedSort<Q> {
    fn from(name: &str) -> Self {
        Self::field(name)
    }
}

impl<Q: QueryContract> From<String> for AllowedSort<Q> {
    fn from(name: String) -> Self {
        Self::field(name)
    }
}

/// Sort applied when the client requests none; `-name` is descending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultSort {
    pub name: String,
    pub descending: bool,
}

impl DefaultSort {
    pub fn new(name: impl Into<String>, descending: bool) -> Self {
        Self {
            name: name.into(),
            descending,
        }
    }

    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.strip_prefix('-') {
            Some(name) => Self::new(name, true),
            None => Self::new(raw, false),
        }
    }
}

impl From<&str> for DefaultSort {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

/// A permitted include
#[derive(Debug, Clone)]
pub struct AllowedInclude<Q: QueryContract = Query> {
    pub name: String,
    pub internal_name: String,
    pub strategy: IncludeStrategy<Q>,
    expand: bool,
}

impl<Q: QueryContract> AllowedInclude<Q> {
    fn with_strategy(name: impl Into<String>, strategy: IncludeStrategy<Q>) -> Self {
        let name = name.into();
        Self {
            internal_name: name.clone(),
            name,
            strategy,
            expand: false,
        }
    }

    /// Eager load a relation path. On registration the path also allows each
    /// of its parent paths, and a top-level relation its count and exists
    /// includes.
    pub fn relationship(name: impl Into<String>) -> Self {
        Self {
            expand: true,
            ..Self::with_strategy(name, IncludeStrategy::Relationship)
        }
    }

    pub fn count(name: impl Into<String>) -> Self {
        Self::with_strategy(name, IncludeStrategy::Count)
    }

    pub fn exists(name: impl Into<String>) -> Self {
        Self::with_strategy(name, IncludeStrategy::Exists)
    }

    pub fn custom(name: impl Into<String>, include: impl Include<Q> + 'static) -> Self {
        Self::with_strategy(name, IncludeStrategy::Custom(Arc::new(include)))
    }

    pub fn internal_name(mut self, internal_name: impl Into<String>) -> Self {
        self.internal_name = internal_name.into();
        self
    }

    /// The entries this include registers as
    pub fn expand(self, suffixes: &IncludeSuffixes) -> Vec<Self> {
        if !self.expand {
            return vec![self];
        }

        let public = path_prefixes(&self.name);
        let internal = path_prefixes(&self.internal_name);
        let aligned = public.len() == internal.len();

        let mut entries = Vec::with_capacity(public.len() + 2);
        for (index, name) in public.iter().enumerate() {
            let internal_name = if aligned {
                internal[index].clone()
            } else if index + 1 == public.len() {
                self.internal_name.clone()
            } else {
                name.clone()
            };

            if !name.contains('.') {
                entries.push(
                    Self::count(format!("{}{}", name, suffixes.count))
                        .internal_name(internal_name.clone()),
                );
                entries.push(
                    Self::exists(format!("{}{}", name, suffixes.exists))
                        .internal_name(internal_name.clone()),
                );
            }
            entries.push(
                Self::with_strategy(name.clone(), IncludeStrategy::Relationship)
                    .internal_name(internal_name),
            );
        }
        entries
    }
}

impl<Q: QueryContract> AllowedName for AllowedInclude<Q> {
    fn public_name(&self) -> &str {
        &self.name
    }
}

impl<Q: QueryContract> From<&str> for AllowedInclude<Q> {
    fn from(name: &str) -> Self {
        Self::relationship(name)
    }
}

impl<Q: QueryContract> From<String> for AllowedInclude<Q> {
    fn from(name: String) -> Self {
        Self::relationship(name)
    }
}

/// A permitted field; `relation.column` names a column of an included relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedField {
    pub name: String,
    pub internal_name: String,
}

impl AllowedField {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            internal_name: name.clone(),
            name,
        }
    }

    pub fn aliased(name: impl Into<String>, internal_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            internal_name: internal_name.into(),
        }
    }

    /// Owning relation path in public terms, `None` for subject columns
    pub fn owner(&self) -> Option<&str> {
        self.name.rsplit_once('.').map(|(owner, _)| owner)
    }

    /// Column to select
    pub fn column(&self) -> &str {
        self.internal_name
            .rsplit_once('.')
            .map_or(self.internal_name.as_str(), |(_, column)| column)
    }
}

impl AllowedName for AllowedField {
    fn public_name(&self) -> &str {
        &self.name
    }
}

impl From<&str> for AllowedField {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for AllowedField {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

pub type AppendFn = Arc<dyn Fn(&Row) -> Value + Send + Sync>;

/// A permitted computed attribute, evaluated on every fetched subject row
#[derive(Clone)]
pub struct AllowedAppend {
    pub name: String,
    compute: AppendFn,
}

impl AllowedAppend {
    pub fn new<F>(name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&Row) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            compute: Arc::new(compute),
        }
    }

    pub fn compute(&self, row: &Row) -> Value {
        (self.compute)(row)
    }

    /// Add the attribute to `row`
    pub fn apply(&self, row: &mut Row) {
        let value = self.compute(row);
        row.insert(self.name.clone(), value);
    }
}

impl fmt::Debug for AllowedAppend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllowedAppend").field("name", &self.name).finish()
    }
}

impl AllowedName for AllowedAppend {
    fn public_name(&self) -> &str {
        &self.name
    }
}

/// `a.b.c` gives `a`, `a.b`, `a.b.c`
fn path_prefixes(path: &str) -> Vec<String> {
    let mut prefixes: Vec<String> = Vec::new();
    for segment in path.split('.') {
        let prefix = match prefixes.last() {
            Some(parent) => format!("{}.{}", parent, segment),
            None => segment.to_string(),
        };
        prefixes.push(prefix);
    }
    prefixes
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(raw) => raw.trim().is_empty(),
        Value::Array(values) => values.is_empty(),
        _ => false,
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}
