//! Relations between models
//!
//! A relation knows how to correlate a related table with its parent, both as
//! a correlated subquery (existence and count constraints) and as a batched
//! `IN` query (eager loading).

use crate::contract::QueryContract;
use crate::errors::QueryError;
use crate::executor::Row;
use crate::model::{Model, ModelSchema};
use crate::query_builder::{
    GlobalScopeMode, JoinClause, Query, QueryOperator, RelationSubquery, TrashedMode,
};
use crate::validation::{ValidatedFieldName, ValidatedTableName, ValidationError};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Relation shapes. Keys left as `None` default to the primary key of the
/// schema they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    HasMany {
        foreign_key: String,
        local_key: Option<String>,
    },
    HasOne {
        foreign_key: String,
        local_key: Option<String>,
    },
    BelongsTo {
        foreign_key: String,
        owner_key: Option<String>,
    },
    BelongsToMany {
        pivot_table: String,
        foreign_pivot_key: String,
        related_pivot_key: String,
        parent_key: Option<String>,
        related_key: Option<String>,
        pivot_columns: Vec<String>,
    },
}

impl RelationKind {
    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        match self {
            RelationKind::HasMany { foreign_key, local_key }
            | RelationKind::HasOne { foreign_key, local_key } => {
                ValidatedFieldName::new(foreign_key)?;
                if let Some(key) = local_key {
                    ValidatedFieldName::new(key)?;
                }
            }
            RelationKind::BelongsTo { foreign_key, owner_key } => {
                ValidatedFieldName::new(foreign_key)?;
                if let Some(key) = owner_key {
                    ValidatedFieldName::new(key)?;
                }
            }
            RelationKind::BelongsToMany {
                pivot_table,
                foreign_pivot_key,
                related_pivot_key,
                parent_key,
                related_key,
                pivot_columns,
            } => {
                ValidatedTableName::new(pivot_table)?;
                ValidatedFieldName::new(foreign_pivot_key)?;
                ValidatedFieldName::new(related_pivot_key)?;
                for key in parent_key.iter().chain(related_key.iter()).chain(pivot_columns.iter()) {
                    ValidatedFieldName::new(key)?;
                }
            }
        }
        Ok(())
    }

    pub fn label(&self) -> &'static str {
        match self {
            RelationKind::HasMany { .. } => "has-many",
            RelationKind::HasOne { .. } => "has-one",
            RelationKind::BelongsTo { .. } => "belongs-to",
            RelationKind::BelongsToMany { .. } => "belongs-to-many",
        }
    }
}

/// A named relation from one model to another
#[derive(Clone)]
pub struct Relation {
    pub name: String,
    pub kind: RelationKind,
    related: Arc<dyn Fn() -> ModelSchema + Send + Sync>,
}

impl Relation {
    /// Relation to a schema produced at runtime
    pub fn new<F>(name: impl Into<String>, kind: RelationKind, related: F) -> Self
    where
        F: Fn() -> ModelSchema + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind,
            related: Arc::new(related),
        }
    }

    pub fn has_many<R: Model>(name: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::new(
            name,
            RelationKind::HasMany {
                foreign_key: foreign_key.into(),
                local_key: None,
            },
            ModelSchema::of::<R>,
        )
    }

    pub fn has_one<R: Model>(name: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::new(
            name,
            RelationKind::HasOne {
                foreign_key: foreign_key.into(),
                local_key: None,
            },
            ModelSchema::of::<R>,
        )
    }

    pub fn belongs_to<R: Model>(name: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::new(
            name,
            RelationKind::BelongsTo {
                foreign_key: foreign_key.into(),
                owner_key: None,
            },
            ModelSchema::of::<R>,
        )
    }

    pub fn belongs_to_many<R: Model>(
        name: impl Into<String>,
        pivot_table: impl Into<String>,
        foreign_pivot_key: impl Into<String>,
        related_pivot_key: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            RelationKind::BelongsToMany {
                pivot_table: pivot_table.into(),
                foreign_pivot_key: foreign_pivot_key.into(),
                related_pivot_key: related_pivot_key.into(),
                parent_key: None,
                related_key: None,
                pivot_columns: Vec::new(),
            },
            ModelSchema::of::<R>,
        )
    }

    /// Parent-side key: `local_key` for has-one/has-many, `parent_key` for belongs-to-many
    pub fn with_local_key(mut self, key: impl Into<String>) -> Self {
        match &mut self.kind {
            RelationKind::HasMany { local_key, .. } | RelationKind::HasOne { local_key, .. } => {
                *local_key = Some(key.into())
            }
            RelationKind::BelongsToMany { parent_key, .. } => *parent_key = Some(key.into()),
            RelationKind::BelongsTo { .. } => {}
        }
        self
    }

    /// Related-side key: `owner_key` for belongs-to, `related_key` for belongs-to-many
    pub fn with_owner_key(mut self, key: impl Into<String>) -> Self {
        match &mut self.kind {
            RelationKind::BelongsTo { owner_key, .. } => *owner_key = Some(key.into()),
            RelationKind::BelongsToMany { related_key, .. } => *related_key = Some(key.into()),
            RelationKind::HasMany { .. } | RelationKind::HasOne { .. } => {}
        }
        self
    }

    /// Extra pivot columns selected alongside belongs-to-many rows
    pub fn with_pivot<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let RelationKind::BelongsToMany { pivot_columns, .. } = &mut self.kind {
            pivot_columns.extend(columns.into_iter().map(Into::into));
        }
        self
    }

    pub fn related(&self) -> ModelSchema {
        (self.related)()
    }

    /// Whether the relation yields a list of rows rather than one row
    pub fn is_many(&self) -> bool {
        matches!(
            self.kind,
            RelationKind::HasMany { .. } | RelationKind::BelongsToMany { .. }
        )
    }

    /// Column of the parent row whose value identifies the related rows
    pub fn parent_key_column(&self, parent: &ModelSchema) -> String {
        match &self.kind {
            RelationKind::HasMany { local_key, .. } | RelationKind::HasOne { local_key, .. } => {
                local_key.clone().unwrap_or_else(|| parent.primary_key().to_string())
            }
            RelationKind::BelongsTo { foreign_key, .. } => foreign_key.clone(),
            RelationKind::BelongsToMany { parent_key, .. } => {
                parent_key.clone().unwrap_or_else(|| parent.primary_key().to_string())
            }
        }
    }

    /// Qualified column on the related side that matches the parent key
    fn related_match_column(&self, related: &ModelSchema) -> String {
        match &self.kind {
            RelationKind::HasMany { foreign_key, .. }
            | RelationKind::HasOne { foreign_key, .. } => {
                related.qualify(foreign_key)
            }
            RelationKind::BelongsTo { owner_key, .. } => {
                related.qualify(owner_key.as_deref().unwrap_or(related.primary_key()))
            }
            RelationKind::BelongsToMany {
                pivot_table,
                foreign_pivot_key,
                ..
            } => format!("{}.{}", pivot_table, foreign_pivot_key),
        }
    }

    /// Value a fetched related row carries for matching back to its parent
    pub fn match_key<'a>(&self, related: &ModelSchema, row: &'a Row) -> Option<&'a Value> {
        match &self.kind {
            RelationKind::HasMany { foreign_key, .. }
            | RelationKind::HasOne { foreign_key, .. } => {
                row.get(foreign_key)
            }
            RelationKind::BelongsTo { owner_key, .. } => {
                row.get(owner_key.as_deref().unwrap_or(related.primary_key()))
            }
            RelationKind::BelongsToMany {
                foreign_pivot_key, ..
            } => row
                .get("pivot")
                .and_then(|pivot| pivot.get(foreign_pivot_key))
                .or_else(|| row.get(&format!("pivot_{}", foreign_pivot_key))),
        }
    }

    /// Keep the column [`Relation::match_key`] reads in a restricted selection
    pub fn ensure_match_column(&self, query: Query) -> Query {
        match &self.kind {
            RelationKind::HasMany { foreign_key, .. }
            | RelationKind::HasOne { foreign_key, .. } => {
                query.ensure_selected(foreign_key)
            }
            RelationKind::BelongsTo { owner_key, .. } => {
                let column = owner_key
                    .clone()
                    .unwrap_or_else(|| query.schema().primary_key().to_string());
                query.ensure_selected(&column)
            }
            // pivot keys are extra columns and survive any selection
            RelationKind::BelongsToMany { .. } => query,
        }
    }

    fn pivot_join(&self, related: &ModelSchema) -> Option<JoinClause> {
        match &self.kind {
            RelationKind::BelongsToMany {
                pivot_table,
                related_pivot_key,
                related_key,
                ..
            } => Some(JoinClause::inner(
                pivot_table.clone(),
                related.qualify(related_key.as_deref().unwrap_or(related.primary_key())),
                format!("{}.{}", pivot_table, related_pivot_key),
            )),
            _ => None,
        }
    }

    /// Correlated subquery over the related table, constrained by its
    /// soft-delete column and global scopes
    pub fn subquery(&self, parent: &ModelSchema, related: &ModelSchema) -> RelationSubquery {
        let outer = parent.qualify(&self.parent_key_column(parent));
        let mut subquery = RelationSubquery::new(
            related.table_name(),
            self.related_match_column(related),
            outer,
        );

        if let Some(join) = self.pivot_join(related) {
            subquery = subquery.join(join);
        }

        subquery.filters(
            related.default_constraints(TrashedMode::WithoutTrashed, &GlobalScopeMode::All),
        )
    }

    fn base_query(&self, related: ModelSchema) -> Query {
        let pivot = self.pivot_join(&related);
        let mut query = Query::new(related);

        if let (
            Some(join),
            RelationKind::BelongsToMany {
                pivot_table,
                foreign_pivot_key,
                related_pivot_key,
                pivot_columns,
                ..
            },
        ) = (pivot, &self.kind)
        {
            let mut columns = vec![foreign_pivot_key.clone(), related_pivot_key.clone()];
            columns.extend(pivot_columns.iter().cloned());
            query = query.join_if_absent(join).select_pivot(pivot_table, &columns);
        }

        query
    }

    /// Related rows of every parent whose key is in `keys`
    pub fn eager_query(&self, related: ModelSchema, keys: Vec<Value>) -> Query {
        let column = self.related_match_column(&related);
        self.base_query(related).where_in(&column, keys)
    }

    /// Related rows of the single parent identified by `key`
    pub fn parent_query(&self, related: ModelSchema, key: Value) -> Query {
        let column = self.related_match_column(&related);
        self.base_query(related).where_op(&column, QueryOperator::Eq, key)
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// The query behind one parent row's relation, e.g. "the related models of test model 1".
///
/// Carries the relation context so pivot columns and anything attached before
/// it is handed on survive.
#[derive(Debug, Clone)]
pub struct RelationQuery {
    parent: ModelSchema,
    relation: Relation,
    parent_key: Value,
    query: Query,
}

impl RelationQuery {
    /// `parent_key` is the parent row's value of
    /// [`Relation::parent_key_column`]: its id for has-many, its foreign key
    /// for belongs-to.
    pub fn new(
        parent: ModelSchema,
        relation: Relation,
        parent_key: Value,
    ) -> Result<Self, QueryError> {
        let related = relation.related();
        related.validate()?;
        relation.kind.validate()?;
        let query = relation.parent_query(related, parent_key.clone());

        Ok(Self {
            parent,
            relation,
            parent_key,
            query,
        })
    }

    pub fn parent(&self) -> &ModelSchema {
        &self.parent
    }

    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    pub fn parent_key(&self) -> &Value {
        &self.parent_key
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn tap(mut self, f: impl FnOnce(Query) -> Query) -> Self {
        self.query = f(self.query);
        self
    }

    pub fn try_tap(
        mut self,
        f: impl FnOnce(Query) -> Result<Query, QueryError>,
    ) -> Result<Self, QueryError> {
        self.query = f(self.query)?;
        Ok(self)
    }

    pub fn into_query(self) -> Query {
        self.query
    }
}
