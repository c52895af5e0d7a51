//! Named model registry
//!
//! Lets callers address models by name (e.g. from a route parameter) instead
//! of by type.

use crate::errors::QueryError;
use crate::model::{Model, ModelSchema};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, ModelSchema>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `M` under its table name
    pub fn register<M: Model>(&mut self) -> Result<(), QueryError> {
        self.register_schema(M::table_name(), ModelSchema::of::<M>())
    }

    /// Register a schema under an explicit name
    pub fn register_schema(
        &mut self,
        name: impl Into<String>,
        schema: ModelSchema,
    ) -> Result<(), QueryError> {
        let name = name.into();
        if self.models.contains_key(&name) {
            return Err(QueryError::ModelAlreadyRegistered(name));
        }

        schema.validate()?;
        self.models.insert(name, schema);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ModelSchema> {
        self.models.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn unregister(&mut self, name: &str) -> Result<ModelSchema, QueryError> {
        self.models
            .remove(name)
            .ok_or_else(|| QueryError::ModelNotFound(name.to_string()))
    }
}
