//! Core QueryHaus functionality
//!
//! [`QueryHaus`] holds what request sessions share: the loaded configuration,
//! the registry of named models and, once connected, the database pool.

use sqlx::PgPool;
use std::sync::Arc;

use crate::builder::QueryBuilder;
use crate::errors::{QueryBuilderError, QueryHausError};
use crate::request::QueryRequest;
use crate::subject::Subject;
use config::QueryConfig;
use query_object::{Model, ModelRegistry, ModelSchema};

/// Main QueryHaus coordinator
#[derive(Debug, Clone)]
pub struct QueryHaus {
    pool: Option<PgPool>,
    registry: Arc<ModelRegistry>,
    config: Arc<QueryConfig>,
}

impl QueryHaus {
    /// Create a coordinator without a database connection
    pub fn new(config: QueryConfig) -> Self {
        Self {
            pool: None,
            registry: Arc::new(ModelRegistry::new()),
            config: Arc::new(config),
        }
    }

    /// Create a coordinator connected to the configured database
    pub async fn connect(config: QueryConfig) -> Result<Self, QueryHausError> {
        config.validate()?;
        let database = config
            .database
            .as_ref()
            .ok_or(QueryHausError::MissingDatabaseConfig)?;

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(database.max_connections)
            .connect(&database.connection_string())
            .await?;

        debug_log!(
            "[CONNECT] {}:{}/{} (max {} connections)",
            database.host,
            database.port,
            database.database,
            database.max_connections
        );

        Ok(Self {
            pool: Some(pool),
            ..Self::new(config)
        })
    }

    /// Load configuration the usual way and connect
    pub async fn from_env() -> Result<Self, QueryHausError> {
        Self::connect(QueryConfig::load()?).await
    }

    /// Database pool, if connected
    pub fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Register `M` under its table name
    pub fn register_model<M: Model>(&mut self) -> Result<(), QueryHausError> {
        Arc::make_mut(&mut self.registry).register::<M>()?;
        Ok(())
    }

    /// Register a schema under an explicit name
    pub fn register_schema(
        &mut self,
        name: impl Into<String>,
        schema: ModelSchema,
    ) -> Result<(), QueryHausError> {
        Arc::make_mut(&mut self.registry).register_schema(name, schema)?;
        Ok(())
    }

    pub fn unregister_model(&mut self, name: &str) -> Result<(), QueryHausError> {
        Arc::make_mut(&mut self.registry).unregister(name)?;
        Ok(())
    }

    /// List all registered model names
    pub fn list_models(&self) -> Vec<&str> {
        self.registry.names()
    }

    /// Session over a registered model, addressed by name
    pub fn for_model(
        &self,
        name: &str,
        request: impl Into<QueryRequest>,
    ) -> Result<QueryBuilder, QueryBuilderError> {
        let subject = Subject::named(name, Arc::clone(&self.registry));
        Ok(QueryBuilder::for_subject(subject, request)?.with_config(Arc::clone(&self.config)))
    }

    /// Session over `M`
    pub fn query<M: Model>(
        &self,
        request: impl Into<QueryRequest>,
    ) -> Result<QueryBuilder, QueryBuilderError> {
        Ok(QueryBuilder::for_subject(Subject::model::<M>(), request)?
            .with_config(Arc::clone(&self.config)))
    }

    /// Check database connection health
    pub async fn health_check(&self) -> Result<(), QueryHausError> {
        let pool = self.pool.as_ref().ok_or(QueryHausError::NotConnected)?;
        sqlx::query("SELECT 1").fetch_one(pool).await?;
        Ok(())
    }
}
