//! # Configuration Management for QueryHaus
//!
//! Request parameter names, delimiters, strictness and include suffixes for
//! the query engine, plus optional database connection settings.
//!
//! ## Quick Start
//!
//! ### Programmatic Configuration
//! ```rust
//! use config::{QueryConfig, StrictMode};
//!
//! let config = QueryConfig::default().with_strict(StrictMode::all(false));
//! assert_eq!(config.parameters.filter, "filter");
//! ```
//!
//! ### TOML File Configuration
//! ```toml
//! [parameters]
//! filter = "filter"
//! sort = "sort"
//! include = "include"
//! fields = "fields"
//! append = "append"
//!
//! [delimiters]
//! filter_array = ","
//! sort = ","
//! include = ","
//! fields = ","
//! append = ","
//!
//! [strict]
//! filters = true
//! sorts = true
//! includes = true
//! fields = true
//! appends = true
//!
//! [suffixes]
//! count = "Count"
//! exists = "Exists"
//!
//! [database]
//! host = "localhost"
//! port = 5432
//! database = "myapp"
//! username = "postgres"
//! password = "password"
//! max_connections = 10
//! ```
//!
//! Load configuration:
//! ```rust,no_run
//! use config::QueryConfig;
//!
//! // QUERYHAUS_CONFIG, then ./queryhaus.toml, then defaults
//! let config = QueryConfig::load()?;
//!
//! // Or load from custom path
//! let config = QueryConfig::from_file("config/production.toml")?;
//! # Ok::<(), config::ConfigError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::{env, path::Path};
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "./queryhaus.toml";
const CONFIG_ENV_VAR: &str = "QUERYHAUS_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub parameters: ParameterNames,
    pub delimiters: Delimiters,
    pub strict: StrictMode,
    pub suffixes: IncludeSuffixes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,
}

/// Names of the request parameter groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterNames {
    pub filter: String,
    pub sort: String,
    pub include: String,
    pub fields: String,
    pub append: String,
}

impl Default for ParameterNames {
    fn default() -> Self {
        Self {
            filter: "filter".to_string(),
            sort: "sort".to_string(),
            include: "include".to_string(),
            fields: "fields".to_string(),
            append: "append".to_string(),
        }
    }
}

impl ParameterNames {
    fn all(&self) -> [&str; 5] {
        [
            &self.filter,
            &self.sort,
            &self.include,
            &self.fields,
            &self.append,
        ]
    }
}

/// Token separators per parameter group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delimiters {
    /// Splits a filter value into a list (`filter[id]=1,2`)
    pub filter_array: char,
    pub sort: char,
    pub include: char,
    pub fields: char,
    pub append: char,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            filter_array: ',',
            sort: ',',
            include: ',',
            fields: ',',
            append: ',',
        }
    }
}

impl Delimiters {
    fn all(&self) -> [(&'static str, char); 5] {
        [
            ("filter_array", self.filter_array),
            ("sort", self.sort),
            ("include", self.include),
            ("fields", self.fields),
            ("append", self.append),
        ]
    }
}

/// Whether unknown directives of each kind fail the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrictMode {
    pub filters: bool,
    pub sorts: bool,
    pub includes: bool,
    pub fields: bool,
    pub appends: bool,
}

impl StrictMode {
    pub fn all(strict: bool) -> Self {
        Self {
            filters: strict,
            sorts: strict,
            includes: strict,
            fields: strict,
            appends: strict,
        }
    }
}

impl Default for StrictMode {
    fn default() -> Self {
        Self::all(true)
    }
}

/// Suffixes that turn a relation include into a count or existence include
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncludeSuffixes {
    pub count: String,
    pub exists: String,
}

impl Default for IncludeSuffixes {
    fn default() -> Self {
        Self {
            count: "Count".to_string(),
            exists: "Exists".to_string(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

impl QueryConfig {
    /// Load configuration from the file named by `QUERYHAUS_CONFIG` (a `.env`
    /// file is honoured), else `./queryhaus.toml`, else defaults
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        if let Ok(config_path) = env::var(CONFIG_ENV_VAR) {
            Self::from_file(&config_path)
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::from_file(DEFAULT_CONFIG_PATH)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_strict(mut self, strict: StrictMode) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let names = self.parameters.all();
        for (index, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "Parameter group names cannot be empty".to_string(),
                ));
            }
            if names[..index].contains(name) {
                return Err(ConfigError::Invalid(format!(
                    "Parameter group name '{}' is used more than once",
                    name
                )));
            }
        }

        for (group, delimiter) in self.delimiters.all() {
            if delimiter.is_alphanumeric() || matches!(delimiter, '_' | '.' | '-') {
                return Err(ConfigError::Invalid(format!(
                    "Delimiter '{}' for {} would split names",
                    delimiter, group
                )));
            }
        }

        if self.suffixes.count.is_empty() || self.suffixes.exists.is_empty() {
            return Err(ConfigError::Invalid(
                "Include suffixes cannot be empty".to_string(),
            ));
        }
        if self.suffixes.count == self.suffixes.exists {
            return Err(ConfigError::Invalid(
                "Count and exists include suffixes must differ".to_string(),
            ));
        }

        if let Some(database) = &self.database {
            if database.host.is_empty() {
                return Err(ConfigError::Invalid(
                    "Database host cannot be empty".to_string(),
                ));
            }
            if database.port == 0 {
                return Err(ConfigError::Invalid(
                    "Database port cannot be zero".to_string(),
                ));
            }
            if database.database.is_empty() {
                return Err(ConfigError::Invalid(
                    "Database name cannot be empty".to_string(),
                ));
            }
            if database.max_connections == 0 {
                return Err(ConfigError::Invalid(
                    "Database max_connections must be greater than 0".to_string(),
                ));
            }
        }

        Ok(())
    }
}

impl DatabaseConfig {
    /// Build connection string
    pub fn connection_string(&self) -> String {
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}
