//! Run configuration, read once at process start.
//!
//! Values come from the environment (optionally seeded from a `.env` file).
//! Defaults are filled in here; variables without a default stay `None` and
//! only fail when the step that needs them runs.
//!
//! A variable set to the empty string is treated as unset, so `S3_KEY=` falls
//! back to [`DEFAULT_S3_KEY`] rather than uploading to an empty key.

use crate::error::{Result, ScoringError};

pub const DEFAULT_S3_KEY: &str = "predictions/output.csv";
pub const DEFAULT_OUTPUT_TABLE: &str = "predictions_table";
pub const DEFAULT_REGISTRY_PATH: &str = "./models";
pub const DEFAULT_OBJECT_STORE_ROOT: &str = "./object-store";

/// Query engine connection parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub catalog: String,
    pub schema: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            user: "user".to_string(),
            catalog: "hive".to_string(),
            schema: "default".to_string(),
        }
    }
}

impl DbConfig {
    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Which registered model to score with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelSelector {
    pub name: Option<String>,
    pub environment: Option<String>,
    pub version: Option<String>,
}

/// A fully specified `(name, environment, version)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub name: String,
    pub environment: String,
    pub version: String,
}

impl ModelSelector {
    pub fn resolve(&self) -> Result<ModelRef> {
        Ok(ModelRef {
            name: required(&self.name, "MODEL_NAME")?,
            environment: required(&self.environment, "ENVIRONMENT")?,
            version: required(&self.version, "MODEL_VERSION")?,
        })
    }
}

/// Where uploads go.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectStoreConfig {
    /// Buckets are directories under `root`.
    Filesystem { root: String },
    /// S3-compatible HTTP endpoint.
    Http { endpoint: String, token: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub db: DbConfig,
    pub registry_path: String,
    pub model: ModelSelector,
    pub bucket: Option<String>,
    pub key: String,
    pub output_table: String,
    pub object_store: ObjectStoreConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            db: DbConfig::default(),
            registry_path: DEFAULT_REGISTRY_PATH.to_string(),
            model: ModelSelector::default(),
            bucket: None,
            key: DEFAULT_S3_KEY.to_string(),
            output_table: DEFAULT_OUTPUT_TABLE.to_string(),
            object_store: ObjectStoreConfig::Filesystem {
                root: DEFAULT_OBJECT_STORE_ROOT.to_string(),
            },
        }
    }
}

impl ScoringConfig {
    /// Read the process environment, after loading `.env` if one exists.
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => log::debug!("loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(ScoringError::Config(format!("reading .env: {e}"))),
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let defaults = ScoringConfig::default();

        let port = match get("DB_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| ScoringError::Config(format!("DB_PORT '{raw}': {e}")))?,
            None => defaults.db.port,
        };

        let object_store = match get("OBJECT_STORE_ENDPOINT") {
            Some(endpoint) => ObjectStoreConfig::Http {
                endpoint,
                token: get("OBJECT_STORE_TOKEN"),
            },
            None => ObjectStoreConfig::Filesystem {
                root: get("OBJECT_STORE_ROOT").unwrap_or_else(|| DEFAULT_OBJECT_STORE_ROOT.to_string()),
            },
        };

        Ok(Self {
            db: DbConfig {
                host: get("DB_HOST").unwrap_or(defaults.db.host),
                port,
                user: get("DB_USER").unwrap_or(defaults.db.user),
                catalog: get("DB_CATALOG").unwrap_or(defaults.db.catalog),
                schema: get("DB_SCHEMA").unwrap_or(defaults.db.schema),
            },
            registry_path: get("MODEL_REGISTRY_PATH").unwrap_or(defaults.registry_path),
            model: ModelSelector {
                name: get("MODEL_NAME"),
                environment: get("ENVIRONMENT"),
                version: get("MODEL_VERSION"),
            },
            bucket: get("S3_BUCKET"),
            key: get("S3_KEY").unwrap_or(defaults.key),
            output_table: get("OUTPUT_TABLE").unwrap_or(defaults.output_table),
            object_store,
        })
    }

    pub fn bucket(&self) -> Result<&str> {
        self.bucket
            .as_deref()
            .ok_or_else(|| missing("S3_BUCKET"))
    }
}

fn required(value: &Option<String>, name: &str) -> Result<String> {
    value.clone().ok_or_else(|| missing(name))
}

fn missing(name: &str) -> ScoringError {
    ScoringError::Config(format!("{name} is not set"))
}
