//! Config - Backend Selection
//!
//! TigerStyle: explicit, validated configuration; defaults from constants.
//!
//! A [`RegistryConfig`] is plain data (serde) so front ends can build it
//! from flags, environment or a file. [`open_registrar`] turns it into a
//! shared `Arc<dyn Registrar>`.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    BUILDING_TABLE_NAME_DEFAULT, REQUEST_TIMEOUT_MS_DEFAULT, RESIDENT_TABLE_NAME_DEFAULT,
    UNIT_TABLE_NAME_DEFAULT,
};
use crate::context::Context;
use crate::registry::{DocumentRegistrar, Registrar, RegistryError, SqlRegistrar};
use crate::store::MemoryItemStore;

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A value is missing or out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The backend was compiled out.
    #[error("backend `{0}` requires building with the `{0}` feature")]
    FeatureDisabled(&'static str),

    /// The backend could not be opened.
    #[error("failed to open registrar: {0}")]
    Open(#[from] RegistryError),
}

/// Which storage backs the registrar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Relational storage at a SQLite URL.
    Sql {
        /// e.g. `sqlite://liszt.db` or `sqlite::memory:`
        url: String,
    },
    /// Document storage held in process memory.
    Memory,
    /// Document storage in DynamoDB.
    Dynamo {
        /// AWS region, default chain when unset
        #[serde(default)]
        region: Option<String>,
        /// Endpoint override, e.g. a local DynamoDB
        #[serde(default)]
        endpoint: Option<String>,
    },
}

/// Document table per entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    /// Buildings table
    pub buildings: String,
    /// Units table
    pub units: String,
    /// Residents table
    pub residents: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            buildings: BUILDING_TABLE_NAME_DEFAULT.to_string(),
            units: UNIT_TABLE_NAME_DEFAULT.to_string(),
            residents: RESIDENT_TABLE_NAME_DEFAULT.to_string(),
        }
    }
}

/// Everything needed to open a registrar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Storage backend
    pub backend: BackendConfig,
    /// Document table names, ignored by the relational backend
    #[serde(default)]
    pub tables: TableNames,
    /// Deadline applied to each call made through [`Self::context`]
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    REQUEST_TIMEOUT_MS_DEFAULT
}

impl RegistryConfig {
    /// Configuration for `backend` with default tables and timeout.
    #[must_use]
    pub fn new(backend: BackendConfig) -> Self {
        Self {
            backend,
            tables: TableNames::default(),
            request_timeout_ms: REQUEST_TIMEOUT_MS_DEFAULT,
        }
    }

    /// Per-call timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// A fresh context bounded by the request timeout.
    #[must_use]
    pub fn context(&self) -> Context {
        Context::with_timeout(self.request_timeout())
    }

    /// Check the configuration before opening anything.
    ///
    /// # Errors
    /// `Invalid` for an empty URL, empty or repeated table names, or a
    /// zero timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "request timeout must be positive".to_string(),
            ));
        }

        match &self.backend {
            BackendConfig::Sql { url } if url.trim().is_empty() => {
                Err(ConfigError::Invalid("database url is required".to_string()))
            }
            BackendConfig::Sql { .. } => Ok(()),
            BackendConfig::Memory | BackendConfig::Dynamo { .. } => self.validate_tables(),
        }
    }

    fn validate_tables(&self) -> Result<(), ConfigError> {
        let TableNames {
            buildings,
            units,
            residents,
        } = &self.tables;

        for (entity, name) in [("building", buildings), ("unit", units), ("resident", residents)] {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{entity} table name is required")));
            }
        }
        if buildings == units || units == residents || buildings == residents {
            return Err(ConfigError::Invalid(
                "table names must be distinct".to_string(),
            ));
        }
        Ok(())
    }
}

/// Open the configured backend.
///
/// # Errors
/// `Invalid` for bad configuration, `FeatureDisabled` when DynamoDB was not
/// compiled in, `Open` when the backend cannot be reached.
pub async fn open_registrar(config: &RegistryConfig) -> Result<Arc<dyn Registrar>, ConfigError> {
    config.validate()?;

    match &config.backend {
        BackendConfig::Sql { url } => {
            let registrar = SqlRegistrar::connect(url).await?;
            Ok(Arc::new(registrar))
        }
        BackendConfig::Memory => {
            tracing::info!("using in-memory document registrar");
            let store = Arc::new(MemoryItemStore::new());
            Ok(Arc::new(DocumentRegistrar::new(store, config.tables.clone())))
        }
        #[cfg(feature = "dynamodb")]
        BackendConfig::Dynamo { region, endpoint } => {
            let store =
                crate::store::DynamoItemStore::connect(region.clone(), endpoint.clone()).await;
            Ok(Arc::new(DocumentRegistrar::new(
                Arc::new(store),
                config.tables.clone(),
            )))
        }
        #[cfg(not(feature = "dynamodb"))]
        BackendConfig::Dynamo { .. } => Err(ConfigError::FeatureDisabled("dynamodb")),
    }
}

// =============================================================================
// Tests
// =============================================================================
