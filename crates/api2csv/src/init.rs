// Initialization utilities
//
// Logging setup and the long-lived services every job invocation draws from

use anyhow::{Context, Result};
use api2csv_config::{LogFormat, RuntimeConfig};
use api2csv_sources::{HttpClient, ReqwestHttpClient, SecretStore};
use api2csv_storage::ObjectStore;
use std::sync::Arc;
use tracing::info;

/// Process-wide handles shared by every invocation.
///
/// Secrets are deliberately not resolved here. Unless a fixed store is
/// injected, each [`crate::JobContext`] opens its own secret store.
#[derive(Clone)]
pub struct Services {
    pub(crate) config: Arc<RuntimeConfig>,
    pub(crate) http: Arc<dyn HttpClient>,
    pub(crate) store: ObjectStore,
    pub(crate) secrets: Option<Arc<dyn SecretStore>>,
}

impl Services {
    /// Build the production HTTP client and object store from `config`.
    pub fn from_config(config: RuntimeConfig) -> Result<Self> {
        info!(
            "Initializing services with storage backend: {} (secrets: {:?})",
            config.storage.backend, config.secrets.backend
        );

        let http = ReqwestHttpClient::new(config.http.timeout())
            .context("Failed to create HTTP client")?;
        let store = ObjectStore::from_config(&config.storage)
            .context("Failed to initialize object storage")?;

        Ok(Self {
            config: Arc::new(config),
            http: Arc::new(http),
            store,
            secrets: None,
        })
    }

    /// Assemble services from explicit parts (tests, embedding).
    pub fn new(config: RuntimeConfig, http: Arc<dyn HttpClient>, store: ObjectStore) -> Self {
        Self {
            config: Arc::new(config),
            http,
            store,
            secrets: None,
        }
    }

    /// Use one fixed secret store for every invocation.
    pub fn with_secret_store(mut self, secrets: Arc<dyn SecretStore>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }
}

/// Initialize tracing/logging from RuntimeConfig
pub fn init_tracing(config: &RuntimeConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let server = &config.server;

    // Parse log level from config
    let env_filter =
        EnvFilter::try_new(&server.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Try to set the global subscriber; ignore error if already set (idempotent)
    let _ = match server.log_format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
        }
        LogFormat::Text => tracing::subscriber::set_global_default(registry.with(fmt::layer())),
    };
}
