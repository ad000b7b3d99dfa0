// OpenDAL-based artifact storage
//
// One `ObjectStore` per process, one `Container` per job invocation:
// - Azure Blob / Data Lake: one operator per container, opened with the
//   account key resolved at invocation time
// - Filesystem and memory: a single shared operator, containers are
//   top-level directories
//
// Operator clones share backend state, so every container opened from the
// same memory store sees the same objects.

mod container;
mod error;

pub use container::Container;
pub use error::{Result, StorageError};

use api2csv_config::{AzblobConfig, StorageBackend, StorageConfig};
use opendal::{services, Operator};

#[derive(Clone)]
pub struct ObjectStore {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Shared { kind: StorageBackend, operator: Operator },
    Azblob(AzblobConfig),
}

impl ObjectStore {
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        match config.backend {
            StorageBackend::Fs => {
                let fs = config.fs.as_ref().ok_or_else(|| {
                    StorageError::invalid_config("fs config required for filesystem backend")
                })?;
                Self::fs(&fs.path)
            }
            StorageBackend::Azblob => {
                let azblob = config.azblob.as_ref().ok_or_else(|| {
                    StorageError::invalid_config("azblob config required for azblob backend")
                })?;
                Ok(Self {
                    backend: Backend::Azblob(azblob.clone()),
                })
            }
            StorageBackend::Memory => Self::memory(),
        }
    }

    /// Local filesystem rooted at `root`
    pub fn fs(root: &str) -> Result<Self> {
        let builder = services::Fs::default().root(root);
        let operator = Operator::new(builder)
            .map_err(|e| {
                StorageError::invalid_config(format!("Failed to create filesystem operator: {}", e))
            })?
            .finish();
        tracing::debug!(root, "Filesystem storage initialized");
        Ok(Self {
            backend: Backend::Shared {
                kind: StorageBackend::Fs,
                operator,
            },
        })
    }

    /// In-process store for tests and dry runs
    pub fn memory() -> Result<Self> {
        let operator = Operator::new(services::Memory::default())
            .map_err(|e| {
                StorageError::invalid_config(format!("Failed to create memory operator: {}", e))
            })?
            .finish();
        Ok(Self {
            backend: Backend::Shared {
                kind: StorageBackend::Memory,
                operator,
            },
        })
    }

    pub fn kind(&self) -> StorageBackend {
        match &self.backend {
            Backend::Shared { kind, .. } => *kind,
            Backend::Azblob(_) => StorageBackend::Azblob,
        }
    }

    /// Account label used in status messages
    pub fn account(&self) -> &str {
        match &self.backend {
            Backend::Shared { .. } => "local",
            Backend::Azblob(azblob) => &azblob.account_name,
        }
    }

    /// Secret name holding the account key, when the backend needs one
    pub fn account_key_secret(&self) -> Option<&str> {
        match &self.backend {
            Backend::Shared { .. } => None,
            Backend::Azblob(azblob) => Some(&azblob.account_key_secret),
        }
    }

    /// Open a container. `account_key` is required for azblob and ignored
    /// otherwise.
    pub fn container(&self, name: &str, account_key: Option<&str>) -> Result<Container> {
        match &self.backend {
            Backend::Shared { operator, .. } => Ok(Container::new(
                operator.clone(),
                self.account().to_string(),
                name.to_string(),
                format!("{}/", name.trim_matches('/')),
            )),
            Backend::Azblob(azblob) => {
                let key = account_key.ok_or_else(|| {
                    StorageError::invalid_config(format!(
                        "azblob container '{}' requires the account key",
                        name
                    ))
                })?;
                let builder = services::Azblob::default()
                    .container(name)
                    .endpoint(&azblob.endpoint())
                    .account_name(&azblob.account_name)
                    .account_key(key);
                let operator = Operator::new(builder)
                    .map_err(|e| {
                        StorageError::invalid_config(format!(
                            "Failed to create azblob operator for '{}': {}",
                            name, e
                        ))
                    })?
                    .finish();
                tracing::debug!(
                    account = %azblob.account_name,
                    container = name,
                    key_len = key.len(),
                    "Azure blob container opened"
                );
                Ok(Container::new(
                    operator,
                    azblob.account_name.clone(),
                    name.to_string(),
                    String::new(),
                ))
            }
        }
    }
}
