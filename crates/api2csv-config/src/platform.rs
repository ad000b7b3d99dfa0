// Platform detection based on environment variables
//
// Auto-detects runtime environment:
// - Azure Functions custom handler: FUNCTIONS_CUSTOMHANDLER_PORT or
//   FUNCTIONS_WORKER_RUNTIME present
// - Server: neither present (default)

use crate::env_overrides::EnvSource;
use crate::{LogFormat, SecretBackend, StorageBackend};

pub const FUNCTIONS_PORT_VAR: &str = "FUNCTIONS_CUSTOMHANDLER_PORT";
const FUNCTIONS_RUNTIME_VAR: &str = "FUNCTIONS_WORKER_RUNTIME";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Server,
    AzureFunctions,
}

impl Platform {
    /// Auto-detect the current platform based on environment variables
    pub fn detect() -> Self {
        Self::detect_from(&crate::sources::StdEnvSource)
    }

    pub fn detect_from<E: EnvSource>(env: &E) -> Self {
        if env.get_raw(FUNCTIONS_PORT_VAR).is_some() || env.get_raw(FUNCTIONS_RUNTIME_VAR).is_some()
        {
            Platform::AzureFunctions
        } else {
            Platform::Server
        }
    }

    /// Get platform-specific defaults
    pub fn defaults(&self) -> PlatformDefaults {
        match self {
            Platform::Server => PlatformDefaults {
                listen_addr: "0.0.0.0:8080",
                log_format: LogFormat::Text,
                storage_backend: StorageBackend::Fs,
                secret_backend: SecretBackend::Env,
            },
            Platform::AzureFunctions => PlatformDefaults {
                listen_addr: "127.0.0.1:7071",
                log_format: LogFormat::Json,
                storage_backend: StorageBackend::Azblob,
                secret_backend: SecretBackend::KeyVault,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlatformDefaults {
    pub listen_addr: &'static str,
    pub log_format: LogFormat,
    pub storage_backend: StorageBackend,
    pub secret_backend: SecretBackend,
}
