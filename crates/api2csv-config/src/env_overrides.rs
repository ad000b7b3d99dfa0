use super::{
    AzblobConfig, FsConfig, KeyVaultConfig, LogFormat, RuntimeConfig, SecretBackend,
    StorageBackend, FUNCTIONS_PORT_VAR,
};
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;

pub const ENV_PREFIX: &str = "API2CSV_";

/// Abstraction over environment-variable lookups so tests and embedding
/// hosts can supply their own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the API2CSV_ prefix
    /// Used for the service-principal and account variables the hosting
    /// environment already defines (AR_TENANT_ID, IG_BUSINESS_ACCOUNT_ID, etc.)
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// In-memory environment. Prefixed keys are stored without the prefix.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    prefixed: HashMap<String, String>,
    raw: HashMap<String, String>,
}

impl MapEnv {
    pub fn var(mut self, key: &str, value: &str) -> Self {
        self.prefixed.insert(key.to_string(), value.to_string());
        self
    }

    pub fn raw(mut self, key: &str, value: &str) -> Self {
        self.raw.insert(key.to_string(), value.to_string());
        self
    }
}

impl EnvSource for MapEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.prefixed.get(key).cloned()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        self.raw.get(key).cloned()
    }
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Server configuration (listen addr, log level/format). The functions host
    // hands the custom handler its port; an explicit LISTEN_ADDR still wins.
    if let Some(port) = get_raw_env_u16(env, FUNCTIONS_PORT_VAR)? {
        config.server.listen_addr = format!("127.0.0.1:{}", port);
    }
    if let Some(addr) = get_env_string(env, "LISTEN_ADDR")? {
        config.server.listen_addr = addr;
    }
    if let Some(level) = get_env_string(env, "LOG_LEVEL")? {
        config.server.log_level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT")? {
        config.server.log_format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    if let Some(val) = get_env_u64(env, "HTTP_TIMEOUT_SECS")? {
        config.http.timeout_secs = val;
    }

    // Storage backend
    if let Some(backend) = get_env_string(env, "STORAGE_BACKEND")? {
        config.storage.backend = backend
            .parse::<StorageBackend>()
            .context("Invalid API2CSV_STORAGE_BACKEND value")?;
    }
    if let Some(path) = get_env_string(env, "STORAGE_PATH")? {
        config.storage.fs.get_or_insert_with(FsConfig::default).path = path;
    }
    if let Some(account) = get_env_string(env, "AZBLOB_ACCOUNT")? {
        ensure_azblob(config).account_name = account;
    }
    if let Some(secret) = get_env_string(env, "AZBLOB_ACCOUNT_KEY_SECRET")? {
        ensure_azblob(config).account_key_secret = secret;
    }
    if let Some(endpoint) = get_env_string(env, "AZBLOB_ENDPOINT")? {
        ensure_azblob(config).endpoint = Some(endpoint);
    }

    // Secret store
    if let Some(backend) = get_env_string(env, "SECRETS_BACKEND")? {
        config.secrets.backend = backend
            .parse::<SecretBackend>()
            .context("Invalid API2CSV_SECRETS_BACKEND value")?;
    }
    if let Some(url) = get_env_string(env, "KEYVAULT_URL")? {
        ensure_keyvault(config).vault_url = url;
    }
    // Service principal (without API2CSV_ prefix, as the functions app defines them)
    if let Some(tenant) = get_raw_env_string(env, "AR_TENANT_ID")? {
        ensure_keyvault(config).tenant_id = tenant;
    }
    if let Some(client) = get_raw_env_string(env, "AR_CLIENT_ID")? {
        ensure_keyvault(config).client_id = client;
    }
    if let Some(secret) = get_raw_env_string(env, "AR_APP_SECRET")? {
        ensure_keyvault(config).client_secret = secret;
    }

    // Instagram
    if let Some(account) = get_raw_env_string(env, "IG_BUSINESS_ACCOUNT_ID")? {
        config.instagram.account_id = account;
    }
    if let Some(account) = get_env_string(env, "INSTAGRAM_ACCOUNT_ID")? {
        config.instagram.account_id = account;
    }
    if let Some(url) = get_env_string(env, "GRAPH_URL")? {
        config.instagram.graph_url = url;
    }
    if let Some(val) = get_env_u32(env, "INSTAGRAM_WINDOW_DAYS")? {
        config.instagram.window_days = val;
    }
    if let Some(val) = get_env_usize(env, "INSTAGRAM_MAX_PAGES")? {
        config.instagram.max_pages = Some(val);
    }

    // Backend report
    if let Some(url) = get_env_string(env, "BACKEND_REPORT_URL")? {
        config.backend_report.url = url;
    }

    // Weather dataset
    if let Some(url) = get_env_string(env, "KNMI_BASE_URL")? {
        config.knmi.base_url = url;
    }
    if let Some(dataset) = get_env_string(env, "KNMI_DATASET")? {
        config.knmi.dataset = dataset;
    }
    if let Some(version) = get_env_string(env, "KNMI_VERSION")? {
        config.knmi.version = version;
    }

    // Analytics
    if let Some(url) = get_env_string(env, "ANALYTICS_API_URL")? {
        config.analytics.api_url = url;
    }
    if let Some(date) = get_env_string(env, "ANALYTICS_START_DATE")? {
        config.analytics.start_date = date;
    }

    Ok(())
}

fn ensure_azblob(config: &mut RuntimeConfig) -> &mut AzblobConfig {
    config
        .storage
        .azblob
        .get_or_insert_with(AzblobConfig::default)
}

fn ensure_keyvault(config: &mut RuntimeConfig) -> &mut KeyVaultConfig {
    config
        .secrets
        .keyvault
        .get_or_insert_with(KeyVaultConfig::default)
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env.get(key))
}

/// Get a raw environment variable without the API2CSV_ prefix
fn get_raw_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env.get_raw(key))
}

fn get_raw_env_u16<E: EnvSource>(env: &E, key: &str) -> Result<Option<u16>> {
    match get_raw_env_string(env, key)? {
        Some(val) => {
            let parsed = val
                .parse::<u16>()
                .map_err(|e| anyhow!("Failed to parse {}: {}", key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = val
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_u64<E: EnvSource>(env: &E, key: &str) -> Result<Option<u64>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = val
                .parse::<u64>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_u32<E: EnvSource>(env: &E, key: &str) -> Result<Option<u32>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = val
                .parse::<u32>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}
