// api2csv-config - Unified configuration for the ingestion jobs
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from API2CSV_CONFIG env var
// 3. Config file contents from API2CSV_CONFIG_CONTENT env var
// 4. Default config file locations (./config.toml, ./.api2csv.toml)
// 5. Platform-specific defaults (lowest priority)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod env_overrides;
mod platform;
mod sources;
mod validation;

pub use env_overrides::{EnvSource, MapEnv, ENV_PREFIX};
pub use platform::{Platform, PlatformDefaults, FUNCTIONS_PORT_VAR};

/// Main runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub http: HttpConfig,

    pub storage: StorageConfig,

    #[serde(default)]
    pub secrets: SecretsConfig,

    #[serde(default)]
    pub instagram: InstagramConfig,

    #[serde(default)]
    pub backend_report: BackendReportConfig,

    #[serde(default)]
    pub knmi: KnmiConfig,

    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Outbound HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs: Option<FsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azblob: Option<AzblobConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Fs,
    Azblob,
    Memory,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Fs => write!(f, "fs"),
            StorageBackend::Azblob => write!(f, "azblob"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fs" | "filesystem" => Ok(StorageBackend::Fs),
            "azblob" | "azure" | "blob" => Ok(StorageBackend::Azblob),
            "memory" | "mem" => Ok(StorageBackend::Memory),
            _ => anyhow::bail!(
                "Unsupported storage backend: {}. Supported: fs, azblob, memory",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsConfig {
    pub path: String,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            path: "./data".to_string(),
        }
    }
}

/// Azure Blob / Data Lake account. The account key is a secret name, not
/// the key itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzblobConfig {
    pub account_name: String,
    pub account_key_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl AzblobConfig {
    pub fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}.blob.core.windows.net", self.account_name))
    }
}

impl Default for AzblobConfig {
    fn default() -> Self {
        Self {
            account_name: "dlscddatabreind1".to_string(),
            account_key_secret: "dls-databrein-d1-v2".to_string(),
            endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretBackend {
    Env,
    KeyVault,
}

impl std::str::FromStr for SecretBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "env" | "environment" => Ok(SecretBackend::Env),
            "keyvault" | "key-vault" | "kv" => Ok(SecretBackend::KeyVault),
            _ => anyhow::bail!("Unsupported secret backend: {}. Supported: env, keyvault", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    pub backend: SecretBackend,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyvault: Option<KeyVaultConfig>,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            backend: SecretBackend::Env,
            keyvault: None,
        }
    }
}

/// Key vault reached with an AAD client-credentials service principal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyVaultConfig {
    pub vault_url: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default, skip_serializing)]
    pub client_secret: String,
    #[serde(default = "default_authority_host")]
    pub authority_host: String,
    #[serde(default = "default_keyvault_api_version")]
    pub api_version: String,
}

fn default_authority_host() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_keyvault_api_version() -> String {
    "7.4".to_string()
}

impl Default for KeyVaultConfig {
    fn default() -> Self {
        Self {
            vault_url: "https://kv-cd-databrein-d1.vault.azure.net/".to_string(),
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            authority_host: default_authority_host(),
            api_version: default_keyvault_api_version(),
        }
    }
}

/// Social-media insights and media jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstagramConfig {
    pub graph_url: String,
    pub insights_version: String,
    pub media_version: String,
    pub post_version: String,
    pub account_id: String,
    pub token_secret: String,
    /// Metrics reported one value per day
    pub per_day_metrics: Vec<String>,
    /// Per-day metrics fetched without a `since` window (walk backward)
    pub unbounded_metrics: Vec<String>,
    /// Metrics reported as one total per day window
    pub aggregate_metrics: Vec<String>,
    /// Aggregate metrics requested with `breakdown=follow_type`
    pub breakdown_metrics: Vec<String>,
    /// Rows missing any of these are dropped from the daily and merged tables
    pub required_columns: Vec<String>,
    pub window_days: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<usize>,
    pub container: String,
    pub insights_folder: String,
    pub archive_folder: String,
    pub media_folder: String,
    pub insights_stem: String,
    pub bulk_file: String,
    pub media_file: String,
}

impl Default for InstagramConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            graph_url: "https://graph.facebook.com".to_string(),
            insights_version: "v20.0".to_string(),
            media_version: "v16.0".to_string(),
            post_version: "v19.0".to_string(),
            account_id: String::new(),
            token_secret: "Meta-Page-Token".to_string(),
            per_day_metrics: strings(&["follower_count", "reach", "impressions"]),
            unbounded_metrics: strings(&["follower_count"]),
            aggregate_metrics: strings(&[
                "follows_and_unfollows",
                "accounts_engaged",
                "profile_views",
                "website_clicks",
            ]),
            breakdown_metrics: strings(&["follows_and_unfollows"]),
            required_columns: strings(&["accounts_engaged", "profile_views", "website_clicks"]),
            window_days: 30,
            max_pages: None,
            container: "insta-csv-files".to_string(),
            insights_folder: "Insta_insights".to_string(),
            archive_folder: "Archief".to_string(),
            media_folder: "Insta_media".to_string(),
            insights_stem: "Insta_insights".to_string(),
            bulk_file: "Insta_insights.csv".to_string(),
            media_file: "Insta_posts.csv".to_string(),
        }
    }
}

impl InstagramConfig {
    pub fn insights_url(&self) -> String {
        format!(
            "{}/{}/{}/insights",
            self.graph_url.trim_end_matches('/'),
            self.insights_version,
            self.account_id
        )
    }

    pub fn media_url(&self) -> String {
        format!(
            "{}/{}/{}/media",
            self.graph_url.trim_end_matches('/'),
            self.media_version,
            self.account_id
        )
    }

    pub fn post_url(&self, media_id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.graph_url.trim_end_matches('/'),
            self.post_version,
            media_id
        )
    }

    pub fn is_breakdown(&self, metric: &str) -> bool {
        self.breakdown_metrics.iter().any(|m| m == metric)
    }

    pub fn is_unbounded(&self, metric: &str) -> bool {
        self.unbounded_metrics.iter().any(|m| m == metric)
    }
}

/// CMS backend order report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendReportConfig {
    pub url: String,
    pub post_key_secret: String,
    pub container: String,
    pub folder: String,
    pub file: String,
}

impl Default for BackendReportConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            post_key_secret: "CD-API-POST-Key".to_string(),
            container: "cd-csv-files".to_string(),
            folder: "CD_Backend_API".to_string(),
            file: "CustomDecksData_Backend.csv".to_string(),
        }
    }
}

/// Weather open-data platform dataset download
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnmiConfig {
    pub base_url: String,
    pub dataset: String,
    pub version: String,
    pub api_key_secret: String,
    pub container: String,
    pub folder: String,
    /// Flattened daily table, stored next to the raw file
    pub csv_file: String,
    /// Position of the reported station on the `station` axis
    pub station_index: usize,
    pub station_label: String,
}

impl Default for KnmiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.dataplatform.knmi.nl/open-data/v1".to_string(),
            dataset: "etmaalgegevensKNMIstations".to_string(),
            version: "1".to_string(),
            api_key_secret: "KNMI-API-Key".to_string(),
            container: "knmi-nc-files".to_string(),
            folder: "KNMI - Meteo data - daily".to_string(),
            csv_file: "KNMI_Data_Daily.csv".to_string(),
            station_index: 18,
            station_label: "260".to_string(),
        }
    }
}

/// Web-analytics report and token broker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub api_url: String,
    pub property_id_secret: String,
    pub service_account_secret: String,
    pub scope: String,
    pub start_date: String,
    pub end_date: String,
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
    pub container: String,
    pub folder: String,
    pub file: String,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            api_url: "https://analyticsdata.googleapis.com".to_string(),
            property_id_secret: "GA-PropertyID".to_string(),
            service_account_secret: "GA-JSON".to_string(),
            scope: "https://www.googleapis.com/auth/analytics.readonly".to_string(),
            start_date: "2023-06-01".to_string(),
            end_date: "yesterday".to_string(),
            dimensions: vec!["date".to_string()],
            metrics: [
                "activeUsers",
                "newUsers",
                "firstTimePurchaserRate",
                "firstTimePurchasersPerNewUser",
                "ecommercePurchases",
                "userEngagementDuration",
                "totalRevenue",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            container: "ga-csv-files".to_string(),
            folder: "GA_API".to_string(),
            file: "GA_Webstore_Data.csv".to_string(),
        }
    }
}

impl AnalyticsConfig {
    pub fn run_report_url(&self, property_id: &str) -> String {
        format!(
            "{}/v1beta/properties/{}:runReport",
            self.api_url.trim_end_matches('/'),
            property_id
        )
    }
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config(Platform::detect())
    }

    /// Load configuration for a specific platform (useful for testing)
    pub fn load_for_platform(platform: Platform) -> Result<Self> {
        sources::load_config(platform)
    }

    /// Load from an explicit file path (CLI `--config`), then apply env overrides.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Like [`RuntimeConfig::load`] but an unreadable default file falls back
    /// to platform defaults.
    pub fn load_or_default() -> Result<Self> {
        sources::load_or_default(Platform::detect())
    }

    pub fn from_platform_defaults(platform: Platform) -> Self {
        platform_defaults(platform)
    }

    /// Merge another config into this one (used for TOML layering).
    pub fn merge(&mut self, other: RuntimeConfig) {
        self.server = other.server;
        self.http = other.http;
        self.storage = other.storage;
        self.secrets = other.secrets;
        self.instagram = other.instagram;
        self.backend_report = other.backend_report;
        self.knmi = other.knmi;
        self.analytics = other.analytics;
    }

    /// Apply environment overrides from a custom source.
    pub fn apply_env_overrides_from<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_env_overrides(self, env)
    }

    /// Build a configuration for the given platform using inline config content
    /// plus overrides supplied by an `EnvSource`.
    pub fn load_for_platform_with_env<E: EnvSource>(
        platform: Platform,
        inline_config: Option<&str>,
        env: &E,
    ) -> Result<Self> {
        let mut config = RuntimeConfig::from_platform_defaults(platform);

        if let Some(inline) = inline_config {
            let file_config: RuntimeConfig =
                toml::from_str(inline).context("Failed to parse inline config content")?;
            config.merge(file_config);
        }

        config.apply_env_overrides_from(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

fn platform_defaults(platform: Platform) -> RuntimeConfig {
    let defaults = platform.defaults();

    let storage = match defaults.storage_backend {
        StorageBackend::Fs => StorageConfig {
            backend: StorageBackend::Fs,
            fs: Some(FsConfig::default()),
            azblob: None,
        },
        StorageBackend::Azblob => StorageConfig {
            backend: StorageBackend::Azblob,
            fs: None,
            azblob: Some(AzblobConfig::default()),
        },
        StorageBackend::Memory => StorageConfig {
            backend: StorageBackend::Memory,
            fs: None,
            azblob: None,
        },
    };

    let secrets = match defaults.secret_backend {
        SecretBackend::Env => SecretsConfig::default(),
        SecretBackend::KeyVault => SecretsConfig {
            backend: SecretBackend::KeyVault,
            keyvault: Some(KeyVaultConfig::default()),
        },
    };

    RuntimeConfig {
        server: ServerConfig {
            listen_addr: defaults.listen_addr.to_string(),
            log_format: defaults.log_format,
            ..ServerConfig::default()
        },
        http: HttpConfig::default(),
        storage,
        secrets,
        instagram: InstagramConfig::default(),
        backend_report: BackendReportConfig::default(),
        knmi: KnmiConfig::default(),
        analytics: AnalyticsConfig::default(),
    }
}
