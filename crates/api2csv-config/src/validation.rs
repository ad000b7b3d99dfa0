// Configuration validation
//
// Validates that required fields are present and values are sensible

use crate::*;
use anyhow::{anyhow, bail, Result};
use chrono::NaiveDate;
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_server_config(&config.server)?;
    validate_http_config(&config.http)?;
    validate_storage_config(&config.storage)?;
    validate_secrets_config(&config.secrets)?;
    validate_instagram_config(&config.instagram)?;
    validate_analytics_config(&config.analytics)?;

    if config.backend_report.url.is_empty() {
        warn!("backend_report.url is not set; the backend report job will fail");
    }

    Ok(())
}

fn validate_server_config(config: &ServerConfig) -> Result<()> {
    if config.listen_addr.is_empty() {
        bail!("server.listen_addr must not be empty");
    }

    // Basic validation that it looks like an address
    if !config.listen_addr.contains(':') {
        bail!("server.listen_addr must be in format 'host:port'");
    }

    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<()> {
    if config.timeout_secs == 0 {
        bail!("http.timeout_secs must be greater than 0");
    }

    if config.timeout_secs > 600 {
        warn!(
            timeout_secs = config.timeout_secs,
            "http.timeout_secs is very large; the functions host may time out first"
        );
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<()> {
    match config.backend {
        StorageBackend::Fs => {
            let fs = config
                .fs
                .as_ref()
                .ok_or_else(|| anyhow!("fs storage backend requires 'fs' configuration"))?;

            if fs.path.is_empty() {
                bail!("storage.fs.path must not be empty");
            }
        }
        StorageBackend::Azblob => {
            let azblob = config.azblob.as_ref().ok_or_else(|| {
                anyhow!("azblob storage backend requires 'azblob' configuration")
            })?;

            if azblob.account_name.is_empty() {
                bail!("storage.azblob.account_name is required for azblob backend");
            }

            if azblob.account_key_secret.is_empty() {
                bail!("storage.azblob.account_key_secret is required for azblob backend");
            }
        }
        StorageBackend::Memory => {
            warn!("memory storage backend selected; artifacts are lost on exit");
        }
    }

    Ok(())
}

fn validate_secrets_config(config: &SecretsConfig) -> Result<()> {
    if config.backend == SecretBackend::KeyVault {
        let kv = config
            .keyvault
            .as_ref()
            .ok_or_else(|| anyhow!("keyvault secret backend requires 'keyvault' configuration"))?;

        if kv.vault_url.is_empty() {
            bail!("secrets.keyvault.vault_url must not be empty");
        }

        // Credentials usually arrive at invocation time through the host env
        if kv.tenant_id.is_empty() || kv.client_id.is_empty() || kv.client_secret.is_empty() {
            warn!("key vault service principal is incomplete (AR_TENANT_ID, AR_CLIENT_ID, AR_APP_SECRET)");
        }
    }

    Ok(())
}

fn validate_instagram_config(config: &InstagramConfig) -> Result<()> {
    if config.window_days == 0 {
        bail!("instagram.window_days must be greater than 0");
    }

    if config.max_pages == Some(0) {
        bail!("instagram.max_pages must be greater than 0 when set");
    }

    for metric in &config.breakdown_metrics {
        if !config.aggregate_metrics.contains(metric) {
            bail!(
                "instagram.breakdown_metrics entry '{}' is not an aggregate metric",
                metric
            );
        }
    }

    for metric in &config.unbounded_metrics {
        if !config.per_day_metrics.contains(metric) {
            bail!(
                "instagram.unbounded_metrics entry '{}' is not a per-day metric",
                metric
            );
        }
    }

    // Required columns must be produced by a non-breakdown aggregate metric
    for column in &config.required_columns {
        if !config.aggregate_metrics.contains(column) || config.is_breakdown(column) {
            bail!(
                "instagram.required_columns entry '{}' must name a non-breakdown aggregate metric",
                column
            );
        }
    }

    if config.account_id.is_empty() {
        warn!("instagram.account_id is not set (IG_BUSINESS_ACCOUNT_ID)");
    }

    Ok(())
}

fn validate_analytics_config(config: &AnalyticsConfig) -> Result<()> {
    NaiveDate::parse_from_str(&config.start_date, "%Y-%m-%d").map_err(|e| {
        anyhow!(
            "analytics.start_date '{}' must be YYYY-MM-DD: {}",
            config.start_date,
            e
        )
    })?;

    if config.metrics.is_empty() {
        bail!("analytics.metrics must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_storage_config() {
        let azblob = StorageConfig {
            backend: StorageBackend::Azblob,
            fs: None,
            azblob: Some(AzblobConfig::default()),
        };
        assert!(validate_storage_config(&azblob).is_ok());

        let missing = StorageConfig {
            backend: StorageBackend::Azblob,
            fs: None,
            azblob: None,
        };
        assert!(validate_storage_config(&missing).is_err());

        let empty_path = StorageConfig {
            backend: StorageBackend::Fs,
            fs: Some(FsConfig {
                path: String::new(),
            }),
            azblob: None,
        };
        assert!(validate_storage_config(&empty_path).is_err());
    }

    #[test]
    fn test_validate_instagram_config() {
        assert!(validate_instagram_config(&InstagramConfig::default()).is_ok());

        let zero_cap = InstagramConfig {
            max_pages: Some(0),
            ..Default::default()
        };
        assert!(validate_instagram_config(&zero_cap).is_err());

        let breakdown_required = InstagramConfig {
            required_columns: vec!["follows_and_unfollows".to_string()],
            ..Default::default()
        };
        assert!(validate_instagram_config(&breakdown_required).is_err());

        let stray_breakdown = InstagramConfig {
            breakdown_metrics: vec!["reach".to_string()],
            ..Default::default()
        };
        assert!(validate_instagram_config(&stray_breakdown).is_err());
    }

    #[test]
    fn test_validate_secrets_config() {
        let kv_missing = SecretsConfig {
            backend: SecretBackend::KeyVault,
            keyvault: None,
        };
        assert!(validate_secrets_config(&kv_missing).is_err());
        assert!(validate_secrets_config(&SecretsConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_analytics_start_date() {
        let bad = AnalyticsConfig {
            start_date: "01-06-2023".to_string(),
            ..Default::default()
        };
        assert!(validate_analytics_config(&bad).is_err());
        assert!(validate_analytics_config(&AnalyticsConfig::default()).is_ok());
    }
}
