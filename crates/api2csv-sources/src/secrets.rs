//! Secret resolution
//!
//! Jobs resolve every credential at invocation time through [`SecretStore`].
//! Secret values are never logged; only their names and lengths are.

use crate::error::{Result, SourceError};
use crate::http::HttpClient;
use api2csv_config::{KeyVaultConfig, SecretBackend, SecretsConfig};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use tracing::debug;

const KEYVAULT_SCOPE: &str = "https://vault.azure.net/.default";
pub const SECRET_ENV_PREFIX: &str = "API2CSV_SECRET_";

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_secret(&self, name: &str) -> Result<String>;
}

/// Build the configured secret store.
pub fn secret_store_from_config(
    config: &SecretsConfig,
    http: Arc<dyn HttpClient>,
) -> Result<Arc<dyn SecretStore>> {
    match config.backend {
        SecretBackend::Env => Ok(Arc::new(EnvSecretStore)),
        SecretBackend::KeyVault => {
            let kv = config.keyvault.clone().ok_or_else(|| {
                SourceError::secret("*", "keyvault backend selected without configuration")
            })?;
            Ok(Arc::new(KeyVaultSecretStore::new(kv, http)))
        }
    }
}

/// `dls-databrein-d1-v2` → `API2CSV_SECRET_DLS_DATABREIN_D1_V2`
pub fn env_secret_var(name: &str) -> String {
    let normalized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{}{}", SECRET_ENV_PREFIX, normalized)
}

/// Secrets from process environment variables
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecretStore;

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get_secret(&self, name: &str) -> Result<String> {
        let var = env_secret_var(name);
        let value = std::env::var(&var)
            .map_err(|_| SourceError::secret(name, format!("environment variable {} is not set", var)))?;
        debug!(secret = name, len = value.len(), "Resolved secret from environment");
        Ok(value)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct SecretBundle {
    value: String,
}

/// Key vault secrets, authenticated with an AAD client-credentials grant.
/// The bearer token is cached for the lifetime of the store.
pub struct KeyVaultSecretStore {
    config: KeyVaultConfig,
    http: Arc<dyn HttpClient>,
    token: Mutex<Option<String>>,
}

impl KeyVaultSecretStore {
    pub fn new(config: KeyVaultConfig, http: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http,
            token: Mutex::new(None),
        }
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.config.authority_host.trim_end_matches('/'),
            self.config.tenant_id
        )
    }

    fn secret_url(&self, name: &str) -> String {
        format!(
            "{}/secrets/{}?api-version={}",
            self.config.vault_url.trim_end_matches('/'),
            name,
            self.config.api_version
        )
    }

    fn cached_token(&self) -> Option<String> {
        self.token.lock().ok().and_then(|guard| guard.clone())
    }

    async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        if self.config.tenant_id.is_empty()
            || self.config.client_id.is_empty()
            || self.config.client_secret.is_empty()
        {
            return Err(SourceError::auth(
                "key vault service principal is incomplete (tenant, client id, client secret)",
            ));
        }

        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "client_credentials")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("client_secret", &self.config.client_secret)
            .append_pair("scope", KEYVAULT_SCOPE)
            .finish();

        let url = self.token_url();
        let response = self
            .http
            .post(
                &url,
                vec![(
                    "Content-Type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                )],
                form.into_bytes(),
            )
            .await?
            .error_for_status(&url)
            .map_err(|e| SourceError::auth(format!("key vault token request failed: {}", e)))?;
        let token: TokenResponse = response.decode(&url)?;

        debug!(len = token.access_token.len(), "Obtained key vault access token");
        if let Ok(mut guard) = self.token.lock() {
            *guard = Some(token.access_token.clone());
        }
        Ok(token.access_token)
    }
}

#[async_trait]
impl SecretStore for KeyVaultSecretStore {
    async fn get_secret(&self, name: &str) -> Result<String> {
        let token = self.access_token().await?;
        let url = self.secret_url(name);
        let response = self
            .http
            .get(
                &url,
                vec![("Authorization".to_string(), format!("Bearer {}", token))],
            )
            .await?
            .error_for_status(&url)
            .map_err(|e| SourceError::secret(name, e.to_string()))?;
        let bundle: SecretBundle = response
            .decode(&url)
            .map_err(|e| SourceError::secret(name, e.to_string()))?;

        debug!(secret = name, len = bundle.value.len(), "Resolved secret from key vault");
        Ok(bundle.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MapSecretStore, ScriptedHttp};

    fn kv_config() -> KeyVaultConfig {
        KeyVaultConfig {
            vault_url: "https://vault.example/".to_string(),
            tenant_id: "tenant".to_string(),
            client_id: "client".to_string(),
            client_secret: "shh".to_string(),
            authority_host: "https://login.example".to_string(),
            api_version: "7.4".to_string(),
        }
    }

    #[test]
    fn test_env_secret_var() {
        assert_eq!(
            env_secret_var("dls-databrein-d1-v2"),
            "API2CSV_SECRET_DLS_DATABREIN_D1_V2"
        );
        assert_eq!(env_secret_var("GA-JSON"), "API2CSV_SECRET_GA_JSON");
    }

    #[tokio::test]
    async fn test_map_store() {
        let store = MapSecretStore::default().with("Meta-Page-Token", "tok");
        assert_eq!(store.get_secret("Meta-Page-Token").await.unwrap(), "tok");
        assert!(matches!(
            store.get_secret("missing").await,
            Err(SourceError::Secret { .. })
        ));
    }

    #[tokio::test]
    async fn test_keyvault_token_then_secret() {
        let http = Arc::new(
            ScriptedHttp::default()
                .on(
                    "https://login.example/tenant/oauth2/v2.0/token",
                    200,
                    r#"{"access_token":"aad-token","expires_in":3599}"#,
                )
                .on(
                    "https://vault.example/secrets/KNMI-API-Key?api-version=7.4",
                    200,
                    r#"{"value":"knmi-key","id":"x"}"#,
                )
                .on(
                    "https://vault.example/secrets/CD-API-POST-Key?api-version=7.4",
                    200,
                    r#"{"value":"post-key"}"#,
                ),
        );
        let store = KeyVaultSecretStore::new(kv_config(), http.clone());

        assert_eq!(store.get_secret("KNMI-API-Key").await.unwrap(), "knmi-key");
        assert_eq!(store.get_secret("CD-API-POST-Key").await.unwrap(), "post-key");

        let requests = http.requests();
        // token requested once, then cached
        assert_eq!(
            requests
                .iter()
                .filter(|r| r.url.contains("oauth2"))
                .count(),
            1
        );
        let token_request = &requests[0];
        assert_eq!(token_request.method, "POST");
        let form = String::from_utf8(token_request.body.clone().unwrap()).unwrap();
        assert!(form.contains("grant_type=client_credentials"));
        assert!(form.contains("scope=https%3A%2F%2Fvault.azure.net%2F.default"));
        assert_eq!(
            requests[1].header("Authorization"),
            Some("Bearer aad-token")
        );
    }

    #[tokio::test]
    async fn test_keyvault_missing_secret() {
        let http = Arc::new(
            ScriptedHttp::default()
                .on(
                    "https://login.example/tenant/oauth2/v2.0/token",
                    200,
                    r#"{"access_token":"aad-token"}"#,
                )
                .on(
                    "https://vault.example/secrets/nope?api-version=7.4",
                    404,
                    r#"{"error":{"code":"SecretNotFound"}}"#,
                ),
        );
        let store = KeyVaultSecretStore::new(kv_config(), http);
        let err = store.get_secret("nope").await.unwrap_err();
        assert!(matches!(err, SourceError::Secret { ref name, .. } if name == "nope"));
    }

    #[tokio::test]
    async fn test_keyvault_requires_principal() {
        let config = KeyVaultConfig {
            client_secret: String::new(),
            ..kv_config()
        };
        let store = KeyVaultSecretStore::new(config, Arc::new(ScriptedHttp::default()));
        assert!(matches!(
            store.get_secret("x").await,
            Err(SourceError::Auth(_))
        ));
    }
}
