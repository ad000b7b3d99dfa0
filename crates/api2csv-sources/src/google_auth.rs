//! Service-account access tokens
//!
//! A signed RS256 assertion is exchanged at the key's `token_uri` for a
//! short-lived bearer token (JWT bearer grant).

use crate::error::{Result, SourceError};
use crate::http::HttpClient;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// The fields of a service-account key file this crate needs
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| SourceError::auth(format!("invalid service account key: {}", e)))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Sign the assertion for `scope`, valid for one hour from `now` (unix secs).
pub fn sign_assertion(key: &ServiceAccountKey, scope: &str, now: i64) -> Result<String> {
    let claims = Claims {
        iss: key.client_email.clone(),
        scope: scope.to_string(),
        aud: key.token_uri.clone(),
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| SourceError::auth(format!("invalid private key: {}", e)))?;
    encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| SourceError::auth(format!("failed to sign assertion: {}", e)))
}

/// Exchange a signed assertion for an access token.
pub async fn exchange_assertion(http: &dyn HttpClient, token_uri: &str, assertion: &str) -> Result<String> {
    let form = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", JWT_BEARER_GRANT)
        .append_pair("assertion", assertion)
        .finish();
    let response = http
        .post(
            token_uri,
            vec![(
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )],
            form.into_bytes(),
        )
        .await?
        .error_for_status(token_uri)
        .map_err(|e| SourceError::auth(e.to_string()))?;
    let token: TokenResponse = response.decode(token_uri)?;
    Ok(token.access_token)
}

/// Mint an access token for `scope` from a service-account key JSON document.
pub async fn fetch_access_token(http: &dyn HttpClient, key_json: &str, scope: &str) -> Result<String> {
    let key = ServiceAccountKey::from_json(key_json)?;
    let assertion = sign_assertion(&key, scope, Utc::now().timestamp())?;
    let token = exchange_assertion(http, &key.token_uri, &assertion).await?;
    debug!(account = %key.client_email, len = token.len(), "Obtained service account token");
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedHttp;

    #[test]
    fn test_key_defaults_token_uri() {
        let key = ServiceAccountKey::from_json(
            r#"{"type":"service_account","client_email":"svc@proj.iam.example","private_key":"pem"}"#,
        )
        .unwrap();
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
        assert!(!format!("{:?}", key).contains("pem"));
    }

    #[test]
    fn test_malformed_key() {
        assert!(matches!(
            ServiceAccountKey::from_json("{}"),
            Err(SourceError::Auth(_))
        ));
    }

    #[test]
    fn test_sign_rejects_bad_pem() {
        let key = ServiceAccountKey {
            client_email: "svc@proj".to_string(),
            private_key: "not a pem".to_string(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
        };
        assert!(matches!(
            sign_assertion(&key, "scope", 0),
            Err(SourceError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_exchange_assertion() {
        let http = ScriptedHttp::default().on(
            "https://oauth.example/token",
            200,
            r#"{"access_token":"ya29.token","expires_in":3599,"token_type":"Bearer"}"#,
        );
        let token = exchange_assertion(&http, "https://oauth.example/token", "signed.jwt")
            .await
            .unwrap();
        assert_eq!(token, "ya29.token");

        let body = String::from_utf8(http.requests()[0].body.clone().unwrap()).unwrap();
        assert!(body.contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer"));
        assert!(body.contains("assertion=signed.jwt"));
    }

    #[tokio::test]
    async fn test_exchange_rejected() {
        let http = ScriptedHttp::default().on(
            "https://oauth.example/token",
            400,
            r#"{"error":"invalid_grant"}"#,
        );
        let err = exchange_assertion(&http, "https://oauth.example/token", "bad")
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Auth(ref m) if m.contains("invalid_grant")));
    }
}
