//! HTTP client abstraction
//!
//! Every upstream call goes through [`HttpClient`], so jobs can be exercised
//! against scripted responses. [`ReqwestHttpClient`] is the production
//! implementation.

use crate::error::{Result, SourceError};
use async_trait::async_trait;
use std::time::Duration;

const USER_AGENT: &str = concat!("api2csv/", env!("CARGO_PKG_VERSION"));
const ERROR_BODY_LIMIT: usize = 512;

/// HTTP response from an upstream API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers (name, value pairs)
    pub headers: Vec<(String, String)>,
    /// Response body bytes
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Check if the response status indicates success (2xx)
    pub fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Get the response body as a UTF-8 string
    pub fn body_string(&self) -> std::result::Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.body.clone())
    }

    /// Parse the response body as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// Get a header value by name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Turn a non-2xx response into [`SourceError::Status`].
    pub fn error_for_status(self, url: &str) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let mut body = String::from_utf8_lossy(&self.body).into_owned();
        if body.len() > ERROR_BODY_LIMIT {
            let mut cut = ERROR_BODY_LIMIT;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Err(SourceError::Status {
            url: redact_url(url),
            status: self.status,
            body,
        })
    }

    /// Decode a JSON body, attributing failures to `url`.
    pub fn decode<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.json().map_err(|e| SourceError::Decode {
            url: redact_url(url),
            message: e.to_string(),
        })
    }

    /// Decode a UTF-8 text body, attributing failures to `url`.
    pub fn text(&self, url: &str) -> Result<String> {
        self.body_string().map_err(|e| SourceError::Decode {
            url: redact_url(url),
            message: e.to_string(),
        })
    }
}

/// Strip the query string (and any credentials) from a URL for logging.
pub fn redact_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            let _ = parsed.set_password(None);
            let _ = parsed.set_username("");
            parsed.to_string()
        }
        Err(_) => url.split('?').next().unwrap_or_default().to_string(),
    }
}

/// Append query parameters to a base URL.
pub fn with_query<K, V>(base: &str, params: &[(K, V)]) -> Result<String>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let url = url::Url::parse_with_params(
        base,
        params.iter().map(|(k, v)| (k.as_ref(), v.as_ref())),
    )
    .map_err(|e| SourceError::Transport {
        url: redact_url(base),
        message: format!("invalid URL: {}", e),
    })?;
    Ok(url.into())
}

/// Upstream HTTP client
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request
    ///
    /// # Parameters
    /// - `method`: HTTP method (GET, POST, ...)
    /// - `url`: Full URL to request
    /// - `headers`: Request headers as (name, value) pairs
    /// - `body`: Optional request body bytes
    async fn request(
        &self,
        method: &str,
        url: &str,
        headers: Vec<(String, String)>,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse>;

    /// Convenience method for GET requests
    async fn get(&self, url: &str, headers: Vec<(String, String)>) -> Result<HttpResponse> {
        self.request("GET", url, headers, None).await
    }

    /// Convenience method for POST requests
    async fn post(
        &self,
        url: &str,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> Result<HttpResponse> {
        self.request("POST", url, headers, Some(body)).await
    }
}

/// reqwest-backed client with a request timeout
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SourceError::Transport {
                url: String::new(),
                message: format!("Failed to create reqwest client: {}", e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn request(
        &self,
        method: &str,
        url: &str,
        headers: Vec<(String, String)>,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse> {
        let transport = |message: String| SourceError::Transport {
            url: redact_url(url),
            message,
        };

        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|e| transport(format!("invalid HTTP method: {}", e)))?;
        let mut request_builder = self.client.request(method, url);

        for (name, value) in &headers {
            request_builder = request_builder.header(name, value);
        }

        if let Some(body_bytes) = body {
            request_builder = request_builder.body(body_bytes);
        }

        let response = request_builder
            .send()
            .await
            .map_err(|e| transport(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let response_headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport(format!("failed to read body: {}", e.without_url())))?
            .to_vec();

        Ok(HttpResponse {
            status,
            headers: response_headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &[u8]) -> HttpResponse {
        HttpResponse {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: body.to_vec(),
        }
    }

    #[test]
    fn test_http_response_is_success() {
        assert!(response(200, b"").is_success());
        assert!(response(299, b"").is_success());
        assert!(!response(404, b"").is_success());
    }

    #[test]
    fn test_http_response_header() {
        let r = response(200, b"");
        assert_eq!(r.header("content-type"), Some("application/json"));
        assert!(r.header("Missing").is_none());
    }

    #[test]
    fn test_error_for_status_redacts_token() {
        let err = response(400, br#"{"error":{"message":"Invalid OAuth access token"}}"#)
            .error_for_status("https://graph.example/v20.0/1/insights?access_token=SECRET")
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("HTTP 400"));
        assert!(text.contains("Invalid OAuth"));
        assert!(!text.contains("SECRET"));
    }

    #[test]
    fn test_decode_reports_url() {
        let err = response(200, b"not json")
            .decode::<serde_json::Value>("https://api.example/x?key=1")
            .unwrap_err();
        assert!(matches!(err, SourceError::Decode { ref url, .. } if url == "https://api.example/x"));
    }

    #[test]
    fn test_with_query_encodes() {
        let url = with_query(
            "https://graph.example/v20.0/1/insights",
            &[("metric", "reach"), ("since", "2024-06-01")],
        )
        .unwrap();
        assert_eq!(
            url,
            "https://graph.example/v20.0/1/insights?metric=reach&since=2024-06-01"
        );
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("https://user:pw@host.example/path?access_token=abc#frag"),
            "https://host.example/path"
        );
    }

    #[test]
    fn test_create_client() {
        assert!(ReqwestHttpClient::new(Duration::from_secs(30)).is_ok());
    }
}
