//! Test doubles: a scripted [`HttpClient`] and a fixed [`SecretStore`].
//!
//! Responses are registered per exact URL. Every request is recorded so tests
//! can assert on method, headers and body. Unregistered URLs answer 404.
//!
//! Compiled for this crate's tests and behind the `testing` feature.

use crate::error::{Result, SourceError};
use crate::http::{HttpClient, HttpResponse};
use crate::secrets::SecretStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

enum Scripted {
    Respond(HttpResponse),
    Fail(String),
}

#[derive(Default)]
pub struct ScriptedHttp {
    routes: HashMap<String, Scripted>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedHttp {
    /// Answer `url` with `status` and a text body.
    pub fn on(self, url: &str, status: u16, body: &str) -> Self {
        self.on_bytes(url, status, body.as_bytes().to_vec())
    }

    pub fn on_bytes(mut self, url: &str, status: u16, body: Vec<u8>) -> Self {
        self.routes.insert(
            url.to_string(),
            Scripted::Respond(HttpResponse {
                status,
                headers: Vec::new(),
                body,
            }),
        );
        self
    }

    /// Fail `url` at the transport level.
    pub fn fail(mut self, url: &str, message: &str) -> Self {
        self.routes
            .insert(url.to_string(), Scripted::Fail(message.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }
}

#[async_trait]
impl HttpClient for ScriptedHttp {
    async fn request(
        &self,
        method: &str,
        url: &str,
        headers: Vec<(String, String)>,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse> {
        if let Ok(mut guard) = self.requests.lock() {
            guard.push(RecordedRequest {
                method: method.to_string(),
                url: url.to_string(),
                headers,
                body,
            });
        }

        match self.routes.get(url) {
            Some(Scripted::Respond(response)) => Ok(response.clone()),
            Some(Scripted::Fail(message)) => Err(SourceError::Transport {
                url: crate::http::redact_url(url),
                message: message.clone(),
            }),
            None => Ok(HttpResponse {
                status: 404,
                headers: Vec::new(),
                body: b"no scripted response".to_vec(),
            }),
        }
    }
}

/// Fixed in-memory secrets
#[derive(Debug, Clone, Default)]
pub struct MapSecretStore {
    secrets: HashMap<String, String>,
}

impl MapSecretStore {
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.secrets.insert(name.to_string(), value.to_string());
        self
    }
}

#[async_trait]
impl SecretStore for MapSecretStore {
    async fn get_secret(&self, name: &str) -> Result<String> {
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| SourceError::secret(name, "not present"))
    }
}
