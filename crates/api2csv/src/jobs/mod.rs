// Ingestion jobs
//
// Every job is a linear fetch -> reshape -> upload run against a JobContext
// built for that invocation alone. Jobs return anyhow errors; the HTTP layer
// maps well-known causes (missing object, upstream failure, bad input) to
// status codes.

use anyhow::{Context, Result};
use api2csv_config::RuntimeConfig;
use api2csv_core::{ObjectPath, Table};
use api2csv_sources::{secret_store_from_config, HttpClient, SecretStore};
use api2csv_storage::{Container, ObjectStore};
use chrono::{NaiveDate, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::Services;

pub mod analytics;
pub mod backend_report;
pub mod insights;
pub mod knmi;
pub mod media;
pub mod merge;
pub mod token;

pub const MISSING_SINCE: &str = "Please pass a date in the query string or in the request body";
pub const INVALID_SINCE: &str = "Invalid date format. Please use YYYY-MM-DD.";

/// Caller supplied unusable input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidInput(pub String);

impl fmt::Display for InvalidInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvalidInput {}

/// Parse a `since` value (`YYYY-MM-DD`).
pub fn parse_since(raw: Option<&str>) -> std::result::Result<NaiveDate, InvalidInput> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| InvalidInput(MISSING_SINCE.to_string()))?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| InvalidInput(INVALID_SINCE.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum JobName {
    Insights,
    Merge,
    Media,
    BackendReport,
    Knmi,
    Analytics,
    Token,
}

impl JobName {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobName::Insights => "insights",
            JobName::Merge => "merge",
            JobName::Media => "media",
            JobName::BackendReport => "backend_report",
            JobName::Knmi => "knmi",
            JobName::Analytics => "analytics",
            JobName::Token => "token",
        }
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a successful job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub message: String,
    pub rows: usize,
}

impl JobReport {
    pub fn new(message: impl Into<String>, rows: usize) -> Self {
        Self {
            message: message.into(),
            rows,
        }
    }

    /// `{file} was uploaded to {account}/{container}/{folder}`
    pub fn uploaded(container: &Container, path: &ObjectPath, rows: usize) -> Self {
        Self::new(
            format!(
                "{} was uploaded to {}/{}/{}",
                path.file,
                container.account(),
                container.name(),
                path.folder
            ),
            rows,
        )
    }
}

/// Everything one invocation needs: configuration, HTTP, secrets and storage.
pub struct JobContext {
    config: Arc<RuntimeConfig>,
    http: Arc<dyn HttpClient>,
    secrets: Arc<dyn SecretStore>,
    store: ObjectStore,
    today: NaiveDate,
}

impl JobContext {
    pub fn new(services: &Services) -> Result<Self> {
        let secrets = match &services.secrets {
            Some(fixed) => fixed.clone(),
            None => secret_store_from_config(&services.config.secrets, services.http.clone())
                .context("Failed to open secret store")?,
        };
        Ok(Self {
            config: services.config.clone(),
            http: services.http.clone(),
            secrets,
            store: services.store.clone(),
            today: Utc::now().date_naive(),
        })
    }

    /// Pin "today" (UTC) for dated file names.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn http(&self) -> &Arc<dyn HttpClient> {
        &self.http
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub async fn secret(&self, name: &str) -> Result<String> {
        let value = self
            .secrets
            .get_secret(name)
            .await
            .with_context(|| format!("Failed to resolve secret '{}'", name))?;
        debug!(secret = name, len = value.len(), "Secret resolved");
        Ok(value)
    }

    /// Open a container, resolving the storage account key if the backend needs one.
    pub async fn container(&self, name: &str) -> Result<Container> {
        let account_key = match self.store.account_key_secret() {
            Some(secret) => Some(self.secret(secret).await?),
            None => None,
        };
        let container = self
            .store
            .container(name, account_key.as_deref())
            .with_context(|| format!("Failed to open container '{}'", name))?;
        Ok(container)
    }

    pub async fn upload_table(&self, container: &Container, path: &ObjectPath, table: &Table) -> Result<usize> {
        let bytes = container
            .write_table(path, table)
            .await
            .with_context(|| format!("Failed to upload {}", container.uri(path)))?;
        metrics::counter!("api2csv.upload.objects").increment(1);
        info!(
            object = %container.uri(path),
            rows = table.len(),
            bytes,
            "Uploaded table"
        );
        Ok(bytes)
    }

    pub async fn upload_bytes(&self, container: &Container, path: &ObjectPath, data: Vec<u8>) -> Result<()> {
        let len = data.len();
        container
            .write(path, data)
            .await
            .with_context(|| format!("Failed to upload {}", container.uri(path)))?;
        metrics::counter!("api2csv.upload.objects").increment(1);
        info!(object = %container.uri(path), bytes = len, "Uploaded object");
        Ok(())
    }
}

/// Run one job to completion. `since` is required by the insights job only.
pub async fn run(job: JobName, ctx: &JobContext, since: Option<NaiveDate>) -> Result<JobReport> {
    info!(job = %job, "Running job");
    match job {
        JobName::Insights => {
            let since = since.ok_or_else(|| InvalidInput(MISSING_SINCE.to_string()))?;
            insights::run(ctx, since).await
        }
        JobName::Merge => merge::run(ctx).await,
        JobName::Media => media::run(ctx).await,
        JobName::BackendReport => backend_report::run(ctx).await,
        JobName::Knmi => knmi::run(ctx).await,
        JobName::Analytics => analytics::run(ctx).await,
        JobName::Token => {
            let token = token::run(ctx).await?;
            Ok(JobReport::new(serde_json::json!({ "token": token }).to_string(), 0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_since() {
        assert_eq!(
            parse_since(Some("2024-06-01")),
            Ok(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
        );
        assert_eq!(
            parse_since(None),
            Err(InvalidInput(MISSING_SINCE.to_string()))
        );
        assert_eq!(
            parse_since(Some("")),
            Err(InvalidInput(MISSING_SINCE.to_string()))
        );
        assert_eq!(
            parse_since(Some("01-06-2024")),
            Err(InvalidInput(INVALID_SINCE.to_string()))
        );
        assert_eq!(
            parse_since(Some("2024-13-01")),
            Err(InvalidInput(INVALID_SINCE.to_string()))
        );
    }

    #[test]
    fn test_job_names() {
        assert_eq!(JobName::BackendReport.to_string(), "backend_report");
        assert_eq!(JobName::Insights.as_str(), "insights");
    }
}
