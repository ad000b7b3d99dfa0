//! Upstream API clients for api2csv
//!
//! Each module wraps one third-party API behind the [`HttpClient`] seam:
//!
//! - [`insights`]: paginated social insights (per-day and aggregate metrics)
//! - [`media`]: media listing and per-post details
//! - [`backend_report`]: CMS order report download
//! - [`knmi`]: weather open-data dataset download
//! - [`analytics`] and [`google_auth`]: web analytics reports and tokens
//! - [`secrets`]: credential resolution
//!
//! Nothing here touches object storage; jobs in the binary crate combine
//! these clients with `api2csv-storage`.

pub mod analytics;
pub mod backend_report;
mod error;
pub mod google_auth;
pub mod http;
pub mod insights;
pub mod knmi;
pub mod media;
pub mod secrets;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{Result, SourceError};
pub use http::{HttpClient, HttpResponse, ReqwestHttpClient};
pub use insights::{DayWindow, InsightsFetcher};
pub use knmi::{DatasetFile, OpenDataClient};
pub use media::MediaFetcher;
pub use secrets::{secret_store_from_config, EnvSecretStore, KeyVaultSecretStore, SecretStore};
