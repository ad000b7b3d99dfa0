//! Weather open-data platform client
//!
//! Three calls: list the newest file of a dataset version, ask for its
//! temporary download URL, then download the bytes.

use crate::error::{Result, SourceError};
use crate::http::{with_query, HttpClient};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct FileListing {
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    files: Vec<ListedFile>,
}

#[derive(Debug, Deserialize)]
struct ListedFile {
    filename: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadUrl {
    temporary_download_url: String,
}

/// A downloaded dataset file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

pub struct OpenDataClient {
    http: Arc<dyn HttpClient>,
    base_url: String,
    api_key: String,
}

impl OpenDataClient {
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn files_url(&self, dataset: &str, version: &str) -> String {
        format!(
            "{}/datasets/{}/versions/{}/files",
            self.base_url.trim_end_matches('/'),
            dataset,
            version
        )
    }

    fn auth(&self) -> Vec<(String, String)> {
        vec![("Authorization".to_string(), self.api_key.clone())]
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.http
            .get(url, self.auth())
            .await?
            .error_for_status(url)?
            .decode(url)
    }

    /// Name of the most recently created file in the dataset version.
    pub async fn latest_file(&self, dataset: &str, version: &str) -> Result<String> {
        let url = with_query(
            &self.files_url(dataset, version),
            &[("maxKeys", "1"), ("orderBy", "created"), ("sorting", "desc")],
        )?;
        let listing: FileListing = self.get_json(&url).await?;
        if let Some(error) = listing.error {
            return Err(SourceError::shape(format!(
                "unable to retrieve list of files: {}",
                error
            )));
        }
        let file = listing
            .files
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::shape(format!("dataset {} has no files", dataset)))?;
        debug!(dataset, file = %file.filename, "Latest dataset file");
        Ok(file.filename)
    }

    pub async fn download_url(&self, dataset: &str, version: &str, filename: &str) -> Result<String> {
        let url = format!("{}/{}/url", self.files_url(dataset, version), filename);
        let link: DownloadUrl = self.get_json(&url).await?;
        Ok(link.temporary_download_url)
    }

    /// Download the newest file of `dataset`/`version`.
    pub async fn download_latest(&self, dataset: &str, version: &str) -> Result<DatasetFile> {
        let filename = self.latest_file(dataset, version).await?;
        let link = self.download_url(dataset, version, &filename).await?;
        // the temporary URL is pre-signed; it takes no API key
        let response = self.http.get(&link, Vec::new()).await?.error_for_status(&link)?;
        metrics::counter!("api2csv.fetch.pages").increment(1);
        info!(file = %filename, bytes = response.body.len(), "Downloaded dataset file");
        Ok(DatasetFile {
            filename,
            bytes: response.body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedHttp;

    const BASE: &str = "https://data.example/open-data/v1";
    const LIST: &str = "https://data.example/open-data/v1/datasets/daily/versions/1/files?maxKeys=1&orderBy=created&sorting=desc";

    #[tokio::test]
    async fn test_download_latest() {
        let http = Arc::new(
            ScriptedHttp::default()
                .on(
                    LIST,
                    200,
                    r#"{"isTruncated":true,"resultCount":1,"files":[{"filename":"obs_20240601.nc","size":1024}]}"#,
                )
                .on(
                    "https://data.example/open-data/v1/datasets/daily/versions/1/files/obs_20240601.nc/url",
                    200,
                    r#"{"contentType":"application/x-netcdf","temporaryDownloadUrl":"https://blob.example/signed"}"#,
                )
                .on_bytes("https://blob.example/signed", 200, vec![0x89, 0x48, 0x44, 0x46]),
        );

        let client = OpenDataClient::new(http.clone(), BASE, "api-key");
        let file = client.download_latest("daily", "1").await.unwrap();
        assert_eq!(file.filename, "obs_20240601.nc");
        assert_eq!(file.bytes, vec![0x89, 0x48, 0x44, 0x46]);

        let requests = http.requests();
        assert_eq!(requests[0].header("Authorization"), Some("api-key"));
        assert_eq!(requests[1].header("Authorization"), Some("api-key"));
        assert_eq!(requests[2].header("Authorization"), None);
    }

    #[tokio::test]
    async fn test_error_key_is_failure() {
        let http = Arc::new(ScriptedHttp::default().on(
            LIST,
            200,
            r#"{"error":"Dataset not found"}"#,
        ));
        let err = OpenDataClient::new(http, BASE, "k")
            .latest_file("daily", "1")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Dataset not found"));
    }

    #[tokio::test]
    async fn test_empty_listing_is_failure() {
        let http = Arc::new(ScriptedHttp::default().on(LIST, 200, r#"{"files":[]}"#));
        let err = OpenDataClient::new(http, BASE, "k")
            .download_latest("daily", "1")
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Shape(_)));
    }
}
