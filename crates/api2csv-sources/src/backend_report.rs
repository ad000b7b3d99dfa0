use crate::error::{Result, SourceError};
use crate::http::HttpClient;
use tracing::info;

/// Header carrying the report's post key
pub const POST_KEY_HEADER: &str = "viewcsv";

/// POST to the CMS report endpoint and return the raw report text.
pub async fn fetch_backend_report(http: &dyn HttpClient, url: &str, post_key: &str) -> Result<String> {
    if url.is_empty() {
        return Err(SourceError::shape("backend report URL is not configured"));
    }
    let response = http
        .post(
            url,
            vec![(POST_KEY_HEADER.to_string(), post_key.to_string())],
            Vec::new(),
        )
        .await?
        .error_for_status(url)?;
    let text = response.text(url)?;
    info!(bytes = text.len(), "Fetched backend report");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedHttp;

    #[tokio::test]
    async fn test_sends_post_key_header() {
        let http = ScriptedHttp::default().on(
            "https://cms.example/report.php",
            200,
            "\"Datum\";\"Order\"\n01-02-2024 10:00:00;7\n",
        );
        let text = fetch_backend_report(&http, "https://cms.example/report.php", "k3y")
            .await
            .unwrap();
        assert!(text.starts_with("\"Datum\""));

        let request = &http.requests()[0];
        assert_eq!(request.method, "POST");
        assert_eq!(request.header("viewcsv"), Some("k3y"));
    }

    #[tokio::test]
    async fn test_unconfigured_url() {
        let http = ScriptedHttp::default();
        assert!(fetch_backend_report(&http, "", "k").await.is_err());
        assert!(http.requests().is_empty());
    }

    #[tokio::test]
    async fn test_status_error() {
        let http = ScriptedHttp::default().on("https://cms.example/r", 403, "denied");
        let err = fetch_backend_report(&http, "https://cms.example/r", "k")
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Status { status: 403, .. }));
    }
}
