use crate::error::Result;
use crate::http::HttpClient;
use api2csv_core::analytics::{RunReportRequest, RunReportResponse};
use tracing::info;

/// POST a `runReport` request with a bearer token.
pub async fn run_report(
    http: &dyn HttpClient,
    url: &str,
    access_token: &str,
    request: &RunReportRequest,
) -> Result<RunReportResponse> {
    let body = serde_json::to_vec(request).map_err(|e| crate::error::SourceError::Decode {
        url: crate::http::redact_url(url),
        message: format!("failed to encode request: {}", e),
    })?;
    let report: RunReportResponse = http
        .post(
            url,
            vec![
                ("Authorization".to_string(), format!("Bearer {}", access_token)),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body,
        )
        .await?
        .error_for_status(url)?
        .decode(url)?;
    metrics::counter!("api2csv.fetch.pages").increment(1);
    info!(rows = report.rows.len(), "Fetched analytics report");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedHttp;

    const URL: &str = "https://analytics.example/v1beta/properties/123:runReport";

    #[tokio::test]
    async fn test_run_report() {
        let http = ScriptedHttp::default().on(
            URL,
            200,
            r#"{"dimensionHeaders":[{"name":"date"}],
                "metricHeaders":[{"name":"activeUsers","type":"TYPE_INTEGER"}],
                "rows":[{"dimensionValues":[{"value":"20240601"}],"metricValues":[{"value":"12"}]}],
                "rowCount":1}"#,
        );
        let request = RunReportRequest::new(&["date"], &["activeUsers"], "2024-06-01", "yesterday");
        let report = run_report(&http, URL, "tok", &request).await.unwrap();
        assert_eq!(report.rows.len(), 1);

        let sent = &http.requests()[0];
        assert_eq!(sent.header("Authorization"), Some("Bearer tok"));
        let body: serde_json::Value = serde_json::from_slice(sent.body.as_ref().unwrap()).unwrap();
        assert_eq!(body["dateRanges"][0]["endDate"], "yesterday");
        assert_eq!(body["metrics"][0]["name"], "activeUsers");
    }

    #[tokio::test]
    async fn test_run_report_status() {
        let http = ScriptedHttp::default().on(URL, 401, "unauthenticated");
        let request = RunReportRequest::new(&["date"], &["activeUsers"], "2024-06-01", "yesterday");
        assert!(run_report(&http, URL, "tok", &request).await.is_err());
    }
}
