//! Route-level behaviour: status codes and bodies as seen by the trigger.

use api2csv::{router, Services};
use api2csv_config::{Platform, RuntimeConfig};
use api2csv_core::ObjectPath;
use api2csv_sources::testing::{MapSecretStore, ScriptedHttp};
use api2csv_storage::ObjectStore;
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use std::sync::Arc;
use tower::ServiceExt;

fn app_with(store: ObjectStore, secrets: MapSecretStore) -> Router {
    let config = RuntimeConfig::from_platform_defaults(Platform::Server);
    let services = Services::new(config, Arc::new(ScriptedHttp::default()), store)
        .with_secret_store(Arc::new(secrets));
    router(services)
}

fn app() -> Router {
    app_with(ObjectStore::memory().unwrap(), MapSecretStore::default())
}

async fn call(app: Router, method: Method, uri: &str, body: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn health_reports_healthy() {
    let (status, body) = call(app(), Method::GET, "/health", "").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn insights_without_since_is_bad_request() {
    let (status, body) = call(app(), Method::GET, "/api/insta-insights", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Please pass a date in the query string or in the request body");
}

#[tokio::test]
async fn insights_with_malformed_since_is_bad_request() {
    let (status, body) = call(
        app(),
        Method::GET,
        "/api/insta-insights?since=01-06-2024",
        "",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Invalid date format. Please use YYYY-MM-DD.");

    let (status, body) = call(
        app(),
        Method::POST,
        "/api/insta-insights",
        r#"{"since":"2024/06/01"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Invalid date format. Please use YYYY-MM-DD.");
}

#[tokio::test]
async fn merge_without_daily_file_is_not_found() {
    let (status, body) = call(app(), Method::POST, "/api/insta-merge-files", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("is not available"));
}

#[tokio::test]
async fn missing_secret_is_server_error() {
    let (status, body) = call(app(), Method::GET, "/api/knmi-report", "").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("KNMI-API-Key"));
}

#[tokio::test]
async fn upstream_failure_is_bad_gateway() {
    let secrets = MapSecretStore::default().with("KNMI-API-Key", "k");
    let (status, _) = call(
        app_with(ObjectStore::memory().unwrap(), secrets),
        Method::GET,
        "/api/knmi-report",
        "",
    )
    .await;
    // unscripted upstream requests answer 404
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn token_failure_is_json() {
    let secrets = MapSecretStore::default().with("GA-JSON", "not a key");
    let (status, body) = call(
        app_with(ObjectStore::memory().unwrap(), secrets),
        Method::GET,
        "/api/analytics-token",
        "",
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn merge_route_reports_plain_text() {
    let store = ObjectStore::memory().unwrap();
    let container = store.container("insta-csv-files", None).unwrap();
    let today = chrono::Utc::now().date_naive();
    let daily = ObjectPath::new(
        "Insta_insights",
        api2csv_core::dated_file_name("Insta_insights", today),
    );
    container
        .write(
            &daily,
            b"date;accounts_engaged;profile_views;website_clicks\n2024-06-01;1;2;3\n".to_vec(),
        )
        .await
        .unwrap();

    let (status, body) = call(
        app_with(store, MapSecretStore::default()),
        Method::GET,
        "/api/insta-merge-files",
        "",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        format!(
            "Files Insta_insights.csv and {} were merged and archived",
            daily.file
        )
    );
    assert!(!container.exists(&daily).await.unwrap());
}
