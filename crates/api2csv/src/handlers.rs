// HTTP request handlers
//
// One route per job. Handlers translate the trigger request into job input,
// build a fresh JobContext and render the job's report as plain text.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use metrics::counter;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::jobs::{self, parse_since, InvalidInput, JobContext, JobName};
use crate::{AppError, AppState};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SinceQuery {
    since: Option<String>,
}

/// `since` from the query string, else from a JSON body.
fn resolve_since(query: &SinceQuery, body: &[u8]) -> Result<NaiveDate, InvalidInput> {
    let from_query = query.since.as_deref().filter(|s| !s.trim().is_empty());
    let from_body = || {
        serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("since").and_then(|s| s.as_str()).map(str::to_string))
    };

    match from_query {
        Some(raw) => parse_since(Some(raw)),
        None => parse_since(from_body().as_deref()),
    }
}

async fn run_job(state: &AppState, job: JobName, since: Option<NaiveDate>) -> Result<Response, AppError> {
    counter!("api2csv.job.requests", "job" => job.as_str()).increment(1);
    let ctx = JobContext::new(&state.services)?;
    let report = jobs::run(job, &ctx, since).await?;
    Ok((StatusCode::OK, report.message).into_response())
}

/// GET|POST /api/insta-insights
pub(crate) async fn insta_insights(
    State(state): State<AppState>,
    Query(query): Query<SinceQuery>,
    body: Bytes,
) -> Result<Response, AppError> {
    let since = resolve_since(&query, &body)?;
    run_job(&state, JobName::Insights, Some(since)).await
}

/// GET|POST /api/insta-merge-files
pub(crate) async fn insta_merge(State(state): State<AppState>) -> Result<Response, AppError> {
    run_job(&state, JobName::Merge, None).await
}

/// GET|POST /api/insta-media
pub(crate) async fn insta_media(State(state): State<AppState>) -> Result<Response, AppError> {
    run_job(&state, JobName::Media, None).await
}

/// GET|POST /api/backend-report
pub(crate) async fn backend_report(State(state): State<AppState>) -> Result<Response, AppError> {
    run_job(&state, JobName::BackendReport, None).await
}

/// GET|POST /api/knmi-report
pub(crate) async fn knmi_report(State(state): State<AppState>) -> Result<Response, AppError> {
    run_job(&state, JobName::Knmi, None).await
}

/// GET|POST /api/analytics-report
pub(crate) async fn analytics_report(State(state): State<AppState>) -> Result<Response, AppError> {
    run_job(&state, JobName::Analytics, None).await
}

/// GET|POST /api/analytics-token - JSON in both outcomes
pub(crate) async fn analytics_token(State(state): State<AppState>) -> Response {
    counter!("api2csv.job.requests", "job" => JobName::Token.as_str()).increment(1);

    let result = match JobContext::new(&state.services) {
        Ok(ctx) => jobs::token::run(&ctx).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(token) => (StatusCode::OK, Json(json!({ "token": token }))).into_response(),
        Err(e) => {
            error!("Token request failed: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("{:#}", e) })),
            )
                .into_response()
        }
    }
}

/// GET /health - Basic health check
pub(crate) async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "healthy"})))
}
