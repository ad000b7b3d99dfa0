//! Paginated insights fetcher
//!
//! Failures here never abort a job. A page that cannot be fetched or decoded
//! ends the traversal and whatever was collected so far is returned.

use crate::error::Result;
use crate::http::{with_query, HttpClient};
use api2csv_core::insights::{
    aggregate_row, next_cursor, AggregateSeries, AggregateShape, InsightsPage, MetricSeries,
};
use chrono::{Days, NaiveDate};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Inclusive `since`/`until` request window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub since: NaiveDate,
    pub until: NaiveDate,
}

impl DayWindow {
    /// `since` .. `since + days`
    pub fn starting(since: NaiveDate, days: u32) -> Self {
        Self {
            since,
            until: since + Days::new(u64::from(days)),
        }
    }

    pub fn single(day: NaiveDate) -> Self {
        Self {
            since: day,
            until: day,
        }
    }
}

pub struct InsightsFetcher {
    http: Arc<dyn HttpClient>,
    url: String,
    access_token: String,
    max_pages: Option<usize>,
}

impl InsightsFetcher {
    pub fn new(http: Arc<dyn HttpClient>, url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            access_token: access_token.into(),
            max_pages: None,
        }
    }

    /// Stop every traversal after `max_pages` pages.
    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    fn params(&self, metric: &str, window: Option<DayWindow>) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("metric", metric.to_string()),
            ("access_token", self.access_token.clone()),
            ("period", "day".to_string()),
        ];
        if let Some(window) = window {
            params.push(("since", window.since.to_string()));
            params.push(("until", window.until.to_string()));
        }
        params
    }

    async fn fetch_page(&self, url: &str) -> Result<InsightsPage> {
        let response = self
            .http
            .get(url, Vec::new())
            .await?
            .error_for_status(url)?;
        let page = response.decode(url)?;
        metrics::counter!("api2csv.fetch.pages").increment(1);
        Ok(page)
    }

    fn capped(&self, pages: usize, metric: &str) -> bool {
        match self.max_pages {
            Some(max) if pages >= max => {
                warn!(metric, pages, "Page cap reached, stopping traversal");
                true
            }
            _ => false,
        }
    }

    /// Fetch a per-day metric.
    ///
    /// With a window the traversal follows `next` until the newest page; without
    /// one it walks back through `previous` until history runs out.
    pub async fn per_day(&self, metric: &str, window: Option<DayWindow>) -> MetricSeries {
        let mut series = MetricSeries::new(metric);
        let since_bound = window.is_some();

        let mut url = match with_query(&self.url, &self.params(metric, window)) {
            Ok(url) => url,
            Err(e) => {
                record_failure(metric, &e);
                return series;
            }
        };

        let mut pages = 0;
        loop {
            let page = match self.fetch_page(&url).await {
                Ok(page) => page,
                Err(e) => {
                    record_failure(metric, &e);
                    break;
                }
            };
            pages += 1;
            let points = series.absorb_page(&page);
            debug!(metric, page = pages, points, "Processed per-day page");

            match next_cursor(&page, since_bound) {
                Some(cursor) if !self.capped(pages, metric) => url = cursor.to_string(),
                _ => break,
            }
        }

        info!(metric, pages, days = series.len(), "Fetched per-day metric");
        series
    }

    /// Fetch an aggregate-total metric starting at the one-day window `day`.
    ///
    /// The first page is labelled `day` and every following page one day
    /// later. A page whose payload lacks the expected keys contributes no row.
    pub async fn aggregate(&self, metric: &str, shape: AggregateShape, day: NaiveDate) -> AggregateSeries {
        let mut series = AggregateSeries::new(metric, shape);

        let mut params = self.params(metric, Some(DayWindow::single(day)));
        if let Some(breakdown) = shape.breakdown() {
            params.push(("breakdown", breakdown.to_string()));
        }
        params.push(("metric_type", "total_value".to_string()));

        let mut url = match with_query(&self.url, &params) {
            Ok(url) => url,
            Err(e) => {
                record_failure(metric, &e);
                return series;
            }
        };

        let mut label = day;
        let mut pages = 0;
        loop {
            if pages > 0 {
                label = label + Days::new(1);
            }
            let page = match self.fetch_page(&url).await {
                Ok(page) => page,
                Err(e) => {
                    record_failure(metric, &e);
                    break;
                }
            };
            pages += 1;

            match aggregate_row(&page, metric, shape, label) {
                Ok(row) => series.rows.push(row),
                Err(e) => warn!(metric, date = %label, error = %e, "No aggregate row for window"),
            }

            match next_cursor(&page, true) {
                Some(cursor) if !self.capped(pages, metric) => url = cursor.to_string(),
                _ => break,
            }
        }

        info!(metric, pages, rows = series.rows.len(), "Fetched aggregate metric");
        series
    }
}

fn record_failure(metric: &str, error: &crate::error::SourceError) {
    metrics::counter!("api2csv.fetch.failures").increment(1);
    warn!(metric, error = %error, "Insights traversal ended early");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedHttp;
    use api2csv_core::insights::{FOLLOWER, NON_FOLLOWER};
    use api2csv_core::Value;

    const BASE: &str = "https://graph.example/v20.0/42/insights";

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn fetcher(http: Arc<ScriptedHttp>) -> InsightsFetcher {
        InsightsFetcher::new(http, BASE, "tok")
    }

    fn first_url(params: &[(&str, &str)]) -> String {
        with_query(BASE, params).unwrap()
    }

    #[tokio::test]
    async fn test_forward_stops_at_first_page_without_next() {
        let start = first_url(&[
            ("metric", "reach"),
            ("access_token", "tok"),
            ("period", "day"),
            ("since", "2024-06-01"),
            ("until", "2024-07-01"),
        ]);
        let http = Arc::new(
            ScriptedHttp::default()
                .on(
                    &start,
                    200,
                    r#"{"data":[{"name":"reach","values":[
                        {"value":10,"end_time":"2024-06-02T07:00:00+0000"},
                        {"value":11,"end_time":"2024-06-03T07:00:00+0000"}]}],
                        "paging":{"previous":"https://graph.example/prev","next":"https://graph.example/p2"}}"#,
                )
                .on(
                    "https://graph.example/p2",
                    200,
                    r#"{"data":[{"name":"reach","values":[
                        {"value":12,"end_time":"2024-06-04T07:00:00+0000"}]}],
                        "paging":{"previous":"https://graph.example/p1"}}"#,
                ),
        );

        let series = fetcher(http.clone())
            .per_day("reach", Some(DayWindow::starting(day(1), 30)))
            .await;

        assert_eq!(series.len(), 3);
        assert_eq!(series.get(day(4)), Some(&Value::Int(12)));
        assert_eq!(http.urls(), vec![start, "https://graph.example/p2".to_string()]);
    }

    #[tokio::test]
    async fn test_backward_walks_previous_until_exhausted() {
        let start = first_url(&[
            ("metric", "follower_count"),
            ("access_token", "tok"),
            ("period", "day"),
        ]);
        let http = Arc::new(
            ScriptedHttp::default()
                .on(
                    &start,
                    200,
                    r#"{"data":[{"name":"follower_count","values":[
                        {"value":5,"end_time":"2024-06-10T07:00:00+0000"}]}],
                        "paging":{"previous":"https://graph.example/b1","next":"https://graph.example/f1"}}"#,
                )
                .on(
                    "https://graph.example/b1",
                    200,
                    r#"{"data":[{"name":"follower_count","values":[
                        {"value":4,"end_time":"2024-06-09T07:00:00+0000"}]}],
                        "paging":{"previous":"https://graph.example/b2"}}"#,
                )
                .on("https://graph.example/b2", 200, r#"{"data":[]}"#),
        );

        let series = fetcher(http.clone()).per_day("follower_count", None).await;

        assert_eq!(series.len(), 2);
        assert_eq!(series.get(day(9)), Some(&Value::Int(4)));
        assert_eq!(http.requests().len(), 3);
        assert!(!http.urls().iter().any(|u| u.contains("f1")));
    }

    #[tokio::test]
    async fn test_failed_page_keeps_partial_series() {
        let start = first_url(&[
            ("metric", "impressions"),
            ("access_token", "tok"),
            ("period", "day"),
            ("since", "2024-06-01"),
            ("until", "2024-07-01"),
        ]);
        let http = Arc::new(
            ScriptedHttp::default()
                .on(
                    &start,
                    200,
                    r#"{"data":[{"name":"impressions","values":[
                        {"value":100,"end_time":"2024-06-02T07:00:00+0000"}]}],
                        "paging":{"next":"https://graph.example/broken"}}"#,
                )
                .on("https://graph.example/broken", 500, "oops"),
        );

        let series = fetcher(http)
            .per_day("impressions", Some(DayWindow::starting(day(1), 30)))
            .await;
        assert_eq!(series.len(), 1);
        assert_eq!(series.get(day(2)), Some(&Value::Int(100)));
    }

    #[tokio::test]
    async fn test_transport_failure_on_first_page_is_empty() {
        let start = first_url(&[
            ("metric", "reach"),
            ("access_token", "tok"),
            ("period", "day"),
        ]);
        let http = Arc::new(ScriptedHttp::default().fail(&start, "connection reset"));
        let series = fetcher(http).per_day("reach", None).await;
        assert!(series.is_empty());
    }

    #[tokio::test]
    async fn test_page_cap_bounds_traversal() {
        let start = first_url(&[
            ("metric", "follower_count"),
            ("access_token", "tok"),
            ("period", "day"),
        ]);
        let looping = r#"{"data":[],"paging":{"previous":"https://graph.example/loop"}}"#;
        let http = Arc::new(
            ScriptedHttp::default()
                .on(&start, 200, looping)
                .on("https://graph.example/loop", 200, looping),
        );

        fetcher(http.clone())
            .with_max_pages(Some(3))
            .per_day("follower_count", None)
            .await;
        assert_eq!(http.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_aggregate_breakdown_defaults_to_zero() {
        let start = first_url(&[
            ("metric", "follows_and_unfollows"),
            ("access_token", "tok"),
            ("period", "day"),
            ("since", "2024-06-01"),
            ("until", "2024-06-01"),
            ("breakdown", "follow_type"),
            ("metric_type", "total_value"),
        ]);
        let http = Arc::new(ScriptedHttp::default().on(
            &start,
            200,
            r#"{"data":[{"name":"follows_and_unfollows","total_value":{"breakdowns":[
                {"dimension_keys":["follow_type"],"results":[
                    {"dimension_values":["FOLLOWER"],"value":7}]}]}}]}"#,
        ));

        let series = fetcher(http)
            .aggregate("follows_and_unfollows", AggregateShape::FollowType, day(1))
            .await;

        assert_eq!(series.rows.len(), 1);
        let row = &series.rows[0];
        assert_eq!(row.date, day(1));
        assert_eq!(
            row.values,
            vec![
                (FOLLOWER.to_string(), Value::Int(7)),
                (NON_FOLLOWER.to_string(), Value::Int(0)),
            ]
        );
    }

    #[tokio::test]
    async fn test_aggregate_labels_advance_per_page() {
        let start = first_url(&[
            ("metric", "profile_views"),
            ("access_token", "tok"),
            ("period", "day"),
            ("since", "2024-06-01"),
            ("until", "2024-06-01"),
            ("metric_type", "total_value"),
        ]);
        let http = Arc::new(
            ScriptedHttp::default()
                .on(
                    &start,
                    200,
                    r#"{"data":[{"total_value":{"value":3}}],"paging":{"next":"https://graph.example/d2"}}"#,
                )
                .on(
                    "https://graph.example/d2",
                    200,
                    r#"{"data":[],"paging":{"next":"https://graph.example/d3"}}"#,
                )
                .on(
                    "https://graph.example/d3",
                    200,
                    r#"{"data":[{"total_value":{"value":5}}]}"#,
                ),
        );

        let series = fetcher(http)
            .aggregate("profile_views", AggregateShape::Total, day(1))
            .await;

        let dates: Vec<NaiveDate> = series.rows.iter().map(|r| r.date).collect();
        // the empty second page yields no row but still consumes a day
        assert_eq!(dates, vec![day(1), day(3)]);
        assert_eq!(
            series.rows[1].values,
            vec![("profile_views".to_string(), Value::Int(5))]
        );
    }

    #[tokio::test]
    async fn test_aggregate_empty_data_yields_no_rows() {
        let start = first_url(&[
            ("metric", "website_clicks"),
            ("access_token", "tok"),
            ("period", "day"),
            ("since", "2024-06-01"),
            ("until", "2024-06-01"),
            ("metric_type", "total_value"),
        ]);
        let http = Arc::new(ScriptedHttp::default().on(&start, 200, r#"{"data":[]}"#));
        let series = fetcher(http)
            .aggregate("website_clicks", AggregateShape::Total, day(1))
            .await;
        assert!(series.rows.is_empty());
    }

    #[test]
    fn test_day_window() {
        let window = DayWindow::starting(day(1), 30);
        assert_eq!(window.until, NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
        assert_eq!(DayWindow::single(day(5)).until, day(5));
    }
}
