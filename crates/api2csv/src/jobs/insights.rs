use anyhow::Result;
use api2csv_core::insights::{assemble_insights, AggregateShape};
use api2csv_core::{dated_file_name, ObjectPath};
use api2csv_sources::{DayWindow, InsightsFetcher};
use chrono::NaiveDate;
use tracing::info;

use super::{JobContext, JobReport};

/// Fetch account insights from `since` and upload them as today's daily file.
pub async fn run(ctx: &JobContext, since: NaiveDate) -> Result<JobReport> {
    let ig = &ctx.config().instagram;
    let token = ctx.secret(&ig.token_secret).await?;
    info!(
        since = %since,
        token_len = token.len(),
        account_id_len = ig.account_id.len(),
        "Fetching insights"
    );

    let fetcher = InsightsFetcher::new(ctx.http().clone(), ig.insights_url(), token)
        .with_max_pages(ig.max_pages);

    let mut per_day = Vec::with_capacity(ig.per_day_metrics.len());
    for metric in &ig.per_day_metrics {
        let window = if ig.is_unbounded(metric) {
            None
        } else {
            Some(DayWindow::starting(since, ig.window_days))
        };
        per_day.push(fetcher.per_day(metric, window).await);
    }

    let mut aggregates = Vec::with_capacity(ig.aggregate_metrics.len());
    for metric in &ig.aggregate_metrics {
        let shape = if ig.is_breakdown(metric) {
            AggregateShape::FollowType
        } else {
            AggregateShape::Total
        };
        aggregates.push(fetcher.aggregate(metric, shape, since).await);
    }

    let table = assemble_insights(&per_day, &aggregates, &ig.required_columns)?;
    info!(rows = table.len(), columns = table.columns().len(), "Assembled insights");

    let container = ctx.container(&ig.container).await?;
    let path = ObjectPath::new(&ig.insights_folder, dated_file_name(&ig.insights_stem, ctx.today()));
    ctx.upload_table(&container, &path, &table).await?;

    Ok(JobReport::uploaded(&container, &path, table.len()))
}
