use anyhow::{Context, Result};
use api2csv_core::analytics::{report_table, RunReportRequest};
use api2csv_core::ObjectPath;
use api2csv_sources::analytics::run_report;
use tracing::info;

use super::{token, JobContext, JobReport};

pub async fn run(ctx: &JobContext) -> Result<JobReport> {
    let cfg = &ctx.config().analytics;
    let property_id = ctx.secret(&cfg.property_id_secret).await?;
    let access_token = token::run(ctx).await?;

    let request = RunReportRequest::new(&cfg.dimensions, &cfg.metrics, &cfg.start_date, &cfg.end_date);
    let report = run_report(
        ctx.http().as_ref(),
        &cfg.run_report_url(&property_id),
        &access_token,
        &request,
    )
    .await?;
    let table = report_table(&report).context("Failed to reshape analytics report")?;
    info!(rows = table.len(), "Built analytics table");

    let container = ctx.container(&cfg.container).await?;
    let path = ObjectPath::new(&cfg.folder, &cfg.file);
    ctx.upload_table(&container, &path, &table).await?;

    Ok(JobReport::uploaded(&container, &path, table.len()))
}
