use anyhow::{Context, Result};
use api2csv_core::backend_report::BackendReportParser;
use api2csv_core::ObjectPath;
use api2csv_sources::backend_report::fetch_backend_report;
use tracing::info;

use super::{JobContext, JobReport};

pub async fn run(ctx: &JobContext) -> Result<JobReport> {
    let cfg = &ctx.config().backend_report;
    let post_key = ctx.secret(&cfg.post_key_secret).await?;

    let text = fetch_backend_report(ctx.http().as_ref(), &cfg.url, &post_key).await?;
    let table = BackendReportParser::new()?
        .parse(&text)
        .context("Failed to parse backend report")?;
    info!(rows = table.len(), columns = table.columns().len(), "Parsed backend report");

    let container = ctx.container(&cfg.container).await?;
    let path = ObjectPath::new(&cfg.folder, &cfg.file);
    ctx.upload_table(&container, &path, &table).await?;

    Ok(JobReport::uploaded(&container, &path, table.len()))
}
