use anyhow::{Context, Result};
use api2csv_core::ObjectPath;
use api2csv_sources::MediaFetcher;
use tracing::info;

use super::{JobContext, JobReport};

/// List every post and upload their details as one table.
pub async fn run(ctx: &JobContext) -> Result<JobReport> {
    let ig = &ctx.config().instagram;
    let token = ctx.secret(&ig.token_secret).await?;

    let fetcher = MediaFetcher::new(ctx.http().clone(), token);
    let ids = fetcher
        .list_ids(&ig.media_url())
        .await
        .context("Failed to list media")?;
    let table = fetcher.posts(&ids, |id| ig.post_url(id)).await;
    info!(listed = ids.len(), rows = table.len(), "Collected post details");

    let container = ctx.container(&ig.container).await?;
    let path = ObjectPath::new(&ig.media_folder, &ig.media_file);
    ctx.upload_table(&container, &path, &table).await?;

    Ok(JobReport::uploaded(&container, &path, table.len()))
}
