use anyhow::Result;
use api2csv_core::ObjectPath;
use api2csv_sources::OpenDataClient;
use api2csv_storage::Container;

use super::{JobContext, JobReport};

/// Store the newest weather dataset file, then its flattened daily table.
pub async fn run(ctx: &JobContext) -> Result<JobReport> {
    let cfg = &ctx.config().knmi;
    let api_key = ctx.secret(&cfg.api_key_secret).await?;

    let client = OpenDataClient::new(ctx.http().clone(), &cfg.base_url, api_key);
    let file = client.download_latest(&cfg.dataset, &cfg.version).await?;

    let container = ctx.container(&cfg.container).await?;
    let path = ObjectPath::new(&cfg.folder, &file.filename);
    ctx.upload_bytes(&container, &path, file.bytes.clone()).await?;

    flatten(ctx, &container, &path, file.bytes).await
}

#[cfg(feature = "netcdf")]
async fn flatten(
    ctx: &JobContext,
    container: &Container,
    nc_path: &ObjectPath,
    bytes: Vec<u8>,
) -> Result<JobReport> {
    use anyhow::Context;
    use api2csv_core::knmi;

    let cfg = &ctx.config().knmi;
    let dataset = tokio::task::spawn_blocking(move || knmi::read_station_dataset(&bytes))
        .await
        .context("NetCDF decode task failed")?
        .with_context(|| format!("Failed to read {}", nc_path.file))?;
    let table = knmi::daily_table(&dataset, cfg.station_index, &cfg.station_label)?;

    let csv_path = ObjectPath::new(&cfg.folder, &cfg.csv_file);
    ctx.upload_table(container, &csv_path, &table).await?;

    Ok(JobReport::new(
        format!(
            "Files {} and {} were uploaded to {}/{}/{}",
            nc_path.file,
            csv_path.file,
            container.account(),
            container.name(),
            cfg.folder
        ),
        table.len(),
    ))
}

#[cfg(not(feature = "netcdf"))]
async fn flatten(
    _ctx: &JobContext,
    container: &Container,
    nc_path: &ObjectPath,
    _bytes: Vec<u8>,
) -> Result<JobReport> {
    tracing::warn!(
        file = %nc_path.file,
        "Built without the netcdf feature, daily table not produced"
    );
    Ok(JobReport::uploaded(container, nc_path, 0))
}
