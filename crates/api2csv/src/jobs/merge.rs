// Merge today's daily insights file into the bulk file, then archive it.
//
// Order: archive daily -> verify archive -> overwrite bulk -> delete daily.
// The merge is keyed by date, so repeating a run after a crash at any step
// converges on the same bulk contents.

use anyhow::{bail, Context, Result};
use api2csv_core::{dated_file_name, decode_csv_text, merge_daily, ObjectPath, Table};
use tracing::info;

use super::{JobContext, JobReport};

pub async fn run(ctx: &JobContext) -> Result<JobReport> {
    let ig = &ctx.config().instagram;
    let container = ctx.container(&ig.container).await?;

    let daily_path = ObjectPath::new(&ig.insights_folder, dated_file_name(&ig.insights_stem, ctx.today()));
    let bulk_path = ObjectPath::new(&ig.insights_folder, &ig.bulk_file);
    let archive_path = daily_path.moved_to(&ig.archive_folder);

    let daily_bytes = container
        .read(&daily_path)
        .await
        .with_context(|| format!("Daily file {} is not available", container.uri(&daily_path)))?;
    let daily = decode_csv_text(&daily_bytes).context("Failed to read daily file")?;

    let bulk = match container.read_optional(&bulk_path).await? {
        Some(bytes) => decode_csv_text(&bytes).context("Failed to read bulk file")?,
        None => {
            info!(object = %container.uri(&bulk_path), "No bulk file yet, starting empty");
            Table::default()
        }
    };

    let outcome = merge_daily(bulk, &daily, &ig.required_columns)?;
    info!(
        replaced = outcome.replaced,
        retained = outcome.retained,
        appended = outcome.appended,
        "Merged daily file"
    );

    ctx.upload_bytes(&container, &archive_path, daily_bytes).await?;
    if !container.exists(&archive_path).await? {
        bail!(
            "Archive {} was not visible after upload; daily file left in place",
            container.uri(&archive_path)
        );
    }

    ctx.upload_table(&container, &bulk_path, &outcome.merged).await?;

    container
        .delete(&daily_path)
        .await
        .with_context(|| format!("Failed to delete {}", container.uri(&daily_path)))?;
    info!(object = %container.uri(&daily_path), "Daily file removed");

    Ok(JobReport::new(
        format!(
            "Files {} and {} were merged and archived",
            bulk_path.file, daily_path.file
        ),
        outcome.merged.len(),
    ))
}
