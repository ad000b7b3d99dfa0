use anyhow::Result;
use api2csv_sources::google_auth::fetch_access_token;

use super::JobContext;

/// Mint an analytics access token from the service-account secret.
pub async fn run(ctx: &JobContext) -> Result<String> {
    let cfg = &ctx.config().analytics;
    let key_json = ctx.secret(&cfg.service_account_secret).await?;
    let token = fetch_access_token(ctx.http().as_ref(), &key_json, &cfg.scope).await?;
    Ok(token)
}
