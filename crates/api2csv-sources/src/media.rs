//! Media listing and per-post details

use crate::error::Result;
use crate::http::{with_query, HttpClient};
use api2csv_core::media::{append_post, posts_table, MediaListPage, POST_FIELDS};
use api2csv_core::Table;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct MediaFetcher {
    http: Arc<dyn HttpClient>,
    access_token: String,
}

impl MediaFetcher {
    pub fn new(http: Arc<dyn HttpClient>, access_token: impl Into<String>) -> Self {
        Self {
            http,
            access_token: access_token.into(),
        }
    }

    /// Every media id reachable from the listing, following `next`.
    ///
    /// Unlike the insights traversal, any failed page aborts the listing.
    pub async fn list_ids(&self, listing_url: &str) -> Result<Vec<String>> {
        let mut url = with_query(
            listing_url,
            &[("fields", "id"), ("access_token", self.access_token.as_str())],
        )?;
        let mut ids = Vec::new();

        loop {
            let page: MediaListPage = self
                .http
                .get(&url, Vec::new())
                .await?
                .error_for_status(&url)?
                .decode(&url)?;
            metrics::counter!("api2csv.fetch.pages").increment(1);
            debug!(count = page.data.len(), "Fetched media listing page");
            ids.extend(page.data.iter().map(|m| m.id.clone()));

            match page.next() {
                Some(next) => url = next.to_string(),
                None => break,
            }
        }

        info!(media = ids.len(), "Listed media");
        Ok(ids)
    }

    async fn fetch_post(&self, url: &str) -> Result<serde_json::Value> {
        let fields = POST_FIELDS.join(",");
        let url = with_query(
            url,
            &[("fields", fields.as_str()), ("access_token", self.access_token.as_str())],
        )?;
        let response = self.http.get(&url, Vec::new()).await?.error_for_status(&url)?;
        response.decode(&url)
    }

    /// Fetch details for each id. A post that cannot be fetched is skipped.
    pub async fn posts<F>(&self, ids: &[String], post_url: F) -> Table
    where
        F: Fn(&str) -> String,
    {
        let mut table = posts_table();
        for id in ids {
            match self.fetch_post(&post_url(id)).await {
                Ok(body) => {
                    append_post(&mut table, &body);
                }
                Err(e) => {
                    metrics::counter!("api2csv.fetch.failures").increment(1);
                    warn!(media_id = %id, error = %e, "Skipping post");
                }
            }
        }
        table
    }
}
