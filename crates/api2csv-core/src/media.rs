// Media listing pages and per-post rows

use crate::insights::Paging;
use crate::table::{Table, Value};
use serde::Deserialize;

/// Fields requested for every post, in output column order
pub const POST_FIELDS: [&str; 7] = [
    "timestamp",
    "id",
    "caption",
    "comments_count",
    "like_count",
    "media_product_type",
    "media_type",
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaListPage {
    #[serde(default)]
    pub data: Vec<MediaRef>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

impl MediaListPage {
    pub fn next(&self) -> Option<&str> {
        self.paging.as_ref()?.next.as_deref()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaRef {
    pub id: String,
}

pub fn posts_table() -> Table {
    Table::new(POST_FIELDS)
}

/// Append the rows carried by one post response.
///
/// A body with a `data` array contributes one row per element; any other
/// object contributes itself. Returns the number of rows appended.
pub fn append_post(table: &mut Table, body: &serde_json::Value) -> usize {
    let records: Vec<&serde_json::Map<String, serde_json::Value>> = match body.get("data") {
        Some(serde_json::Value::Array(items)) => items.iter().filter_map(|i| i.as_object()).collect(),
        _ => body.as_object().into_iter().collect(),
    };

    for record in &records {
        table.push_named(
            record
                .iter()
                .map(|(k, v)| (k.as_str(), Value::from_json(v))),
        );
    }
    records.len()
}
