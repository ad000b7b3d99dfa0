//! Date-keyed merge of a daily insights file into the cumulative bulk file.
//!
//! Rows are matched on the text of the `date` column. Every date present in
//! the (filtered) daily table replaces the bulk rows for that date, so merging
//! the same daily table twice leaves the bulk date-set unchanged.

use crate::error::{Result, TableError};
use crate::table::Table;
use std::collections::HashSet;
use tracing::debug;

pub const DATE_COLUMN: &str = "date";

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub merged: Table,
    /// Bulk rows dropped because the daily table carries their date
    pub replaced: usize,
    /// Bulk rows kept as-is
    pub retained: usize,
    /// Daily rows appended after filtering
    pub appended: usize,
}

/// Merge `daily` into `bulk`.
///
/// Daily rows with a null in any `required` column are discarded first. The
/// result is the surviving bulk rows followed by the daily rows, columns
/// unioned by name. An empty bulk table (no columns) is allowed.
pub fn merge_daily<S: AsRef<str>>(
    mut bulk: Table,
    daily: &Table,
    required: &[S],
) -> Result<MergeOutcome> {
    let daily = daily.clone().drop_incomplete(required)?;
    let daily_dates: HashSet<String> = daily
        .column_values(DATE_COLUMN)?
        .into_iter()
        .map(ToString::to_string)
        .collect();

    let before = bulk.len();
    if !bulk.columns().is_empty() {
        let idx = bulk
            .column_index(DATE_COLUMN)
            .ok_or_else(|| TableError::unknown_column(DATE_COLUMN, bulk.columns()))?;
        bulk.retain(|row| !daily_dates.contains(&row.cells()[idx].to_string()));
    }
    let retained = bulk.len();
    let appended = daily.len();

    debug!(
        bulk_rows = before,
        retained,
        appended,
        "Merged daily rows into bulk"
    );

    Ok(MergeOutcome {
        merged: bulk.concat(daily),
        replaced: before - retained,
        retained,
        appended,
    })
}
