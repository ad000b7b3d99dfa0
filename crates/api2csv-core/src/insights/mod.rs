//! Social-media account insights: page decoding, per-metric series and the
//! dated table assembled from them.
//!
//! Two kinds of metrics exist:
//! - per-day value metrics report one value per calendar day inside a page
//!   (`data[].values[] = {value, end_time}`)
//! - aggregate total metrics report one summary value for the requested day
//!   window (`data[0].total_value.value`, or a `follow_type` breakdown)
//!
//! Fetching lives in `api2csv-sources`; it feeds decoded [`InsightsPage`]s in
//! here and folds the results with [`assemble_insights`].

mod assemble;
mod page;

pub use assemble::{
    assemble_aggregates, assemble_insights, assemble_per_day, right_join, DatedTable,
};
pub use page::{
    aggregate_row, next_cursor, parse_end_time, per_day_points, AggregateRow, AggregateSeries,
    AggregateShape, BreakdownGroup, BreakdownResult, InsightEntry, InsightValue,
    InsightsPage, MetricSeries, Paging, FOLLOWER, FOLLOW_TYPE, NON_FOLLOWER,
};
