// Insights page wire types and per-page extraction

use crate::error::{Result, TableError};
use crate::table::Value;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

pub const FOLLOW_TYPE: &str = "follow_type";
pub const FOLLOWER: &str = "FOLLOWER";
pub const NON_FOLLOWER: &str = "NON_FOLLOWER";

/// One page of an insights response. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InsightsPage {
    #[serde(default)]
    pub data: Vec<InsightEntry>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InsightEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub values: Vec<InsightValue>,
    #[serde(default)]
    pub total_value: Option<TotalValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InsightValue {
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TotalValue {
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub breakdowns: Vec<BreakdownGroup>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BreakdownGroup {
    #[serde(default)]
    pub results: Vec<BreakdownResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BreakdownResult {
    #[serde(default)]
    pub dimension_values: Vec<String>,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Continuation links. Both are opaque URLs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
}

/// Pick the cursor to follow after `page`.
///
/// With a `since` bound the traversal climbs forward and stops at the first
/// page without `next`. Without one it climbs backward through `previous`
/// until none remains.
pub fn next_cursor(page: &InsightsPage, since_bound: bool) -> Option<&str> {
    let paging = page.paging.as_ref()?;
    if since_bound {
        paging.next.as_deref()
    } else {
        paging.previous.as_deref()
    }
}

/// Calendar date of an `end_time` such as `2024-06-02T07:00:00+0000`.
pub fn parse_end_time(end_time: &str) -> Option<NaiveDate> {
    let day = end_time.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Every (date, value) pair the page reports for `metric`.
pub fn per_day_points(page: &InsightsPage, metric: &str) -> Vec<(NaiveDate, Value)> {
    page.data
        .iter()
        .filter(|entry| entry.name == metric)
        .flat_map(|entry| entry.values.iter())
        .filter_map(|point| {
            let raw = point.end_time.as_deref()?;
            match parse_end_time(raw) {
                Some(date) => Some((date, Value::from_json(&point.value))),
                None => {
                    debug!(metric, end_time = raw, "Skipping point with unparseable end_time");
                    None
                }
            }
        })
        .collect()
}

/// Sparse per-day series for one metric. Last value wins on a repeated date.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeries {
    metric: String,
    points: BTreeMap<NaiveDate, Value>,
}

impl MetricSeries {
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            points: BTreeMap::new(),
        }
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn record(&mut self, date: NaiveDate, value: Value) {
        self.points.insert(date, value);
    }

    /// Fold one page into the series, returning how many points it carried.
    pub fn absorb_page(&mut self, page: &InsightsPage) -> usize {
        let points = per_day_points(page, &self.metric);
        let count = points.len();
        for (date, value) in points {
            self.record(date, value);
        }
        count
    }

    pub fn get(&self, date: NaiveDate) -> Option<&Value> {
        self.points.get(&date)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &Value)> {
        self.points.iter().map(|(d, v)| (*d, v))
    }
}

/// How an aggregate metric's value is laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateShape {
    /// One scalar column named after the metric
    Total,
    /// `FOLLOWER` / `NON_FOLLOWER` pair from a `follow_type` breakdown
    FollowType,
}

impl AggregateShape {
    pub fn breakdown(&self) -> Option<&'static str> {
        match self {
            AggregateShape::Total => None,
            AggregateShape::FollowType => Some(FOLLOW_TYPE),
        }
    }

    pub fn columns(&self, metric: &str) -> Vec<String> {
        match self {
            AggregateShape::Total => vec![metric.to_string()],
            AggregateShape::FollowType => vec![FOLLOWER.to_string(), NON_FOLLOWER.to_string()],
        }
    }
}

/// Aggregate values for one day window
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub date: NaiveDate,
    pub values: Vec<(String, Value)>,
}

/// Read the aggregate row a page reports for the window ending `date`.
///
/// A missing key or index anywhere along the path is a shape error; callers
/// treat it as "no row for this window".
pub fn aggregate_row(
    page: &InsightsPage,
    metric: &str,
    shape: AggregateShape,
    date: NaiveDate,
) -> Result<AggregateRow> {
    let entry = page
        .data
        .first()
        .ok_or_else(|| TableError::shape(format!("{}: empty data list", metric)))?;
    let total = entry
        .total_value
        .as_ref()
        .ok_or_else(|| TableError::shape(format!("{}: missing total_value", metric)))?;

    let values = match shape {
        AggregateShape::Total => {
            let value = total
                .value
                .as_ref()
                .ok_or_else(|| TableError::shape(format!("{}: missing total_value.value", metric)))?;
            vec![(metric.to_string(), Value::from_json(value))]
        }
        AggregateShape::FollowType => {
            let group = total
                .breakdowns
                .first()
                .ok_or_else(|| TableError::shape(format!("{}: missing breakdowns", metric)))?;

            let mut values = vec![
                (FOLLOWER.to_string(), Value::Int(0)),
                (NON_FOLLOWER.to_string(), Value::Int(0)),
            ];
            for result in &group.results {
                let dimension = result.dimension_values.first().ok_or_else(|| {
                    TableError::shape(format!("{}: breakdown result without dimension", metric))
                })?;
                match values.iter_mut().find(|(name, _)| name == dimension) {
                    Some(slot) => slot.1 = Value::from_json(&result.value),
                    None => debug!(metric, dimension = %dimension, "Ignoring unknown dimension"),
                }
            }
            values
        }
    };

    Ok(AggregateRow { date, values })
}

/// All aggregate rows collected for one metric
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSeries {
    pub metric: String,
    pub shape: AggregateShape,
    pub rows: Vec<AggregateRow>,
}

impl AggregateSeries {
    pub fn new(metric: impl Into<String>, shape: AggregateShape) -> Self {
        Self {
            metric: metric.into(),
            shape,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> Vec<String> {
        self.shape.columns(&self.metric)
    }
}
