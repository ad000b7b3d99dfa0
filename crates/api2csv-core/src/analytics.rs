//! Web-analytics `runReport` wire types and reshaping.

use crate::error::{Result, TableError};
use crate::table::{Table, Value};
use serde::{Deserialize, Serialize};

pub const ACTIVE_USERS: &str = "activeUsers";
pub const ENGAGEMENT_DURATION: &str = "userEngagementDuration";
pub const ENGAGEMENT_AVERAGE: &str = "userEngagementDurationAverage";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Named {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReportRequest {
    pub dimensions: Vec<Named>,
    pub metrics: Vec<Named>,
    pub date_ranges: Vec<DateRange>,
}

impl RunReportRequest {
    pub fn new<S: AsRef<str>>(
        dimensions: &[S],
        metrics: &[S],
        start_date: &str,
        end_date: &str,
    ) -> Self {
        let named = |names: &[S]| -> Vec<Named> {
            names
                .iter()
                .map(|n| Named {
                    name: n.as_ref().to_string(),
                })
                .collect()
        };
        Self {
            dimensions: named(dimensions),
            metrics: named(metrics),
            date_ranges: vec![DateRange {
                start_date: start_date.to_string(),
                end_date: end_date.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReportResponse {
    #[serde(default)]
    pub dimension_headers: Vec<Named>,
    #[serde(default)]
    pub metric_headers: Vec<Named>,
    #[serde(default)]
    pub rows: Vec<ReportRow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    #[serde(default)]
    pub dimension_values: Vec<CellValue>,
    #[serde(default)]
    pub metric_values: Vec<CellValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CellValue {
    #[serde(default)]
    pub value: String,
}

/// Reshape a report into one column per dimension then one per metric.
///
/// Dimension values stay text (`20240101` is a date, not a number). Metric
/// values are type-inferred, `activeUsers` and `userEngagementDuration` are
/// forced to integers, and `userEngagementDurationAverage` is appended
/// (null where `activeUsers` is zero).
pub fn report_table(response: &RunReportResponse) -> Result<Table> {
    let columns: Vec<&str> = response
        .dimension_headers
        .iter()
        .chain(&response.metric_headers)
        .map(|h| h.name.as_str())
        .collect();
    let dims = response.dimension_headers.len();
    let mut table = Table::new(columns.iter().copied());

    for row in &response.rows {
        if row.dimension_values.len() != dims
            || row.metric_values.len() != response.metric_headers.len()
        {
            return Err(TableError::shape(format!(
                "report row has {} dimension and {} metric values, headers declare {} and {}",
                row.dimension_values.len(),
                row.metric_values.len(),
                dims,
                response.metric_headers.len()
            )));
        }
        let cells = row
            .dimension_values
            .iter()
            .map(|c| Value::Text(c.value.clone()))
            .chain(row.metric_values.iter().map(|c| Value::parse_cell(&c.value)))
            .collect();
        table.push_row(cells)?;
    }

    for column in [ACTIVE_USERS, ENGAGEMENT_DURATION] {
        coerce_int(&mut table, column)?;
    }

    table.add_column(ENGAGEMENT_AVERAGE, |row| {
        let duration = row.get(ENGAGEMENT_DURATION).and_then(Value::as_f64);
        let users = row.get(ACTIVE_USERS).and_then(Value::as_f64);
        match (duration, users) {
            (Some(d), Some(u)) if u != 0.0 => Value::Float(d / u),
            _ => Value::Null,
        }
    });

    Ok(table)
}

fn coerce_int(table: &mut Table, column: &str) -> Result<()> {
    let mut bad = None;
    table.map_column(column, |v| match v {
        Value::Null => Value::Null,
        other => match other.as_f64() {
            Some(f) => Value::Int(f.trunc() as i64),
            None => {
                bad.get_or_insert_with(|| other.to_string());
                other.clone()
            }
        },
    })?;
    match bad {
        Some(value) => Err(TableError::shape(format!(
            "{} value '{}' is not numeric",
            column, value
        ))),
        None => Ok(()),
    }
}
