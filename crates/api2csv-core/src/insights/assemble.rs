// Date-indexed assembly of per-day and aggregate series
//
// Per-metric series are immutable inputs; each assembly is a single fold at
// the end of a fetch run.

use super::page::{AggregateSeries, MetricSeries};
use crate::error::Result;
use crate::merge::DATE_COLUMN;
use crate::table::{Table, Value};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Rows keyed by calendar date, ascending
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatedTable {
    columns: Vec<String>,
    rows: BTreeMap<NaiveDate, Vec<Value>>,
}

impl DatedTable {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: BTreeMap::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.keys().copied()
    }

    pub fn get(&self, date: NaiveDate, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(&date).map(|cells| &cells[idx])
    }

    /// Set a cell unless an earlier occurrence already filled it.
    fn fill(&mut self, date: NaiveDate, idx: usize, value: Value) {
        let width = self.columns.len();
        let row = self
            .rows
            .entry(date)
            .or_insert_with(|| vec![Value::Null; width]);
        if row[idx].is_null() {
            row[idx] = value;
        }
    }

    /// Leading ISO `date` column followed by the value columns.
    pub fn into_table(self) -> Table {
        let columns = std::iter::once(DATE_COLUMN.to_string())
            .chain(self.columns)
            .collect();
        let rows = self
            .rows
            .into_iter()
            .map(|(date, cells)| {
                let mut row = Vec::with_capacity(cells.len() + 1);
                row.push(Value::Text(date.format("%Y-%m-%d").to_string()));
                row.extend(cells);
                row
            })
            .collect();
        Table::from_parts(columns, rows)
    }
}

/// One column per series, one row per date any series reported.
pub fn assemble_per_day(series: &[MetricSeries]) -> DatedTable {
    let mut table = DatedTable::new(series.iter().map(|s| s.metric().to_string()));
    for (idx, metric) in series.iter().enumerate() {
        for (date, value) in metric.iter() {
            table.fill(date, idx, value.clone());
        }
    }
    table
}

/// Column-wise concatenation of aggregate rows, aligned by date.
pub fn assemble_aggregates(series: &[AggregateSeries]) -> DatedTable {
    let mut table = DatedTable::new(series.iter().flat_map(AggregateSeries::columns));
    let mut offset = 0;
    for metric in series {
        let columns = metric.columns();
        for row in &metric.rows {
            for (name, value) in &row.values {
                if let Some(pos) = columns.iter().position(|c| c == name) {
                    table.fill(row.date, offset + pos, value.clone());
                }
            }
        }
        offset += columns.len();
    }
    table
}

/// Right join on date: the result has exactly `right`'s dates, `left`'s
/// columns first.
pub fn right_join(left: DatedTable, right: DatedTable) -> DatedTable {
    let left_width = left.columns.len();
    let mut left_rows = left.rows;

    let columns = left.columns.into_iter().chain(right.columns).collect();
    let rows = right
        .rows
        .into_iter()
        .map(|(date, cells)| {
            let mut row = left_rows
                .remove(&date)
                .unwrap_or_else(|| vec![Value::Null; left_width]);
            row.extend(cells);
            (date, row)
        })
        .collect();

    DatedTable { columns, rows }
}

/// Full insights assembly: join both series kinds and drop rows missing any
/// required column.
pub fn assemble_insights<S: AsRef<str>>(
    per_day: &[MetricSeries],
    aggregates: &[AggregateSeries],
    required: &[S],
) -> Result<Table> {
    let joined = right_join(assemble_per_day(per_day), assemble_aggregates(aggregates));
    joined.into_table().drop_incomplete(required)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::{AggregateRow, AggregateShape, FOLLOWER, NON_FOLLOWER};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn series(metric: &str, points: &[(u32, i64)]) -> MetricSeries {
        let mut s = MetricSeries::new(metric);
        for (d, v) in points {
            s.record(day(*d), Value::Int(*v));
        }
        s
    }

    fn total(metric: &str, points: &[(u32, Option<i64>)]) -> AggregateSeries {
        let mut s = AggregateSeries::new(metric, AggregateShape::Total);
        for (d, v) in points {
            s.rows.push(AggregateRow {
                date: day(*d),
                values: vec![(metric.to_string(), v.map(Value::Int).unwrap_or_default())],
            });
        }
        s
    }

    #[test]
    fn test_per_day_union_of_dates_sorted() {
        let table = assemble_per_day(&[
            series("reach", &[(3, 30), (1, 10)]),
            series("impressions", &[(2, 200)]),
        ]);

        assert_eq!(table.columns(), &["reach", "impressions"]);
        assert_eq!(table.dates().collect::<Vec<_>>(), vec![day(1), day(2), day(3)]);
        assert_eq!(table.get(day(2), "reach"), Some(&Value::Null));
        assert_eq!(table.get(day(2), "impressions"), Some(&Value::Int(200)));
    }

    #[test]
    fn test_right_join_keeps_aggregate_dates() {
        let per_day = assemble_per_day(&[series("reach", &[(1, 10), (2, 20), (3, 30)])]);
        let aggregates = assemble_aggregates(&[total("profile_views", &[(2, Some(5)), (4, Some(7))])]);

        let joined = right_join(per_day, aggregates);
        assert_eq!(joined.columns(), &["reach", "profile_views"]);
        assert_eq!(joined.dates().collect::<Vec<_>>(), vec![day(2), day(4)]);
        assert_eq!(joined.get(day(2), "reach"), Some(&Value::Int(20)));
        assert_eq!(joined.get(day(4), "reach"), Some(&Value::Null));
    }

    #[test]
    fn test_breakdown_contributes_two_columns() {
        let mut follows = AggregateSeries::new("follows_and_unfollows", AggregateShape::FollowType);
        follows.rows.push(AggregateRow {
            date: day(1),
            values: vec![
                (FOLLOWER.to_string(), Value::Int(3)),
                (NON_FOLLOWER.to_string(), Value::Int(0)),
            ],
        });

        let table = assemble_aggregates(&[follows, total("website_clicks", &[(1, Some(9))])]);
        assert_eq!(table.columns(), &[FOLLOWER, NON_FOLLOWER, "website_clicks"]);
        assert_eq!(table.get(day(1), NON_FOLLOWER), Some(&Value::Int(0)));
        assert_eq!(table.get(day(1), "website_clicks"), Some(&Value::Int(9)));
    }

    #[test]
    fn test_assemble_insights_drops_incomplete_rows() {
        let table = assemble_insights(
            &[series("reach", &[(1, 10), (2, 20)])],
            &[
                total("accounts_engaged", &[(1, Some(4)), (2, None)]),
                total("profile_views", &[(1, Some(5)), (2, Some(6))]),
            ],
            &["accounts_engaged", "profile_views"],
        )
        .unwrap();

        assert_eq!(table.columns(), &["date", "reach", "accounts_engaged", "profile_views"]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0, "date"), Some(&Value::from("2024-06-01")));
    }

    #[test]
    fn test_unknown_required_column_is_an_error() {
        let result = assemble_insights(&[], &[total("reach", &[(1, Some(1))])], &["website_clicks"]);
        assert!(result.is_err());
    }
}
