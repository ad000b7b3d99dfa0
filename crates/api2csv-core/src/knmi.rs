//! Station time series from the daily weather dataset, flattened to one row per day.
//!
//! The dataset is a NetCDF file of `[station, time]` variables. Decoding it
//! needs the native netCDF library and lives behind the `netcdf` feature
//! ([`read_station_dataset`]); everything else here works on the decoded
//! [`StationDataset`].

use crate::error::{Result, TableError};
use crate::table::{Table, Value};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

#[cfg(feature = "netcdf")]
mod reader;
#[cfg(feature = "netcdf")]
pub use reader::read_station_dataset;

pub const STATION_COLUMN: &str = "Station";
pub const TIME_COLUMN: &str = "Time";

/// Coordinate and metadata variables that never become columns.
pub const EXCLUDED_VARIABLES: [&str; 7] = [
    "station",
    "time",
    "lat",
    "lon",
    "iso_dataset",
    "product",
    "projection",
];

/// Values at or above this are the netCDF default fill for floats.
const FILL_THRESHOLD: f64 = 9.96e36;

/// Decoded time axis plus every data variable of the file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationDataset {
    pub time_units: String,
    pub time_values: Vec<f64>,
    pub variables: Vec<StationSeries>,
}

/// One `[station, time]` variable, row-major by station.
#[derive(Debug, Clone, PartialEq)]
pub struct StationSeries {
    pub name: String,
    pub long_name: Option<String>,
    pub fill_value: Option<f64>,
    pub stations: usize,
    pub times: usize,
    pub values: Vec<f64>,
}

impl StationSeries {
    pub fn column_name(&self) -> &str {
        self.long_name.as_deref().unwrap_or(&self.name)
    }

    fn value(&self, station: usize, time: usize) -> Value {
        let raw = self.values.get(station * self.times + time).copied();
        match raw {
            Some(v) if v.is_finite() && v < FILL_THRESHOLD && Some(v) != self.fill_value => {
                Value::Float(v)
            }
            _ => Value::Null,
        }
    }
}

fn reference_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1950, 1, 1)
        .unwrap_or_default()
        .and_time(NaiveTime::MIN)
}

fn offset(seconds: f64) -> Result<TimeDelta> {
    let millis = (seconds * 1000.0).round();
    if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
        return Err(TableError::shape(format!(
            "time offset {seconds}s out of range"
        )));
    }
    TimeDelta::try_milliseconds(millis as i64)
        .ok_or_else(|| TableError::shape(format!("time offset {seconds}s out of range")))
}

/// Convert a time-axis value to a timestamp counted from 1950-01-01.
///
/// `days since` values are one-based: day 1 is the reference date itself.
pub fn time_to_datetime(value: f64, units: &str) -> Result<NaiveDateTime> {
    let seconds = if units.starts_with("days since") {
        (value - 1.0) * 86_400.0
    } else if units.starts_with("seconds since") {
        value
    } else {
        return Err(TableError::shape(format!(
            "unsupported time units '{units}', expected 'days since' or 'seconds since'"
        )));
    };
    reference_time()
        .checked_add_signed(offset(seconds)?)
        .ok_or_else(|| TableError::shape(format!("time value {value} out of range")))
}

fn format_time(time: NaiveDateTime) -> String {
    if time.time() == NaiveTime::MIN {
        time.format("%Y-%m-%d").to_string()
    } else {
        time.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// One row per time step for a single station.
///
/// Columns are `Station`, `Time`, then each data variable under its
/// `long_name`. Times are shifted back one day so a row is labelled with
/// the day the observations cover.
pub fn daily_table(
    dataset: &StationDataset,
    station: usize,
    station_label: &str,
) -> Result<Table> {
    let series: Vec<&StationSeries> = dataset
        .variables
        .iter()
        .filter(|s| !EXCLUDED_VARIABLES.contains(&s.name.as_str()))
        .filter(|s| {
            let usable =
                s.stations * s.times == s.values.len() && s.times == dataset.time_values.len();
            if !usable {
                tracing::warn!(
                    variable = %s.name,
                    "Skipping variable without a [station, time] shape"
                );
            }
            usable
        })
        .collect();

    if let Some(s) = series.iter().find(|s| station >= s.stations) {
        return Err(TableError::shape(format!(
            "station index {station} out of range for '{}' ({} stations)",
            s.name, s.stations
        )));
    }

    let mut columns = vec![STATION_COLUMN.to_string(), TIME_COLUMN.to_string()];
    columns.extend(series.iter().map(|s| s.column_name().to_string()));
    let mut table = Table::new(columns);

    let day = TimeDelta::days(1);
    for (j, raw) in dataset.time_values.iter().enumerate() {
        let time = time_to_datetime(*raw, &dataset.time_units)?;
        let label = time
            .checked_sub_signed(day)
            .map(format_time)
            .ok_or_else(|| TableError::shape(format!("time value {raw} out of range")))?;

        let mut cells = vec![Value::Text(station_label.to_string()), Value::Text(label)];
        cells.extend(series.iter().map(|s| s.value(station, j)));
        table.push_row(cells)?;
    }
    Ok(table)
}
