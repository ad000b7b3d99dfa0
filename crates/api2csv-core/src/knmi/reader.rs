//! NetCDF decoding of the station dataset.

use super::{StationDataset, StationSeries, EXCLUDED_VARIABLES};
use crate::error::{Result, TableError};
use netcdf::{AttributeValue, Variable};
use std::io::Write;

fn string_attribute(var: &Variable, name: &str) -> Option<String> {
    match var.attribute_value(name) {
        Some(Ok(AttributeValue::Str(value))) => Some(value),
        _ => None,
    }
}

fn series(var: &Variable) -> Option<StationSeries> {
    let name = var.name();
    let dims = var.dimensions();
    if dims.len() != 2 {
        tracing::debug!(
            variable = %name,
            dims = dims.len(),
            "Skipping non [station, time] variable"
        );
        return None;
    }
    let values = match var.get_values::<f64, _>(..) {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!(variable = %name, error = %e, "Skipping unreadable variable");
            return None;
        }
    };
    let fill_value = var
        .attribute_value("_FillValue")
        .and_then(|value| value.ok())
        .and_then(|value| f64::try_from(value).ok());

    Some(StationSeries {
        long_name: string_attribute(var, "long_name"),
        fill_value,
        stations: dims[0].len(),
        times: dims[1].len(),
        values,
        name,
    })
}

/// Decode a NetCDF file held in memory.
///
/// The native library only opens paths, so the bytes go through a
/// temporary file that is removed when this returns.
pub fn read_station_dataset(bytes: &[u8]) -> Result<StationDataset> {
    if bytes.is_empty() {
        return Err(TableError::shape("NetCDF file is empty"));
    }
    let mut scratch = tempfile::Builder::new().suffix(".nc").tempfile()?;
    scratch.write_all(bytes)?;
    scratch.flush()?;

    let file = netcdf::open(scratch.path())?;
    let time = file
        .variable("time")
        .ok_or_else(|| TableError::shape("'time' variable not found in the NetCDF file"))?;
    let time_units = string_attribute(&time, "units")
        .ok_or_else(|| TableError::shape("'time' variable has no units"))?;
    let time_values = time.get_values::<f64, _>(..)?;

    let variables: Vec<StationSeries> = file
        .variables()
        .filter(|var| !EXCLUDED_VARIABLES.contains(&var.name().as_str()))
        .filter_map(|var| series(&var))
        .collect();
    tracing::debug!(
        times = time_values.len(),
        variables = variables.len(),
        "Decoded station dataset"
    );

    Ok(StationDataset {
        time_units,
        time_values,
        variables,
    })
}
