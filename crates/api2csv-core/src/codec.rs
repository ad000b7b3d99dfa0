//! Semicolon-delimited CSV encoding for stored artifacts
//!
//! Every artifact carries a header row. Decoding infers cell types with
//! [`Value::parse_cell`], so a table read back from storage compares equal to
//! the one that was written as long as it only held nulls, integers, floats
//! and non-numeric text.

use crate::error::Result;
use crate::table::{Table, Value};
use csv::{ReaderBuilder, WriterBuilder};

pub const DELIMITER: u8 = b';';

pub fn encode_csv(table: &Table) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(table.columns())?;
    for row in table.raw_rows() {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }

    writer.into_inner().map_err(|e| e.into_error().into())
}

/// Decode a stored artifact. Empty input yields an empty table with no
/// columns. Short rows are padded with nulls.
pub fn decode_csv(bytes: &[u8]) -> Result<Table> {
    decode_with(bytes, Value::parse_cell)
}

/// Decode keeping every non-empty cell as its stored text.
///
/// Used when a file is rewritten, so untouched rows keep their exact
/// spelling (`007`, `1.50`, integers wider than `i64`).
pub fn decode_csv_text(bytes: &[u8]) -> Result<Table> {
    decode_with(bytes, |raw| {
        if raw.is_empty() {
            Value::Null
        } else {
            Value::Text(raw.to_string())
        }
    })
}

fn decode_with(bytes: &[u8], cell: fn(&str) -> Value) -> Result<Table> {
    let mut reader = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    let mut table = Table::new(headers.iter());
    let width = table.columns().len();

    for record in reader.records() {
        let record = record?;
        let mut cells: Vec<Value> = record.iter().take(width).map(cell).collect();
        cells.resize(width, Value::Null);
        table.push_row(cells)?;
    }

    Ok(table)
}
