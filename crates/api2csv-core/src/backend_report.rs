//! Parser for the CMS backend order report.
//!
//! The endpoint returns semicolon-separated text whose records may contain
//! raw newlines inside quoted fields, so newline splitting is unsafe. Every
//! record starts with a `dd-mm-yyyy hh:mm:ss` timestamp at the beginning of a
//! line; that is what delimits records here.

use crate::error::{Result, TableError};
use crate::table::{Table, Value};
use regex::Regex;
use tracing::debug;

const RECORD_START: &str = r#"(?m)^"?\d{2}-\d{2}-\d{4} \d{2}:\d{2}:\d{2}"#;
const TIMESTAMP: &str = r"^(\d{2})-(\d{2})-(\d{4}) (\d{2}:\d{2}:\d{2})$";

pub struct BackendReportParser {
    record_start: Regex,
    timestamp: Regex,
}

impl BackendReportParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            record_start: Regex::new(RECORD_START)?,
            timestamp: Regex::new(TIMESTAMP)?,
        })
    }

    pub fn parse(&self, text: &str) -> Result<Table> {
        let header_end = text.find('\n').unwrap_or(text.len());
        let columns = header_columns(&text[..header_end]);
        if columns.is_empty() {
            return Err(TableError::shape("backend report has no header row"));
        }
        let width = columns.len();
        let mut table = Table::new(columns);

        let body = &text[header_end..];
        let starts: Vec<usize> = self.record_start.find_iter(body).map(|m| m.start()).collect();
        debug!(records = starts.len(), columns = width, "Parsing backend report");

        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(body.len());
            let record = body[start..end].trim_end_matches(['\r', '\n']);

            let mut cells: Vec<Value> = record
                .split(';')
                .take(width)
                .map(|raw| self.clean_cell(raw))
                .collect();
            cells.resize(width, Value::Null);
            table.push_row(cells)?;
        }

        Ok(table)
    }

    fn clean_cell(&self, raw: &str) -> Value {
        let cell = raw.trim_matches('"');
        if cell.is_empty() {
            return Value::Null;
        }
        if let Some(caps) = self.timestamp.captures(cell) {
            return Value::Text(format!(
                "{}-{}-{} {}",
                &caps[3], &caps[2], &caps[1], &caps[4]
            ));
        }
        Value::Text(cell.replace('\n', ":").replace('\r', "-"))
    }
}

fn header_columns(line: &str) -> Vec<String> {
    let mut columns: Vec<String> = line
        .trim_end_matches('\r')
        .split(';')
        .map(|c| c.trim_matches('"').to_string())
        .collect();
    while columns.last().is_some_and(|c| c.is_empty()) {
        columns.pop();
    }
    columns
}

/// Parse a full report body.
pub fn parse_backend_report(text: &str) -> Result<Table> {
    BackendReportParser::new()?.parse(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\"Besteldatum\";\"Klant\";\"Opmerking\";\"Bedrag\";\n\
        \"01-03-2024 09:15:00\";\"Jansen\";\"rood\";\"12,50\";\n\
        \"02-03-2024 17:40:10\";\"De Vries\";\"regel1\nregel2\";\"7,00\";\"extra\"\n";

    #[test]
    fn test_header_and_records() {
        let table = parse_backend_report(REPORT).unwrap();

        assert_eq!(table.columns(), &["Besteldatum", "Klant", "Opmerking", "Bedrag"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "Besteldatum"), Some(&Value::from("2024-03-01 09:15:00")));
        assert_eq!(table.get(0, "Bedrag"), Some(&Value::from("12,50")));
    }

    #[test]
    fn test_embedded_newline_stays_in_record() {
        let table = parse_backend_report(REPORT).unwrap();
        assert_eq!(table.get(1, "Opmerking"), Some(&Value::from("regel1:regel2")));
        // extra trailing field is cut to header width
        assert_eq!(table.row(1).unwrap().cells().len(), 4);
    }

    #[test]
    fn test_carriage_returns() {
        let text = "a;b\r\n01-01-2024 00:00:00;x\ry\r\n";
        let table = parse_backend_report(text).unwrap();
        assert_eq!(table.columns(), &["a", "b"]);
        assert_eq!(table.get(0, "b"), Some(&Value::from("x-y")));
    }

    #[test]
    fn test_short_record_padded() {
        let table = parse_backend_report("a;b;c\n05-05-2024 10:00:00;x\n").unwrap();
        assert_eq!(table.get(0, "c"), Some(&Value::Null));
    }

    #[test]
    fn test_header_only() {
        let table = parse_backend_report("a;b\n").unwrap();
        assert!(table.is_empty());
        assert!(parse_backend_report("").is_err());
    }
}
