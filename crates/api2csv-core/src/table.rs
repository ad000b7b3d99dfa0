// Tabular model shared by every ingestion job
//
// A Table is an ordered list of named columns and an ordered list of rows.
// Each row holds exactly one Value per column.

use crate::error::{Result, TableError};
use std::fmt;

/// A single cell value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert a JSON scalar into a cell. Arrays and objects are kept as their
    /// JSON text so nothing is silently dropped.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Text(b.to_string()),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    n.as_f64().map(Value::Float).unwrap_or(Value::Null)
                }
            }
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }

    /// Infer a cell from CSV text: empty is null, then integer, then finite
    /// float, otherwise text.
    pub fn parse_cell(raw: &str) -> Self {
        if raw.is_empty() {
            return Value::Null;
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Value::Int(i);
        }
        match raw.parse::<f64>() {
            Ok(f) if f.is_finite() => Value::Float(f),
            _ => Value::Text(raw.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            Value::Null => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(i) => write!(f, "{}", i),
            // Debug keeps the trailing ".0" so floats survive a CSV round trip
            Value::Float(v) => write!(f, "{:?}", v),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// Borrowed view of one row with name-based access
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    cells: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.cells[idx])
    }

    pub fn cells(&self) -> &'a [Value] {
        self.cells
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
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

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    fn require_column(&self, column: &str) -> Result<usize> {
        self.column_index(column)
            .ok_or_else(|| TableError::unknown_column(column, &self.columns))
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |cells| Row {
            columns: &self.columns,
            cells,
        })
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|cells| Row {
            columns: &self.columns,
            cells,
        })
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|cells| &cells[idx])
    }

    /// All values of one column, top to bottom
    pub fn column_values(&self, column: &str) -> Result<Vec<&Value>> {
        let idx = self.require_column(column)?;
        Ok(self.rows.iter().map(|cells| &cells[idx]).collect())
    }

    pub fn push_row(&mut self, cells: Vec<Value>) -> Result<()> {
        if cells.len() != self.columns.len() {
            return Err(TableError::RowWidth {
                expected: self.columns.len(),
                actual: cells.len(),
            });
        }
        self.rows.push(cells);
        Ok(())
    }

    /// Push a row given as (column, value) pairs. Columns the table does not
    /// know are ignored and absent columns are null.
    pub fn push_named<'a, I>(&mut self, cells: I)
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let mut row = vec![Value::Null; self.columns.len()];
        for (name, value) in cells {
            if let Some(idx) = self.column_index(name) {
                row[idx] = value;
            }
        }
        self.rows.push(row);
    }

    /// Row-wise concatenation. Columns are the union of both tables (this
    /// table's order first); cells a side does not have become null.
    pub fn concat(mut self, other: Table) -> Table {
        for column in &other.columns {
            if self.column_index(column).is_none() {
                self.columns.push(column.clone());
                for row in &mut self.rows {
                    row.push(Value::Null);
                }
            }
        }

        let mapping: Vec<usize> = other
            .columns
            .iter()
            .map(|c| self.column_index(c).unwrap_or_default())
            .collect();

        for other_row in other.rows {
            let mut row = vec![Value::Null; self.columns.len()];
            for (value, &idx) in other_row.into_iter().zip(&mapping) {
                row[idx] = value;
            }
            self.rows.push(row);
        }
        self
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(Row<'_>) -> bool,
    {
        let columns = &self.columns;
        self.rows.retain(|cells| keep(Row { columns, cells }));
    }

    /// Drop every row holding a null in any of the named columns.
    pub fn drop_incomplete<S: AsRef<str>>(mut self, required: &[S]) -> Result<Table> {
        let indices = required
            .iter()
            .map(|c| self.require_column(c.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        self.rows
            .retain(|cells| indices.iter().all(|&idx| !cells[idx].is_null()));
        Ok(self)
    }

    /// Replace every value of a column through `f`.
    pub fn map_column<F>(&mut self, column: &str, mut f: F) -> Result<()>
    where
        F: FnMut(&Value) -> Value,
    {
        let idx = self.require_column(column)?;
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
        Ok(())
    }

    /// Append a column computed from each row.
    pub fn add_column<F>(&mut self, column: impl Into<String>, mut f: F)
    where
        F: FnMut(Row<'_>) -> Value,
    {
        let values: Vec<Value> = self.rows().map(&mut f).collect();
        self.columns.push(column.into());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
    }

    /// Caller guarantees every row is `columns.len()` wide.
    pub(crate) fn from_parts(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self { columns, rows }
    }

    pub(crate) fn raw_rows(&self) -> &[Vec<Value>] {
        &self.rows
    }
}
