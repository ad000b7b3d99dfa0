//! Core tabular model and reshaping logic for api2csv
//!
//! Everything in this crate is pure: no HTTP, no object storage. Sources
//! hand in decoded API payloads, this crate turns them into [`Table`]s, and
//! the storage layer persists the CSV bytes produced by [`codec`].

pub mod analytics;
pub mod artifact;
pub mod backend_report;
pub mod codec;
mod error;
pub mod insights;
pub mod knmi;
pub mod media;
pub mod merge;
mod table;

pub use artifact::{dated_file_name, ObjectPath};
pub use codec::{decode_csv, decode_csv_text, encode_csv, DELIMITER};
pub use error::{Result, TableError};
pub use merge::{merge_daily, MergeOutcome, DATE_COLUMN};
pub use table::{Row, Table, Value};
