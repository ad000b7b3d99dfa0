// Object paths for stored artifacts
//
// Artifacts live at {container}/{folder}/{file}. The container is chosen when
// the storage handle is opened, so paths here are container-relative.

use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPath {
    pub folder: String,
    pub file: String,
}

impl ObjectPath {
    pub fn new(folder: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            file: file.into(),
        }
    }

    /// Same file name, different folder
    pub fn moved_to(&self, folder: &str) -> Self {
        Self::new(folder, self.file.clone())
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let folder = self.folder.trim_matches('/');
        if folder.is_empty() {
            f.write_str(&self.file)
        } else {
            write!(f, "{}/{}", folder, self.file)
        }
    }
}

/// `{stem}_{YYYY-MM-DD}.csv`
pub fn dated_file_name(stem: &str, date: NaiveDate) -> String {
    format!("{}_{}.csv", stem, date.format("%Y-%m-%d"))
}
