//! Portable JSON snapshots of the record collection.
//!
//! # Responsibility
//! - Render the full collection as a pretty-printed, re-importable document.
//! - Name and write export files.
//!
//! # Invariants
//! - Export contains every record in store order with the full field set.
//! - `reconcile` of each exported element equals the original record.

use crate::model::record::Record;
use chrono::{NaiveDate, Utc};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const EXPORT_FILE_PREFIX: &str = "steinplan-export-";
const EXPORT_FILE_SUFFIX: &str = ".json";

/// Export failure.
#[derive(Debug)]
pub enum ExportError {
    /// The collection is empty; there is nothing worth writing.
    NothingToExport,
    Serialize(serde_json::Error),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NothingToExport => write!(f, "there are no records to export"),
            Self::Serialize(err) => write!(f, "failed to serialize records: {err}"),
            Self::Io { path, source } => {
                write!(f, "failed to write export `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NothingToExport => None,
            Self::Serialize(err) => Some(err),
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialize(value)
    }
}

/// Serializes `records` as a pretty-printed JSON array.
pub fn serialize_records(records: &[Record]) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// Returns the export file name for `date`: `steinplan-export-YYYY-MM-DD.json`.
pub fn export_file_name(date: NaiveDate) -> String {
    format!(
        "{EXPORT_FILE_PREFIX}{}{EXPORT_FILE_SUFFIX}",
        date.format("%Y-%m-%d")
    )
}

/// Writes the export document for `records` into `dir`, named for `date`.
///
/// # Errors
/// - `ExportError::NothingToExport` when `records` is empty.
/// - `ExportError::Io` when the file cannot be written.
pub fn write_export(
    records: &[Record],
    dir: impl AsRef<Path>,
    date: NaiveDate,
) -> Result<PathBuf, ExportError> {
    if records.is_empty() {
        return Err(ExportError::NothingToExport);
    }

    let document = serialize_records(records)?;
    let path = dir.as_ref().join(export_file_name(date));
    if let Err(source) = std::fs::write(&path, document.as_bytes()) {
        error!(
            "event=export_write module=service status=error count={} error={}",
            records.len(),
            source
        );
        return Err(ExportError::Io { path, source });
    }

    info!(
        "event=export_write module=service status=ok count={} bytes={}",
        records.len(),
        document.len()
    );
    Ok(path)
}

/// Writes the export document into `dir`, named for the current UTC date.
pub fn write_export_today(
    records: &[Record],
    dir: impl AsRef<Path>,
) -> Result<PathBuf, ExportError> {
    write_export(records, dir, Utc::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::{export_file_name, serialize_records};
    use chrono::NaiveDate;

    #[test]
    fn file_name_uses_iso_date() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 7).unwrap();
        assert_eq!(export_file_name(date), "steinplan-export-2025-01-07.json");
    }

    #[test]
    fn empty_collection_serializes_to_empty_array() {
        assert_eq!(serialize_records(&[]).unwrap(), "[]");
    }
}
