//! Additive import of externally supplied record batches.
//!
//! # Responsibility
//! - Validate the structural shape of an import document.
//! - Merge new records into the store by id without touching existing ones.
//!
//! # Invariants
//! - Import never replaces or deletes a record already in the store.
//! - Elements without an id, or whose id is already known (in the store or
//!   earlier in the same batch), are skipped.
//! - Accepted records are appended in batch order with one durable rewrite;
//!   a rejected document causes no mutation at all.

use crate::model::schema;
use crate::payload::{InputSlot, PayloadError, PayloadReader};
use crate::repo::blob_store::BlobStore;
use crate::repo::record_store::{json_kind, FlushStatus, RecordStore};
use log::{info, warn};
use serde_json::Value;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Structural failure of an import document.
#[derive(Debug)]
pub enum ImportError {
    /// The document is valid JSON but not an array.
    NotAnArray { found: &'static str },
    /// The document is not valid JSON.
    InvalidJson(serde_json::Error),
    /// The import file could not be read as text.
    Unreadable(PayloadError),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnArray { found } => write!(
                f,
                "import file must be an array of records, found {found}"
            ),
            Self::InvalidJson(err) => write!(f, "import file is not valid JSON: {err}"),
            Self::Unreadable(err) => write!(f, "import file could not be read: {err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotAnArray { .. } => None,
            Self::InvalidJson(err) => Some(err),
            Self::Unreadable(err) => Some(err),
        }
    }
}

impl From<PayloadError> for ImportError {
    fn from(value: PayloadError) -> Self {
        Self::Unreadable(value)
    }
}

/// Result of a structurally valid import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    /// At least one record was appended.
    Imported {
        imported: usize,
        skipped: usize,
        flush: FlushStatus,
    },
    /// Every element was already known or lacked an id; the store is unchanged.
    NothingNew { skipped: usize },
}

/// Merges a raw JSON batch into the store.
///
/// # Errors
/// - `ImportError::NotAnArray` when `batch` is not a JSON array.
pub fn merge_batch<S: BlobStore>(
    store: &mut RecordStore<S>,
    batch: &Value,
) -> Result<ImportOutcome, ImportError> {
    let items = batch.as_array().ok_or_else(|| {
        warn!(
            "event=import_merge module=service status=rejected error_code=not_an_array found={}",
            json_kind(batch)
        );
        ImportError::NotAnArray {
            found: json_kind(batch),
        }
    })?;

    let mut known: HashSet<String> = store
        .all()
        .iter()
        .map(|record| record.id().as_str().to_string())
        .collect();

    let accepted: Vec<_> = items
        .iter()
        .map(schema::reconcile)
        .filter(|record| !record.is_draft() && known.insert(record.id().as_str().to_string()))
        .collect();
    let skipped = items.len() - accepted.len();

    if accepted.is_empty() {
        info!(
            "event=import_merge module=service status=noop received={} skipped={}",
            items.len(),
            skipped
        );
        return Ok(ImportOutcome::NothingNew { skipped });
    }

    let imported = accepted.len();
    let flush = store.append_all(accepted);
    info!(
        "event=import_merge module=service status=ok received={} imported={} skipped={} flushed={}",
        items.len(),
        imported,
        skipped,
        flush == FlushStatus::Flushed
    );
    Ok(ImportOutcome::Imported {
        imported,
        skipped,
        flush,
    })
}

/// Parses import document text and merges it into the store.
pub fn import_json<S: BlobStore>(
    store: &mut RecordStore<S>,
    text: &str,
) -> Result<ImportOutcome, ImportError> {
    let batch: Value = serde_json::from_str(text).map_err(|err| {
        warn!("event=import_merge module=service status=rejected error_code=invalid_json error={err}");
        ImportError::InvalidJson(err)
    })?;
    merge_batch(store, &batch)
}

/// Reads an import file through the `Import` slot and merges it.
pub fn import_file<S: BlobStore>(
    store: &mut RecordStore<S>,
    reader: &PayloadReader,
    path: impl AsRef<Path>,
) -> Result<ImportOutcome, ImportError> {
    let text = reader.read_text(InputSlot::Import, path)?;
    import_json(store, &text)
}
