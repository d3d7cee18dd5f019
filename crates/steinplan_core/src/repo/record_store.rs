//! Authoritative record collection with a whole-blob durable mirror.
//!
//! # Responsibility
//! - Own the in-memory record collection for one session.
//! - Mirror every mutation to the blob store as one full rewrite.
//! - Recover from unreadable durable state without failing the caller.
//!
//! # Invariants
//! - No two records in the collection share an id.
//! - Drafts (empty id) never enter the collection.
//! - Insertion order is preserved; replacements keep their position.
//! - A failed write never rolls back the in-memory mutation; it leaves a
//!   pending flush that the next successful write clears.

use crate::config::DEFAULT_STORAGE_KEY;
use crate::model::record::{Record, RecordId};
use crate::model::schema;
use crate::repo::blob_store::BlobStore;
use crate::search::query_view::filter_records;
use log::{debug, error, info, warn};
use serde_json::Value;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const CORRUPT_BACKUP_SUFFIX: &str = ".corrupt";

pub type StoreResult<T> = Result<T, StoreError>;

/// Rejected store mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The record has no id and therefore cannot be persisted.
    DraftRecord,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DraftRecord => write!(f, "draft records without an id cannot be stored"),
        }
    }
}

impl Error for StoreError {}

/// Whether the durable mirror matches the in-memory collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushStatus {
    Flushed,
    /// The last write failed; memory is ahead of the durable mirror.
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertKind {
    Inserted,
    Replaced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub kind: UpsertKind,
    pub flush: FlushStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// `false` when no record carried the id.
    pub removed: bool,
    pub flush: FlushStatus,
}

/// How the collection was obtained from durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// No blob stored yet; the collection starts empty.
    Missing,
    Loaded { count: usize },
    /// The blob could not be read or parsed; the collection was reset to empty.
    Recovered { reason: String },
}

/// Session-scoped owner of the record collection.
pub struct RecordStore<S: BlobStore> {
    blobs: S,
    key: String,
    records: Vec<Record>,
    load_status: LoadStatus,
    pending_flush: bool,
}

impl<S: BlobStore> RecordStore<S> {
    /// Opens the store under the default storage key and loads the collection.
    pub fn open(blobs: S) -> Self {
        Self::open_with_key(blobs, DEFAULT_STORAGE_KEY)
    }

    /// Opens the store under `key` and loads the collection.
    pub fn open_with_key(blobs: S, key: impl Into<String>) -> Self {
        let mut store = Self {
            blobs,
            key: key.into(),
            records: Vec::new(),
            load_status: LoadStatus::Missing,
            pending_flush: false,
        };
        store.reload();
        store
    }

    /// Re-reads the durable blob, replacing the in-memory collection.
    ///
    /// Never fails: unreadable state is logged, backed up and replaced by an
    /// empty collection.
    pub fn reload(&mut self) -> &LoadStatus {
        let started_at = Instant::now();
        let (records, status, repaired) = match self.blobs.read(&self.key) {
            Ok(None) => (Vec::new(), LoadStatus::Missing, false),
            Ok(Some(blob)) => match parse_blob(&blob) {
                Ok(ParsedBlob { records, repaired }) => {
                    let count = records.len();
                    (records, LoadStatus::Loaded { count }, repaired)
                }
                Err(reason) => {
                    self.backup_corrupt_blob(&blob);
                    (Vec::new(), LoadStatus::Recovered { reason }, false)
                }
            },
            Err(err) => (
                Vec::new(),
                LoadStatus::Recovered {
                    reason: format!("read failed: {err}"),
                },
                false,
            ),
        };

        match &status {
            LoadStatus::Recovered { reason } => warn!(
                "event=store_load module=repo status=recovered key={} duration_ms={} reason={}",
                self.key,
                started_at.elapsed().as_millis(),
                reason
            ),
            _ => info!(
                "event=store_load module=repo status=ok key={} count={} duration_ms={}",
                self.key,
                records.len(),
                started_at.elapsed().as_millis()
            ),
        }

        self.records = records;
        self.pending_flush = false;
        self.load_status = status;
        if repaired {
            // Ids assigned during load must survive the next session.
            self.flush();
        }
        &self.load_status
    }

    /// Returns the outcome of the last load.
    pub fn load_status(&self) -> &LoadStatus {
        &self.load_status
    }

    /// Returns the collection in insertion order.
    pub fn all(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|record| record.id().as_str() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Returns records whose display name contains `needle`, case-insensitively.
    pub fn query(&self, needle: &str) -> Vec<&Record> {
        filter_records(&self.records, needle)
    }

    /// Inserts or fully replaces a record keyed by its id, then flushes.
    ///
    /// # Errors
    /// - `StoreError::DraftRecord` when `record` has no id.
    pub fn upsert(&mut self, record: Record) -> StoreResult<UpsertOutcome> {
        if record.is_draft() {
            return Err(StoreError::DraftRecord);
        }

        let kind = match self.position(record.id()) {
            Some(index) => {
                self.records[index] = record;
                UpsertKind::Replaced
            }
            None => {
                self.records.push(record);
                UpsertKind::Inserted
            }
        };

        let flush = self.flush();
        Ok(UpsertOutcome { kind, flush })
    }

    /// Removes the record with `id` if present, then flushes.
    pub fn delete(&mut self, id: &str) -> DeleteOutcome {
        let before = self.records.len();
        self.records.retain(|record| record.id().as_str() != id);
        let removed = self.records.len() != before;

        let flush = self.flush();
        DeleteOutcome { removed, flush }
    }

    /// Rewrites the full collection to the blob store.
    ///
    /// Failures are logged and leave a pending flush; they never undo
    /// in-memory state.
    pub fn flush(&mut self) -> FlushStatus {
        let started_at = Instant::now();
        let result = serde_json::to_string(&self.records)
            .map_err(|err| err.to_string())
            .and_then(|blob| {
                self.blobs
                    .write(&self.key, &blob)
                    .map_err(|err| err.to_string())
            });

        match result {
            Ok(()) => {
                self.pending_flush = false;
                debug!(
                    "event=store_flush module=repo status=ok key={} count={} duration_ms={}",
                    self.key,
                    self.records.len(),
                    started_at.elapsed().as_millis()
                );
                FlushStatus::Flushed
            }
            Err(err) => {
                self.pending_flush = true;
                error!(
                    "event=store_flush module=repo status=error key={} count={} duration_ms={} error={}",
                    self.key,
                    self.records.len(),
                    started_at.elapsed().as_millis(),
                    err
                );
                FlushStatus::Pending
            }
        }
    }

    /// Returns whether the durable mirror is behind the in-memory collection.
    pub fn has_pending_flush(&self) -> bool {
        self.pending_flush
    }

    /// Appends already-validated records and flushes once.
    ///
    /// Callers guarantee every record has a fresh, non-draft id.
    pub(crate) fn append_all(&mut self, records: Vec<Record>) -> FlushStatus {
        debug_assert!(records
            .iter()
            .all(|record| !record.is_draft() && !self.contains(record.id().as_str())));
        self.records.extend(records);
        self.flush()
    }

    fn position(&self, id: &RecordId) -> Option<usize> {
        self.records.iter().position(|record| record.id() == id)
    }

    fn backup_corrupt_blob(&self, blob: &str) {
        let backup_key = format!("{}{CORRUPT_BACKUP_SUFFIX}", self.key);
        match self.blobs.write(&backup_key, blob) {
            Ok(()) => warn!(
                "event=store_backup module=repo status=ok key={} backup_key={} bytes={}",
                self.key,
                backup_key,
                blob.len()
            ),
            Err(err) => error!(
                "event=store_backup module=repo status=error key={} backup_key={} error={}",
                self.key, backup_key, err
            ),
        }
    }
}

#[derive(Debug)]
struct ParsedBlob {
    records: Vec<Record>,
    /// An id was assigned or a duplicate dropped; the blob needs a rewrite.
    repaired: bool,
}

/// Parses the durable blob into reconciled records.
///
/// Stored records without an id receive a fresh one; later duplicates of an
/// id already seen are dropped so the identity invariant holds after load.
fn parse_blob(blob: &str) -> Result<ParsedBlob, String> {
    let value: Value = serde_json::from_str(blob).map_err(|err| format!("invalid json: {err}"))?;
    let items = match value {
        Value::Array(items) => items,
        other => return Err(format!("expected array, found {}", json_kind(&other))),
    };

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(items.len());
    let mut repaired = false;
    for item in &items {
        let mut record = schema::reconcile(item);
        if record.is_draft() {
            record = record.persisted_copy();
            repaired = true;
            warn!(
                "event=store_load module=repo status=repaired reason=missing_id assigned_id={}",
                record.id()
            );
        }
        if !seen.insert(record.id().clone()) {
            warn!(
                "event=store_load module=repo status=repaired reason=duplicate_id id={}",
                record.id()
            );
            repaired = true;
            continue;
        }
        records.push(record);
    }
    Ok(ParsedBlob { records, repaired })
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
