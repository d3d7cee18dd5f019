//! Core record repository for Steinplan machine-setting forms.
//! This crate is the single source of truth for record identity, schema
//! reconciliation, import/export and extraction hand-off.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod payload;
pub mod repo;
pub mod search;
pub mod service;

pub use config::{ConfigError, CoreConfig, DEFAULT_STORAGE_KEY};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::record::{Record, RecordId, RecordSummary, UnknownFieldError};
pub use model::schema::{canonical_default, field_spec, reconcile, FieldKind, FieldSpec};
pub use payload::{ImagePayload, InputSlot, PayloadError, PayloadReader};
pub use repo::blob_store::{BlobStore, RepoError, RepoResult, SqliteBlobStore};
pub use repo::record_store::{
    DeleteOutcome, FlushStatus, LoadStatus, RecordStore, StoreError, StoreResult, UpsertKind,
    UpsertOutcome,
};
pub use search::query_view::filter_records;
pub use service::export_service::{
    export_file_name, serialize_records, write_export, write_export_today, ExportError,
};
pub use service::extraction_service::{
    ExtractionAdapter, ExtractionClient, ExtractionError, ExtractionOutcome, ExtractionRequest,
    TransportError,
};
pub use service::import_service::{
    import_file, import_json, merge_batch, ImportError, ImportOutcome,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
