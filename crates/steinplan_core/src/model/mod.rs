//! Record domain model and canonical schema.
//!
//! # Responsibility
//! - Define the canonical record shape used by storage, import, export and
//!   extraction.
//! - Own the single reconciliation point from raw JSON to typed records.
//!
//! # Invariants
//! - Every materialized record carries exactly the canonical field set.
//! - Raw JSON is never trusted past `schema::reconcile`.

pub mod record;
pub mod schema;
