//! Repository layer: durable blob storage and the record collection owner.
//!
//! # Responsibility
//! - Define the blob store contract and its SQLite implementation.
//! - Keep the authoritative record collection and its durable mirror in sync.
//!
//! # Invariants
//! - The record collection is persisted as one whole blob per mutation.
//! - Repository APIs never panic on corrupt or missing durable state.

pub mod blob_store;
pub mod record_store;
