//! Read-only projections over the record collection.
//!
//! # Responsibility
//! - Provide list filtering as a pure query contract, independent of rendering.

pub mod query_view;
