//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into import/export/extraction use cases.
//! - Keep CLI/UI layers decoupled from storage and wire details.

pub mod export_service;
pub mod extraction_service;
pub mod import_service;
