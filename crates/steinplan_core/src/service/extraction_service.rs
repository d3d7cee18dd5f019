//! Boundary to the external image-to-record extraction collaborator.
//!
//! # Responsibility
//! - Build the extraction request (image, field instruction, response schema).
//! - Turn the collaborator's JSON answer into a fresh draft record.
//! - Enforce single-flight: one extraction per adapter at a time.
//!
//! # Invariants
//! - Output is always a draft: empty id, no images, no single image.
//! - Choice fields named in the response are snapped to a documented option
//!   or left empty.
//! - Transport and parse failures collapse into one recoverable
//!   `ExtractionError::Failed`; the caller can always fall back to manual entry.
//!
//! # See also
//! - `model::schema::reconcile`

use crate::model::record::Record;
use crate::model::schema::{self, FieldKind, CANONICAL_FIELDS};
use crate::payload::ImagePayload;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

static CODE_FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z]*\s*(.*?)\s*```\s*$").expect("valid code fence regex")
});

static INSTRUCTION: Lazy<String> = Lazy::new(build_instruction);
static RESPONSE_SCHEMA: Lazy<Value> = Lazy::new(build_response_schema);

const MANUAL_ENTRY_NOTICE: &str =
    "the form could not be read automatically; please fill it in manually";

/// One request to the extraction collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRequest {
    pub image: ImagePayload,
    /// Natural-language extraction instruction naming every canonical field.
    pub instruction: String,
    /// JSON schema of the expected response object.
    pub response_schema: Value,
}

impl ExtractionRequest {
    pub fn new(image: ImagePayload) -> Self {
        Self {
            image,
            instruction: INSTRUCTION.clone(),
            response_schema: RESPONSE_SCHEMA.clone(),
        }
    }
}

/// Transport-level failure reported by an `ExtractionClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError(pub String);

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error for TransportError {}

/// Opaque request/response channel to the image-understanding service.
///
/// Implementations block until the collaborator answers or fails.
pub trait ExtractionClient {
    /// Sends `request` and returns the raw response text.
    fn send(&self, request: &ExtractionRequest) -> Result<String, TransportError>;
}

/// Recoverable extraction failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// Another extraction is still running on this adapter.
    InFlight,
    /// Transport, parse or shape failure of the round trip.
    Failed { reason: String },
}

impl Display for ExtractionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InFlight => write!(f, "an extraction is already in progress"),
            Self::Failed { reason } => write!(f, "extraction failed: {reason}"),
        }
    }
}

impl Error for ExtractionError {}

/// Draft produced by `ExtractionAdapter::extract_or_manual`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Extracted(Record),
    /// Extraction failed; `draft` is blank and `notice` explains why.
    ManualEntry { draft: Record, notice: String },
}

impl ExtractionOutcome {
    pub fn into_draft(self) -> Record {
        match self {
            Self::Extracted(draft) | Self::ManualEntry { draft, .. } => draft,
        }
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Single-flight wrapper around an `ExtractionClient`.
pub struct ExtractionAdapter<C: ExtractionClient> {
    client: C,
    busy: AtomicBool,
}

impl<C: ExtractionClient> ExtractionAdapter<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            busy: AtomicBool::new(false),
        }
    }

    /// Returns whether an extraction is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Extracts a draft record from `image`.
    ///
    /// # Errors
    /// - `ExtractionError::InFlight` when another extraction is running.
    /// - `ExtractionError::Failed` for transport or response failures.
    pub fn extract(&self, image: &ImagePayload) -> Result<Record, ExtractionError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| {
                warn!("event=extraction module=service status=rejected error_code=in_flight");
                ExtractionError::InFlight
            })?;
        let _guard = BusyGuard(&self.busy);

        let started_at = Instant::now();
        info!(
            "event=extraction module=service status=start mime_type={} bytes={}",
            image.mime_type,
            image.base64.len()
        );

        let request = ExtractionRequest::new(image.clone());
        let result = self
            .client
            .send(&request)
            .map_err(|err| format!("transport: {err}"))
            .and_then(|text| parse_response(&text));

        match result {
            Ok(draft) => {
                info!(
                    "event=extraction module=service status=ok duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(draft)
            }
            Err(reason) => {
                warn!(
                    "event=extraction module=service status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    reason
                );
                Err(ExtractionError::Failed { reason })
            }
        }
    }

    /// Extracts a draft, falling back to a blank draft when extraction fails.
    ///
    /// # Errors
    /// - `ExtractionError::InFlight` only; every other failure becomes
    ///   `ExtractionOutcome::ManualEntry`.
    pub fn extract_or_manual(
        &self,
        image: &ImagePayload,
    ) -> Result<ExtractionOutcome, ExtractionError> {
        match self.extract(image) {
            Ok(draft) => Ok(ExtractionOutcome::Extracted(draft)),
            Err(ExtractionError::InFlight) => Err(ExtractionError::InFlight),
            Err(ExtractionError::Failed { .. }) => Ok(ExtractionOutcome::ManualEntry {
                draft: schema::canonical_default(),
                notice: MANUAL_ENTRY_NOTICE.to_string(),
            }),
        }
    }
}

/// Returns the fixed extraction instruction.
pub fn extraction_instruction() -> &'static str {
    INSTRUCTION.as_str()
}

/// Parses the collaborator's response text into a draft record.
///
/// Accepts a bare JSON object or one wrapped in a Markdown code fence.
pub fn parse_response(text: &str) -> Result<Record, String> {
    let body = CODE_FENCE_RE
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map_or(text, |m| m.as_str())
        .trim();

    let value: Value =
        serde_json::from_str(body).map_err(|err| format!("invalid json response: {err}"))?;
    let object = value
        .as_object()
        .ok_or_else(|| "response is not a json object".to_string())?;

    let mut draft = schema::reconcile(&value).into_draft();
    snap_choice_fields(&mut draft, object);
    Ok(draft)
}

fn snap_choice_fields(draft: &mut Record, response: &Map<String, Value>) {
    for (index, spec) in schema::choice_fields() {
        if !response.contains_key(spec.name) {
            continue;
        }
        let snapped = draft
            .get(spec.name)
            .and_then(|value| spec.snap_choice(value))
            .unwrap_or("");
        draft.set_at(index, snapped);
    }
}

fn build_instruction() -> String {
    let mut text = String::from(
        "Analyse this photo of a German technical form titled \
         \"Maschinen-Einstellparameter für Steinformate\". Extract the value of \
         every input field and return one JSON object whose keys are exactly the \
         field names listed below. Every value must be a string. Use an empty \
         string for fields that are blank or unreadable. Return nothing but the \
         JSON object.\n\nFields:\n",
    );
    for spec in CANONICAL_FIELDS {
        text.push_str(&format!("- {} ({})", spec.name, spec.label));
        match spec.kind {
            FieldKind::Choice { options, .. } => text.push_str(&format!(
                ": one of {}; use an empty string if none matches",
                options
                    .iter()
                    .map(|option| format!("'{option}'"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
            FieldKind::Numeric => text.push_str(": decimal number as text"),
            FieldKind::Date => text.push_str(": date as YYYY-MM-DD"),
            FieldKind::Text => {}
        }
        text.push('\n');
    }
    text
}

fn build_response_schema() -> Value {
    let properties: Map<String, Value> = CANONICAL_FIELDS
        .iter()
        .map(|spec| (spec.name.to_string(), json!({ "type": "string" })))
        .collect();
    json!({
        "type": "object",
        "properties": properties,
    })
}
