//! File payload reads with per-slot single-flight discipline.
//!
//! # Responsibility
//! - Read import files as UTF-8 text and images as base64 payloads.
//! - Convert image payloads to and from the data-URL form stored in records.
//!
//! # Invariants
//! - At most one read is in flight per `InputSlot`; a second start is
//!   rejected with `PayloadError::InFlight`.
//! - A slot is released on every exit path, including unwinding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::{error, info};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

static DATA_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^data:([A-Za-z0-9.+-]+/[A-Za-z0-9.+-]+)?;base64,(.*)$")
        .expect("valid data url regex")
});

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Independent input channels that may each have one read in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputSlot {
    /// JSON import file.
    Import,
    /// Photographed form sent to extraction.
    Scan,
    /// Attachment appended to a record's image list.
    Attachment,
    /// Photo for the record's single-image slot.
    SingleImage,
}

impl InputSlot {
    const COUNT: usize = 4;

    fn index(self) -> usize {
        match self {
            Self::Import => 0,
            Self::Scan => 1,
            Self::Attachment => 2,
            Self::SingleImage => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::Scan => "scan",
            Self::Attachment => "attachment",
            Self::SingleImage => "single_image",
        }
    }
}

/// File read failure.
#[derive(Debug)]
pub enum PayloadError {
    /// Another read is already running on this slot.
    InFlight(InputSlot),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// File content is not valid UTF-8 text.
    NotText { path: PathBuf },
}

impl Display for PayloadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InFlight(slot) => {
                write!(f, "a read is already in flight on slot `{}`", slot.as_str())
            }
            Self::Io { path, source } => {
                write!(f, "failed to read `{}`: {source}", path.display())
            }
            Self::NotText { path } => {
                write!(f, "file `{}` is not valid UTF-8 text", path.display())
            }
        }
    }
}

impl Error for PayloadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Binary image content encoded as base64 text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImagePayload {
    pub mime_type: String,
    /// Standard base64 without a data-URL prefix.
    pub base64: String,
}

impl ImagePayload {
    /// Encodes raw image bytes.
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            base64: STANDARD.encode(bytes),
        }
    }

    /// Parses a `data:<mime>;base64,<payload>` URL as stored in records.
    pub fn from_data_url(url: &str) -> Option<Self> {
        let captures = DATA_URL_RE.captures(url.trim())?;
        let mime_type = captures.get(1).map_or(FALLBACK_MIME_TYPE, |m| m.as_str());
        let payload = captures.get(2)?.as_str();
        Some(Self {
            mime_type: mime_type.to_string(),
            base64: payload.to_string(),
        })
    }

    /// Renders the data-URL form stored in `Record::images`.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }

    /// Decodes the payload back to bytes. Returns `None` for invalid base64.
    pub fn decode(&self) -> Option<Vec<u8>> {
        STANDARD.decode(self.base64.as_bytes()).ok()
    }
}

/// Holds one input slot busy until dropped.
pub struct SlotGuard<'a> {
    slot: InputSlot,
    flag: &'a AtomicBool,
}

impl SlotGuard<'_> {
    pub fn slot(&self) -> InputSlot {
        self.slot
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Reads file payloads, allowing one in-flight read per input slot.
#[derive(Debug, Default)]
pub struct PayloadReader {
    in_flight: [AtomicBool; InputSlot::COUNT],
}

impl PayloadReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `slot` busy, e.g. while a file picker for it is open.
    ///
    /// # Errors
    /// - `PayloadError::InFlight` when the slot is already busy.
    pub fn try_acquire(&self, slot: InputSlot) -> Result<SlotGuard<'_>, PayloadError> {
        let flag = &self.in_flight[slot.index()];
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PayloadError::InFlight(slot))?;
        Ok(SlotGuard { slot, flag })
    }

    pub fn is_busy(&self, slot: InputSlot) -> bool {
        self.in_flight[slot.index()].load(Ordering::Acquire)
    }

    /// Reads a whole file as UTF-8 text.
    pub fn read_text(
        &self,
        slot: InputSlot,
        path: impl AsRef<Path>,
    ) -> Result<String, PayloadError> {
        let _guard = self.try_acquire(slot)?;
        let path = path.as_ref();
        let bytes = read_logged(slot, path)?;
        String::from_utf8(bytes).map_err(|_| {
            error!(
                "event=payload_read module=payload status=error slot={} error_code=not_text",
                slot.as_str()
            );
            PayloadError::NotText {
                path: path.to_path_buf(),
            }
        })
    }

    /// Reads a whole image file as a base64 payload.
    ///
    /// The mime type is inferred from the file extension.
    pub fn read_image(
        &self,
        slot: InputSlot,
        path: impl AsRef<Path>,
    ) -> Result<ImagePayload, PayloadError> {
        let _guard = self.try_acquire(slot)?;
        let path = path.as_ref();
        let bytes = read_logged(slot, path)?;
        Ok(ImagePayload::from_bytes(mime_type_for_path(path), &bytes))
    }
}

fn read_logged(slot: InputSlot, path: &Path) -> Result<Vec<u8>, PayloadError> {
    match std::fs::read(path) {
        Ok(bytes) => {
            info!(
                "event=payload_read module=payload status=ok slot={} bytes={}",
                slot.as_str(),
                bytes.len()
            );
            Ok(bytes)
        }
        Err(source) => {
            error!(
                "event=payload_read module=payload status=error slot={} error_code=io error={}",
                slot.as_str(),
                source
            );
            Err(PayloadError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}

fn mime_type_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        Some("bmp") => "image/bmp",
        _ => FALLBACK_MIME_TYPE,
    }
}
