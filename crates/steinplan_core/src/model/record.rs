//! Record domain model.
//!
//! # Responsibility
//! - Define the canonical machine-setting record and its opaque identifier.
//! - Serialize records to the flat JSON wire shape shared by storage, export
//!   and import.
//!
//! # Invariants
//! - `values` is always aligned with `schema::CANONICAL_FIELDS`.
//! - An empty `id` marks a draft; a non-empty `id` never changes once assigned.
//! - Deserialization goes through `schema::reconcile` and therefore never
//!   rejects a well-formed JSON value.

use crate::model::schema::{
    self, FieldSpec, CANONICAL_FIELDS, DISPLAY_NAME_FIELD, ID_KEY, IMAGES_KEY, SINGLE_IMAGE_KEY,
};
use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const SUMMARY_PLACEHOLDER: &str = "N/A";

/// Opaque record identifier.
///
/// The empty identifier is reserved for drafts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(String);

impl RecordId {
    /// Wraps an existing identifier, e.g. one read from storage or an import file.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generates a fresh UUID v4 identifier for a locally created record.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the empty draft identifier.
    pub fn draft() -> Self {
        Self(String::new())
    }

    /// Returns whether this identifier marks an unsaved draft.
    pub fn is_draft(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Error returned when a caller names a field outside the canonical set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFieldError(pub String);

impl Display for UnknownFieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown record field `{}`", self.0)
    }
}

impl Error for UnknownFieldError {}

/// One machine-setting profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    id: RecordId,
    values: Vec<String>,
    images: Vec<String>,
    single_image: Option<String>,
}

/// List-row projection of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSummary {
    pub id: RecordId,
    pub display_name: String,
    pub art_nr: String,
    pub material: String,
    pub datum: String,
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl Record {
    pub(crate) fn from_parts(
        id: RecordId,
        values: Vec<String>,
        images: Vec<String>,
        single_image: Option<String>,
    ) -> Self {
        debug_assert_eq!(values.len(), CANONICAL_FIELDS.len());
        Self {
            id,
            values,
            images,
            single_image,
        }
    }

    /// Creates a manual-entry draft with `datum` set to `date`.
    pub fn blank_form(date: NaiveDate) -> Self {
        let mut record = schema::canonical_default();
        if let Some(index) = schema::field_index("datum") {
            record.set_at(index, date.format("%Y-%m-%d").to_string());
        }
        record
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// Returns whether this record has not been assigned an identifier yet.
    pub fn is_draft(&self) -> bool {
        self.id.is_draft()
    }

    /// Returns this record carrying `id`.
    ///
    /// Used by import/sync paths and tests where identity exists externally.
    pub fn with_id(mut self, id: impl Into<RecordId>) -> Self {
        self.id = id.into();
        self
    }

    /// Returns a copy ready for persistence.
    ///
    /// Drafts receive a freshly generated id; persisted records keep theirs.
    pub fn persisted_copy(&self) -> Self {
        let mut copy = self.clone();
        if copy.is_draft() {
            copy.id = RecordId::generate();
        }
        copy
    }

    /// Strips identity and embedded images, turning this record into a draft.
    pub fn into_draft(mut self) -> Self {
        self.id = RecordId::draft();
        self.images.clear();
        self.single_image = None;
        self
    }

    /// Returns the value of a canonical field.
    pub fn get(&self, field: &str) -> Option<&str> {
        schema::field_index(field).map(|index| self.values[index].as_str())
    }

    /// Replaces the value at a position of `schema::CANONICAL_FIELDS`.
    pub(crate) fn set_at(&mut self, index: usize, value: impl Into<String>) {
        self.values[index] = value.into();
    }

    /// Replaces the value of a canonical field.
    pub fn set(&mut self, field: &str, value: impl Into<String>) -> Result<(), UnknownFieldError> {
        let index =
            schema::field_index(field).ok_or_else(|| UnknownFieldError(field.to_string()))?;
        self.set_at(index, value);
        Ok(())
    }

    /// Returns the display name (`formatBezeichnung`).
    pub fn display_name(&self) -> &str {
        self.get(DISPLAY_NAME_FIELD).unwrap_or_default()
    }

    /// Iterates over canonical fields and their values in canonical order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static FieldSpec, &str)> + '_ {
        CANONICAL_FIELDS
            .iter()
            .zip(self.values.iter().map(String::as_str))
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    /// Appends an image payload at the end of the display order.
    pub fn add_image(&mut self, payload: impl Into<String>) {
        self.images.push(payload.into());
    }

    /// Removes the image at `index`, returning it when present.
    pub fn remove_image(&mut self, index: usize) -> Option<String> {
        if index < self.images.len() {
            Some(self.images.remove(index))
        } else {
            None
        }
    }

    pub fn single_image(&self) -> Option<&str> {
        self.single_image.as_deref()
    }

    /// Fills the single-image slot. An empty payload clears it.
    pub fn set_single_image(&mut self, payload: impl Into<String>) {
        let payload = payload.into();
        self.single_image = if payload.is_empty() {
            None
        } else {
            Some(payload)
        };
    }

    pub fn clear_single_image(&mut self) {
        self.single_image = None;
    }

    /// Builds the list-row projection, substituting `N/A` for empty values.
    pub fn summary(&self) -> RecordSummary {
        let or_placeholder = |field: &str| {
            let value = self.get(field).unwrap_or_default();
            if value.is_empty() {
                SUMMARY_PLACEHOLDER.to_string()
            } else {
                value.to_string()
            }
        };

        RecordSummary {
            id: self.id.clone(),
            display_name: self.display_name().to_string(),
            art_nr: or_placeholder("artNr"),
            material: or_placeholder("material"),
            datum: or_placeholder("datum"),
        }
    }

    /// Converts this record to its flat JSON wire shape.
    pub fn to_json(&self) -> Value {
        let mut object = Map::with_capacity(CANONICAL_FIELDS.len() + 3);
        object.insert(ID_KEY.to_string(), Value::String(self.id.0.clone()));
        for (spec, value) in self.fields() {
            object.insert(spec.name.to_string(), Value::String(value.to_string()));
        }
        object.insert(
            IMAGES_KEY.to_string(),
            Value::Array(self.images.iter().cloned().map(Value::String).collect()),
        );
        object.insert(
            SINGLE_IMAGE_KEY.to_string(),
            self.single_image.clone().map_or(Value::Null, Value::String),
        );
        Value::Object(object)
    }
}

impl Default for Record {
    fn default() -> Self {
        schema::canonical_default()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(CANONICAL_FIELDS.len() + 3))?;
        map.serialize_entry(ID_KEY, self.id.as_str())?;
        for (spec, value) in self.fields() {
            map.serialize_entry(spec.name, value)?;
        }
        map.serialize_entry(IMAGES_KEY, &self.images)?;
        map.serialize_entry(SINGLE_IMAGE_KEY, &self.single_image)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(schema::reconcile(&raw))
    }
}
