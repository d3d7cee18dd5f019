//! Canonical field schema and record reconciliation.
//!
//! # Responsibility
//! - Define the canonical field set, labels, kinds and default values.
//! - Reconcile any raw JSON value into a full canonical `Record`.
//!
//! # Invariants
//! - `reconcile` is total: it never fails and never panics.
//! - Every record produced here carries exactly the canonical field set.
//! - Unknown keys in raw input are dropped.
//! - `reconcile(serialize(reconcile(x))) == reconcile(x)`.

use crate::model::record::{Record, RecordId};
use serde_json::{Map, Value};

/// Wire key of the stable record identifier.
pub const ID_KEY: &str = "id";
/// Wire key of the ordered attachment image list.
pub const IMAGES_KEY: &str = "hilfsmittelFotos";
/// Wire key of the single mouthpiece photo slot.
pub const SINGLE_IMAGE_KEY: &str = "mundstueckFoto";
/// Field used as the record display name and query target.
pub const DISPLAY_NAME_FIELD: &str = "formatBezeichnung";

const ON_OFF: &[&str] = &["Ein", "Aus"];
const CUTTING_TABLES: &[&str] = &["Normal", "Deckenziegel", "Juwö"];
const PRESS_PROGRAMS: &[&str] = &[
    "Presse ohne Siebmischer,Tonreiniger",
    "Presse+Siebmischer",
    "Presse+Siebmischer+Tonreiniger",
];

/// Value shape of one canonical field.
///
/// All values are stored as text; the kind only describes what the text is
/// expected to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free-form text.
    Text,
    /// Decimal number rendered as text.
    Numeric,
    /// ISO calendar date (`YYYY-MM-DD`).
    Date,
    /// One of a fixed option set. `default` may be `""` when "not chosen" is legal.
    Choice {
        options: &'static [&'static str],
        default: &'static str,
    },
}

/// Static description of one canonical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Wire name used in storage, export files and extraction responses.
    pub name: &'static str,
    /// Caption printed on the paper form.
    pub label: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    const fn text(name: &'static str, label: &'static str) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Text,
        }
    }

    const fn numeric(name: &'static str, label: &'static str) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Numeric,
        }
    }

    const fn date(name: &'static str, label: &'static str) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Date,
        }
    }

    const fn choice(
        name: &'static str,
        label: &'static str,
        options: &'static [&'static str],
        default: &'static str,
    ) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Choice { options, default },
        }
    }

    /// Returns the canonical default value for this field.
    pub fn default_value(&self) -> &'static str {
        match self.kind {
            FieldKind::Choice { default, .. } => default,
            _ => "",
        }
    }

    /// Returns the documented options, or an empty slice for non-choice fields.
    pub fn options(&self) -> &'static [&'static str] {
        match self.kind {
            FieldKind::Choice { options, .. } => options,
            _ => &[],
        }
    }

    /// Maps a loosely written value onto one of the documented options.
    ///
    /// Matching ignores case and surrounding whitespace. Returns `None` when
    /// the value matches no option or the field is not a choice field.
    pub fn snap_choice(&self, value: &str) -> Option<&'static str> {
        let wanted = value.trim().to_lowercase();
        self.options()
            .iter()
            .copied()
            .find(|option| option.to_lowercase() == wanted)
    }
}

/// Canonical field set in canonical order, excluding `id` and the image slots.
pub const CANONICAL_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("artNr", "Art.-Nr."),
    FieldSpec::text("formatBezeichnung", "Format-Bezeichnung"),
    FieldSpec::text("material", "Material"),
    FieldSpec::date("datum", "Datum"),
    FieldSpec::text("abmessungen", "Abmessungen (L x B x H)"),
    FieldSpec::text("mundstueckNr", "Mundstück - Nr."),
    FieldSpec::text("presskopf", "Presskopf"),
    FieldSpec::text("sonstigeEinstellungen", "Sonstige Einstellungen"),
    FieldSpec::choice("pressprogramm", "Pressprogramm", PRESS_PROGRAMS, ""),
    FieldSpec::text("zahnradAbschneider", "Zahnrad Abschneider"),
    FieldSpec::text("beschriftungSchlagmann", "Beschriftung Schlagmann"),
    FieldSpec::text("beschriftungCE", "Beschriftung CE"),
    FieldSpec::text("beschriftungRO", "Beschriftung RO"),
    FieldSpec::text("beschriftungT", "Beschriftung T"),
    FieldSpec::numeric("druckfestigkeit", "Druckfestigkeit"),
    FieldSpec::text("beschriftungSchicht", "Beschriftung Schicht"),
    FieldSpec::text("beschriftungSchichtzeitraum", "Beschriftung Schichtzeitraum"),
    FieldSpec::text("beschriftungDatum", "Beschriftung Datum"),
    FieldSpec::text("vortriebOben1", "Vortrieb oben 1"),
    FieldSpec::text("vortriebOben2", "Vortrieb oben 2"),
    FieldSpec::text("vortriebOben3", "Vortrieb oben 3"),
    FieldSpec::text("vortriebUnten1", "Vortrieb unten 1"),
    FieldSpec::text("vortriebUnten2", "Vortrieb unten 2"),
    FieldSpec::text("vortriebUnten3", "Vortrieb unten 3"),
    FieldSpec::text("vortriebLinks1", "Vortrieb links 1"),
    FieldSpec::text("vortriebLinks2", "Vortrieb links 2"),
    FieldSpec::text("vortriebLinks3", "Vortrieb links 3"),
    FieldSpec::text("vortriebRechts1", "Vortrieb rechts 1"),
    FieldSpec::text("vortriebRechts2", "Vortrieb rechts 2"),
    FieldSpec::text("vortriebRechts3", "Vortrieb rechts 3"),
    FieldSpec::text("vortriebZentrum", "Vortrieb Zentrum"),
    FieldSpec::text("presskopfLeiste", "Presskopf-Leiste"),
    FieldSpec::text("austrag", "Austrag"),
    FieldSpec::numeric("schnittlaengeNass", "Schnittlänge (nass)"),
    FieldSpec::text("siebmischer", "Siebmischer"),
    FieldSpec::text("wasserSiebmischer", "Wasser Siebmischer"),
    FieldSpec::text("dampfSiebmischer", "Dampf Siebmischer"),
    FieldSpec::numeric("gewichtNass", "Gewicht (nass)"),
    FieldSpec::text("mischer", "Mischer"),
    FieldSpec::text("wasserMischer", "Wasser Mischer"),
    FieldSpec::text("dampfMischer", "Dampf Mischer"),
    FieldSpec::numeric("pressendruck", "Pressendruck"),
    FieldSpec::text("presse", "Presse"),
    FieldSpec::text("tonreiniger", "Tonreiniger"),
    FieldSpec::text("schnecke", "Schnecke"),
    FieldSpec::text("rostkorb", "Rostkorb"),
    FieldSpec::text("styropor", "Styropor"),
    FieldSpec::choice("abschneidetisch", "Abschneidetisch", CUTTING_TABLES, "Normal"),
    FieldSpec::text("freimatikProduktname", "Freimatik-Produktname"),
    FieldSpec::numeric("hubhoehe", "Hubhöhe"),
    FieldSpec::numeric("schnittlaenge", "Schnittlänge"),
    FieldSpec::text("vorschub", "Vorschub"),
    FieldSpec::choice("drehvorrichtung", "Drehvorrichtung", ON_OFF, "Aus"),
    FieldSpec::numeric("anzahlSchneidedraehte", "Anzahl Schneidedrähte"),
    FieldSpec::text("offsetDrehvorr", "Offset Drehvorr."),
    FieldSpec::numeric("drahtabstand", "Drahtabstand"),
    FieldSpec::text("geschwLinglBandbruecke", "Geschwin. Lingl Bandbrücke"),
    FieldSpec::text("abziehblechNr", "Abziehblech Nr."),
    FieldSpec::choice("drahtreiniger", "Drahtreiniger", ON_OFF, "Aus"),
    FieldSpec::text("schablone", "Schablone"),
    FieldSpec::text("schabloneninfo", "Schabloneninfo"),
    FieldSpec::choice("abfallAuswerfer", "Abfall-Auswerfer", ON_OFF, "Aus"),
    FieldSpec::numeric("drahtdurchmesser", "Drahtdurchmesser"),
    FieldSpec::choice("drahtnachzug", "Drahtnachzug", ON_OFF, "Aus"),
    FieldSpec::text("geschwFuerNachfBand", "Geschw. für nachf. Band"),
    FieldSpec::text("parameterFuerDrehteller", "Parameter für Drehteller"),
];

/// Looks up the position of a canonical field by wire name.
pub fn field_index(name: &str) -> Option<usize> {
    CANONICAL_FIELDS.iter().position(|spec| spec.name == name)
}

/// Looks up a canonical field by wire name.
pub fn field_spec(name: &str) -> Option<&'static FieldSpec> {
    CANONICAL_FIELDS.iter().find(|spec| spec.name == name)
}

/// Iterates over the canonical choice fields with their canonical positions.
pub fn choice_fields() -> impl Iterator<Item = (usize, &'static FieldSpec)> {
    CANONICAL_FIELDS
        .iter()
        .enumerate()
        .filter(|(_, spec)| matches!(spec.kind, FieldKind::Choice { .. }))
}

/// Returns the canonical default record.
///
/// # Contract
/// - `id` is empty (draft).
/// - Text fields are `""`, choice fields hold their documented default.
/// - `images` is empty and `single_image` is absent.
pub fn canonical_default() -> Record {
    let values = CANONICAL_FIELDS
        .iter()
        .map(|spec| spec.default_value().to_string())
        .collect();
    Record::from_parts(RecordId::draft(), values, Vec::new(), None)
}

/// Reconciles an arbitrary JSON value against the canonical schema.
///
/// Raw values win over defaults; fields missing from `raw` keep their
/// canonical default; unknown keys are dropped. A non-object `raw` yields the
/// canonical default.
pub fn reconcile(raw: &Value) -> Record {
    match raw.as_object() {
        Some(object) => reconcile_object(object),
        None => canonical_default(),
    }
}

fn reconcile_object(object: &Map<String, Value>) -> Record {
    let id = object
        .get(ID_KEY)
        .and_then(coerce_text)
        .map(RecordId::new)
        .unwrap_or_else(RecordId::draft);

    let values = CANONICAL_FIELDS
        .iter()
        .map(|spec| {
            object
                .get(spec.name)
                .and_then(coerce_text)
                .unwrap_or_else(|| spec.default_value().to_string())
        })
        .collect();

    let images = match object.get(IMAGES_KEY) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };

    let single_image = object
        .get(SINGLE_IMAGE_KEY)
        .and_then(Value::as_str)
        .filter(|payload| !payload.is_empty())
        .map(str::to_string);

    Record::from_parts(id, values, images, single_image)
}

/// Renders a scalar JSON value as field text.
///
/// Strings pass through verbatim; numbers and booleans are rendered; `null`,
/// arrays and objects have no text form and leave the default in place.
fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
