//! Core record types for dronegallery.
//!
//! Documents arrive from a collection as loosely-typed JSON field maps. This
//! module defines those raw documents, the external timestamp encoding, and
//! the typed [`ImageSetRecord`] the gallery view renders.

use std::fmt::Write as _;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Field holding the single combined image URL.
pub const URL_FIELD: &str = "url";
/// Field holding the thermal image URL.
pub const THERMAL_FIELD: &str = "thermal";
/// Field holding the depth image URL.
pub const DEPTH_FIELD: &str = "depth";
/// Field holding the RGB image URL.
pub const RGB_FIELD: &str = "rgb";
/// Field holding the fused image URL.
pub const FUSE_FIELD: &str = "fuse";
/// Field holding the capture timestamp.
pub const TIMESTAMP_FIELD: &str = "timestamp";

const NANOS_PER_SECOND: u32 = 1_000_000_000;

/// Caption shown when a record carries no capture time.
pub const UNKNOWN_TIME: &str = "Unknown";

/// An external timestamp: whole seconds since the Unix epoch plus nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Seconds since 1970-01-01T00:00:00Z.
    pub seconds: i64,
    /// Sub-second nanoseconds, always below one second.
    #[serde(default)]
    pub nanos: u32,
}

impl Timestamp {
    /// Create a timestamp from raw parts.
    #[must_use]
    pub fn new(seconds: i64, nanos: u32) -> Self {
        Self { seconds, nanos }
    }

    /// Create a timestamp for the current instant.
    #[must_use]
    pub fn now() -> Self {
        Self::from_datetime(&Utc::now())
    }

    /// Create a timestamp from any chrono date/time.
    #[must_use]
    pub fn from_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        Self {
            seconds: dt.timestamp(),
            nanos: dt.timestamp_subsec_nanos(),
        }
    }

    /// Decode a timestamp from a document field value.
    ///
    /// Accepts `{"seconds", "nanos"}` objects, the `{"_seconds",
    /// "_nanoseconds"}` export shape, and RFC 3339 strings. Everything else,
    /// `null` included, yields `None`.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| Self::from_datetime(&dt)),
            _ => Self::from_object(value),
        }
    }

    /// Decode only the object encodings. Strings yield `None`.
    #[must_use]
    pub fn from_object(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let seconds = map
            .get("seconds")
            .or_else(|| map.get("_seconds"))?
            .as_i64()?;
        let nanos = match map.get("nanos").or_else(|| map.get("_nanoseconds")) {
            None => 0,
            Some(v) => u32::try_from(v.as_u64()?).ok()?,
        };
        if nanos >= NANOS_PER_SECOND {
            return None;
        }
        Some(Self { seconds, nanos })
    }

    /// Encode this timestamp as a document field value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        json!({ "seconds": self.seconds, "nanos": self.nanos })
    }

    /// Convert to a UTC date/time, or `None` when out of chrono's range.
    #[must_use]
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.seconds, self.nanos)
    }

    /// Convert to the local time zone.
    #[must_use]
    pub fn to_local(&self) -> Option<DateTime<Local>> {
        self.to_utc().map(|dt| dt.with_timezone(&Local))
    }
}

/// A raw document as delivered by a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document identifier, unique within its collection.
    pub id: String,
    /// The document's fields.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Document {
    /// Create an empty document with the given id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Build a composite-schema document.
    #[must_use]
    pub fn composite(
        id: impl Into<String>,
        thermal: &str,
        depth: &str,
        rgb: &str,
        fuse: &str,
        timestamp: Option<Timestamp>,
    ) -> Self {
        let doc = Self::new(id)
            .with_field(THERMAL_FIELD, thermal)
            .with_field(DEPTH_FIELD, depth)
            .with_field(RGB_FIELD, rgb)
            .with_field(FUSE_FIELD, fuse);
        match timestamp {
            Some(ts) => doc.with_field(TIMESTAMP_FIELD, ts.to_value()),
            None => doc.with_field(TIMESTAMP_FIELD, Value::Null),
        }
    }

    /// Build a single-image document.
    #[must_use]
    pub fn single(id: impl Into<String>, url: &str, timestamp: Option<Timestamp>) -> Self {
        let doc = Self::new(id).with_field(URL_FIELD, url);
        match timestamp {
            Some(ts) => doc.with_field(TIMESTAMP_FIELD, ts.to_value()),
            None => doc.with_field(TIMESTAMP_FIELD, Value::Null),
        }
    }

    /// Get a raw field value.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Check whether a field is present at all (`null` counts as present).
    #[must_use]
    pub fn has_field(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Get a field as a string, if it is one.
    #[must_use]
    pub fn string_field(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(Value::as_str)
    }

    /// Get a field as a timestamp, if it decodes as one.
    #[must_use]
    pub fn timestamp_field(&self, key: &str) -> Option<Timestamp> {
        self.field(key).and_then(Timestamp::from_value)
    }
}

/// Which record schema documents are read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVariant {
    /// `{ url, timestamp }`: one combined image per record.
    Single,
    /// `{ thermal, depth, rgb, fuse, timestamp }`: four images per record.
    #[default]
    Composite,
    /// Decide per document: `Single` when a `url` field is present.
    Auto,
}

impl SchemaVariant {
    /// Resolve `Auto` against a concrete document.
    #[must_use]
    pub fn resolve(self, document: &Document) -> Self {
        match self {
            Self::Auto if document.has_field(URL_FIELD) => Self::Single,
            Self::Auto => Self::Composite,
            other => other,
        }
    }
}

impl std::fmt::Display for SchemaVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Composite => write!(f, "composite"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

/// The kind of image shown in a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// The single combined image of the `single` schema.
    Combined,
    /// Thermal camera frame.
    Thermal,
    /// Depth map.
    Depth,
    /// Visible-light frame.
    Rgb,
    /// Fused composite of the other three.
    Fused,
}

impl SlotKind {
    /// Human-readable label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Combined => "Image",
            Self::Thermal => "Thermal",
            Self::Depth => "Depth",
            Self::Rgb => "RGB",
            Self::Fused => "Fused",
        }
    }
}

/// One rendered image position within a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSlot<'a> {
    /// What the slot shows.
    pub kind: SlotKind,
    /// Where the image lives, if the document named it.
    pub url: Option<&'a str>,
}

/// The image references of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSet {
    /// A single combined image.
    Single {
        /// Image URL.
        url: Option<String>,
    },
    /// Thermal, depth, RGB and fused images.
    Composite {
        /// Thermal image URL.
        thermal: Option<String>,
        /// Depth image URL.
        depth: Option<String>,
        /// RGB image URL.
        rgb: Option<String>,
        /// Fused image URL (stored as `fuse`).
        fused: Option<String>,
    },
}

impl ImageSet {
    /// Read the image references of `document` using `variant`.
    #[must_use]
    pub fn from_document(document: &Document, variant: SchemaVariant) -> Self {
        let url = |key: &str| document.string_field(key).map(str::to_string);
        match variant.resolve(document) {
            SchemaVariant::Single => Self::Single {
                url: url(URL_FIELD),
            },
            _ => Self::Composite {
                thermal: url(THERMAL_FIELD),
                depth: url(DEPTH_FIELD),
                rgb: url(RGB_FIELD),
                fused: url(FUSE_FIELD),
            },
        }
    }

    /// The slots to render, in display order.
    #[must_use]
    pub fn slots(&self) -> Vec<ImageSlot<'_>> {
        match self {
            Self::Single { url } => vec![ImageSlot {
                kind: SlotKind::Combined,
                url: url.as_deref(),
            }],
            Self::Composite {
                thermal,
                depth,
                rgb,
                fused,
            } => vec![
                ImageSlot {
                    kind: SlotKind::Thermal,
                    url: thermal.as_deref(),
                },
                ImageSlot {
                    kind: SlotKind::Depth,
                    url: depth.as_deref(),
                },
                ImageSlot {
                    kind: SlotKind::Rgb,
                    url: rgb.as_deref(),
                },
                ImageSlot {
                    kind: SlotKind::Fused,
                    url: fused.as_deref(),
                },
            ],
        }
    }
}

/// One capture event as shown by the gallery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSetRecord {
    /// Identifier of the source document.
    pub id: String,
    /// The record's images.
    pub images: ImageSet,
    /// Capture time in the local zone, if the document carried one.
    pub captured_at: Option<DateTime<Local>>,
}

impl ImageSetRecord {
    /// Map a raw document to a record.
    ///
    /// `timestamp_field` names the field holding the capture time.
    #[must_use]
    pub fn from_document(
        document: &Document,
        variant: SchemaVariant,
        timestamp_field: &str,
    ) -> Self {
        Self {
            id: document.id.clone(),
            images: ImageSet::from_document(document, variant),
            captured_at: document
                .timestamp_field(timestamp_field)
                .and_then(|ts| ts.to_local()),
        }
    }

    /// Format the capture time with a strftime pattern, or `Unknown`.
    #[must_use]
    pub fn captured_label(&self, time_format: &str) -> String {
        let Some(at) = self.captured_at else {
            return UNKNOWN_TIME.to_string();
        };
        let mut out = String::new();
        // A malformed pattern surfaces as a fmt::Error here instead of a panic.
        if write!(out, "{}", at.format(time_format)).is_err() {
            return UNKNOWN_TIME.to_string();
        }
        out
    }

    /// The "Uploaded on: ..." caption.
    #[must_use]
    pub fn caption(&self, time_format: &str) -> String {
        format!("Uploaded on: {}", self.captured_label(time_format))
    }
}

/// Map a snapshot's documents to records, preserving their order.
#[must_use]
pub fn map_documents(
    documents: &[Document],
    variant: SchemaVariant,
    timestamp_field: &str,
) -> Vec<ImageSetRecord> {
    documents
        .iter()
        .map(|doc| ImageSetRecord::from_document(doc, variant, timestamp_field))
        .collect()
}
