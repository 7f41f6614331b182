//! Data model shared by collectors, the normalizer and writers.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

/// A file as reported by a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
}

impl FileEntry {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// Content of a single directory: its files and its direct subdirectories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryListing {
    pub files: Vec<FileEntry>,
    pub directories: Vec<String>,
}

/// Raw, string-typed property bag produced by the analyzer.
pub type RawProperties = BTreeMap<String, String>;

/// The analyzer's output for one file before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMediaInfo {
    pub general: RawProperties,
    pub tracks: Vec<RawProperties>,
}

/// A normalized property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Label or enum-like string, kept as is.
    Text(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Seconds.
    Duration(f64),
    /// Bits per second.
    Bitrate(f64),
    Bytes(u64),
    Hertz(f64),
    Date(DateTime<Utc>),
    /// The field is known but its raw value could not be parsed.
    Unparsed(String),
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Text(s) => serializer.serialize_str(s),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) | Value::Duration(f) | Value::Bitrate(f) | Value::Hertz(f) => {
                serializer.serialize_f64(*f)
            }
            Value::Bytes(b) => serializer.serialize_u64(*b),
            Value::Date(d) => serializer.serialize_str(&d.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Value::Unparsed(_) => serializer.serialize_none(),
        }
    }
}

/// Normalized property bag.
pub type Properties = BTreeMap<String, Value>;

/// One media stream (audio, video, text, menu...) of a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Track {
    pub properties: Properties,
}

impl Track {
    /// The stream type taken from the analyzer's section header, e.g. `Video`.
    pub fn kind(&self) -> Option<&str> {
        match self.properties.get("type") {
            Some(Value::Text(kind)) => Some(kind),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.properties.get(field)
    }
}

/// The normalized analyzer output for one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaInfo {
    #[serde(flatten)]
    pub general: Properties,
    pub tracks: Vec<Track>,
}

/// Everything known about one accepted file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub formatted_name: String,
    pub size: u64,
    pub info: Option<MediaInfo>,
}
