//! Normalization of analyzer output
//!
//! The analyzer reports every property as a display string ("1 920 pixels",
//! "1h 30mn", "128 Kbps"). The normalizer turns those into typed values using
//! the dispatch tables in `table` and the unit parsers in `parse`.

pub mod parse;
pub mod table;

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::warn;

use crate::error::{GuerreroError, NormalizationIssue, Result};
use crate::media::{MediaInfo, Properties, RawMediaInfo, RawProperties, Track, Value};
use table::{FieldKind, Section};

static CHAPTER_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^_\d{2}_\d{2}_\d{2}_?\d{3}$").expect("valid regex"));

/// Receives every field the normalizer could not handle.
pub trait IssueReporter: Send + Sync {
    fn report(&self, issue: &NormalizationIssue);
}

/// Reports issues as log warnings.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl IssueReporter for TracingReporter {
    fn report(&self, issue: &NormalizationIssue) {
        warn!("{}", issue);
    }
}

/// Converts raw analyzer output into typed [`MediaInfo`].
///
/// In lenient mode an unparsable field becomes [`Value::Unparsed`] and an
/// unhandled field keeps its raw text; both are passed to the reporter. In
/// strict mode the first issue aborts normalization.
#[derive(Clone)]
pub struct Normalizer {
    strict: bool,
    reporter: Arc<dyn IssueReporter>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Normalizer {
    pub fn new(strict: bool) -> Self {
        Self::with_reporter(strict, Arc::new(TracingReporter))
    }

    pub fn with_reporter(strict: bool, reporter: Arc<dyn IssueReporter>) -> Self {
        Self { strict, reporter }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn normalize(&self, raw: &RawMediaInfo) -> Result<MediaInfo> {
        let general = self.normalize_properties(&raw.general, Section::General)?;
        let tracks = raw
            .tracks
            .iter()
            .map(|track| {
                self.normalize_properties(track, Section::Track)
                    .map(|properties| Track { properties })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(MediaInfo { general, tracks })
    }

    fn normalize_properties(&self, raw: &RawProperties, section: Section) -> Result<Properties> {
        raw.iter()
            .map(|(field, value)| {
                self.normalize_field(section, field, value)
                    .map(|v| (field.clone(), v))
            })
            .collect()
    }

    fn normalize_field(&self, section: Section, field: &str, raw: &str) -> Result<Value> {
        if section == Section::Track && CHAPTER_KEY.is_match(field) {
            return Ok(Value::Text(raw.to_string()));
        }

        let Some(kind) = table::lookup(section, field) else {
            self.raise(NormalizationIssue::Unhandled {
                field: field.to_string(),
                value: raw.to_string(),
            })?;
            return Ok(Value::Text(raw.to_string()));
        };

        match parse_kind(kind, raw) {
            Ok(value) => Ok(value),
            Err(reason) => {
                self.raise(NormalizationIssue::Unparsable {
                    field: field.to_string(),
                    value: raw.to_string(),
                    reason,
                })?;
                Ok(Value::Unparsed(raw.to_string()))
            }
        }
    }

    fn raise(&self, issue: NormalizationIssue) -> Result<()> {
        self.reporter.report(&issue);
        if self.strict {
            return Err(GuerreroError::Normalization(issue));
        }
        Ok(())
    }
}

fn parse_kind(kind: FieldKind, raw: &str) -> std::result::Result<Value, String> {
    match kind {
        FieldKind::Label => Ok(Value::Text(raw.to_string())),
        FieldKind::Bool => parse::parse_bool(raw),
        FieldKind::Int => parse::parse_int(raw),
        FieldKind::Float => parse::parse_float(raw),
        FieldKind::Duration => parse::parse_duration(raw),
        FieldKind::IntUnit { units, spaced } => parse::parse_int_unit(raw, units, spaced),
        FieldKind::FloatUnit(unit) => parse::parse_float_unit(raw, unit),
        FieldKind::Bitrate => parse::parse_bitrate(raw),
        FieldKind::SamplingRate => parse::parse_sampling_rate(raw),
        FieldKind::Bytes => parse::parse_bytes(raw),
        FieldKind::Date => parse::parse_date(raw),
    }
}
