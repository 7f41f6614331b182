//! Invocation of the external `mediainfo` analyzer.

use std::path::Path;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::command::ToolCommand;
use crate::config::AnalyzerConfig;
use crate::error::Result;
use crate::media::{RawMediaInfo, RawProperties};

static PROPERTY_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)\s+:\s?(.*)$").expect("valid regex"));

/// Produces raw, string-typed metadata for a local file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// One record per file section found in the analyzer output; usually one.
    async fn analyze(&self, path: &Path) -> Result<Vec<RawMediaInfo>>;
}

/// Runs the `mediainfo` command line tool.
#[derive(Debug, Clone)]
pub struct MediaInfoAnalyzer {
    binary_path: String,
}

impl MediaInfoAnalyzer {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            binary_path: config.binary_path.clone(),
        }
    }
}

#[async_trait]
impl Analyzer for MediaInfoAnalyzer {
    async fn analyze(&self, path: &Path) -> Result<Vec<RawMediaInfo>> {
        debug!("Running analyzer on {}", path.display());

        let output = ToolCommand::new(&self.binary_path, "mediainfo")
            .path(path)
            .execute()
            .await?;

        Ok(parse_report(&String::from_utf8_lossy(&output)))
    }
}

/// Maps a display key to its property name, e.g. `Channel(s)` to `channel_s_`.
pub fn sanitize_key(key: &str) -> String {
    let mut name: String = key
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// Parses the sectioned `Key : Value` report printed by `mediainfo`.
///
/// Every `General` section starts a new record; other sections become tracks
/// whose `type` is the section name without its `#n` suffix.
pub fn parse_report(report: &str) -> Vec<RawMediaInfo> {
    let mut records: Vec<RawMediaInfo> = Vec::new();
    let mut section = Section::None;

    for line in report.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            section = Section::None;
            continue;
        }

        if section == Section::None {
            let name = line.split(" #").next().unwrap_or(line).trim();
            if name == "General" || records.is_empty() {
                records.push(RawMediaInfo::default());
            }
            section = if name == "General" {
                Section::General
            } else {
                let mut track = RawProperties::new();
                track.insert("type".to_string(), name.to_string());
                if let Some(record) = records.last_mut() {
                    record.tracks.push(track);
                }
                Section::Track
            };
            continue;
        }

        let Some(caps) = PROPERTY_LINE.captures(line) else {
            continue;
        };
        let properties = match (section, records.last_mut()) {
            (Section::General, Some(record)) => &mut record.general,
            (Section::Track, Some(record)) => match record.tracks.last_mut() {
                Some(track) => track,
                None => continue,
            },
            _ => continue,
        };
        properties
            .entry(sanitize_key(&caps[1]))
            .or_insert_with(|| caps[2].trim().to_string());
    }

    records
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    General,
    Track,
}
