//! The collection pipeline: list, filter, fetch and normalize.
//!
//! A [`Collector`] drives a [`Source`], which knows how to enumerate files
//! below a directory and how to obtain raw analyzer output for one of them.
//! Results are reported as [`CollectorEvent`]s on a channel while the
//! pipeline keeps running.

pub mod local;
pub mod remote;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, trace, warn};

use crate::error::Result;
use crate::filter::PatternFilter;
use crate::media::{FileEntry, FileInfo, MediaInfo, RawMediaInfo};
use crate::normalize::Normalizer;

pub use local::LocalSource;
pub use remote::{ChunkDownloader, RemoteSource, RemoteTransport};

/// Where files and their metadata come from.
///
/// Both methods may be called concurrently.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Source: Send + Sync {
    /// Every file below `directory`, recursively. Directories themselves are
    /// not part of the result.
    async fn list(&self, directory: &str) -> Result<Vec<FileEntry>>;

    /// Raw analyzer output for a file returned by [`list`](Self::list).
    async fn load_media_info(&self, file: &str) -> Result<Vec<RawMediaInfo>>;

    /// Fully qualified name of a file, e.g. with a protocol and host prefix.
    fn format_name(&self, name: &str) -> String {
        name.to_string()
    }
}

/// Emitted once per accepted file.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectorEvent {
    /// Metadata was loaded. `info` is `None` if the analyzer found nothing.
    Info(FileInfo),
    /// Metadata could not be loaded or normalized.
    Problem { file: FileInfo, error: String },
}

/// Counters of a finished [`Collector::execute`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionSummary {
    pub listed: usize,
    pub accepted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Files for which the analyzer returned no record.
    pub empty: usize,
}

/// A file that was analyzed, but not with exactly one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorWarning {
    NoMediaInfo { file: String },
    MultipleMediaInfo { file: String, count: usize },
}

impl fmt::Display for CollectorWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMediaInfo { file } => write!(f, "No media info found for file \"{}\"", file),
            Self::MultipleMediaInfo { file, count } => write!(
                f,
                "{} media info records found for file \"{}\", using the first",
                count, file
            ),
        }
    }
}

/// Receives the warnings of a collection run.
#[cfg_attr(test, mockall::automock)]
pub trait WarningReporter: Send + Sync {
    fn warn(&self, warning: &CollectorWarning);
}

/// Reports warnings as log messages.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWarnings;

impl WarningReporter for TracingWarnings {
    fn warn(&self, warning: &CollectorWarning) {
        warn!("{}", warning);
    }
}

enum Outcome {
    Succeeded,
    Empty,
    Failed,
}

pub struct Collector {
    source: Arc<dyn Source>,
    filter: PatternFilter,
    normalizer: Normalizer,
    warnings: Arc<dyn WarningReporter>,
    concurrency: usize,
}

impl Collector {
    pub const DEFAULT_CONCURRENCY: usize = 3;

    pub fn new(source: Arc<dyn Source>) -> Self {
        Self {
            source,
            filter: PatternFilter::accept_all(),
            normalizer: Normalizer::default(),
            warnings: Arc::new(TracingWarnings),
            concurrency: Self::DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_filter(mut self, filter: PatternFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_warning_reporter(mut self, warnings: Arc<dyn WarningReporter>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Collects metadata for every accepted file below `directory`.
    ///
    /// Only a failed listing makes this return an error. Failures of single
    /// files are sent as [`CollectorEvent::Problem`] and counted in the
    /// summary.
    pub async fn execute(
        &self,
        directory: &str,
        events: &UnboundedSender<CollectorEvent>,
    ) -> Result<CollectionSummary> {
        info!("Listing files in \"{}\"", self.source.format_name(directory));
        let listed = self.source.list(directory).await?;

        let mut summary = CollectionSummary {
            listed: listed.len(),
            ..Default::default()
        };

        let files: Vec<FileInfo> = listed
            .into_iter()
            .filter(|file| self.filter.accepts(&file.name))
            .map(|file| self.materialize(file))
            .collect();
        summary.accepted = files.len();
        info!(
            "{} of {} files accepted for processing",
            summary.accepted, summary.listed
        );

        let outcomes: Vec<Outcome> = stream::iter(files)
            .map(|file| self.process(file, events))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                Outcome::Succeeded => summary.succeeded += 1,
                Outcome::Empty => summary.empty += 1,
                Outcome::Failed => summary.failed += 1,
            }
        }

        Ok(summary)
    }

    fn materialize(&self, file: FileEntry) -> FileInfo {
        FileInfo {
            formatted_name: self.source.format_name(&file.name),
            name: file.name,
            size: file.size,
            info: None,
        }
    }

    async fn process(&self, mut file: FileInfo, events: &UnboundedSender<CollectorEvent>) -> Outcome {
        debug!("Loading media info of \"{}\"", file.formatted_name);

        let (event, outcome) = match self.fetch(&file).await {
            Ok(Some(info)) => {
                file.info = Some(info);
                (CollectorEvent::Info(file), Outcome::Succeeded)
            }
            Ok(None) => (CollectorEvent::Info(file), Outcome::Empty),
            Err(e) => {
                error!("Could not get info for file \"{}\" ({})", file.formatted_name, e);
                let error = e.to_string();
                (CollectorEvent::Problem { file, error }, Outcome::Failed)
            }
        };

        if events.send(event).is_err() {
            trace!("Event receiver is gone, dropping event");
        }
        outcome
    }

    async fn fetch(&self, file: &FileInfo) -> Result<Option<MediaInfo>> {
        let records = self.source.load_media_info(&file.name).await?;

        if records.len() > 1 {
            self.warnings.warn(&CollectorWarning::MultipleMediaInfo {
                file: file.formatted_name.clone(),
                count: records.len(),
            });
        }

        match records.first() {
            Some(raw) => self.normalizer.normalize(raw).map(Some),
            None => {
                self.warnings.warn(&CollectorWarning::NoMediaInfo {
                    file: file.formatted_name.clone(),
                });
                Ok(None)
            }
        }
    }
}
