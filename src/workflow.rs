use std::path::Path;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::analyzer::{Analyzer, MediaInfoAnalyzer};
use crate::collector::{CollectionSummary, Collector, LocalSource, RemoteSource, RemoteTransport, Source};
use crate::config::Config;
use crate::error::{GuerreroError, Result};
use crate::filter::{PatternFilter, PatternOptions};
use crate::media::MediaInfo;
use crate::normalize::Normalizer;
use crate::reader::{Progress, ProgressCallback};
use crate::transport::{FtpTransport, SmbTransport};
use crate::writer::{WriterFactory, drain_events};

pub struct Workflow {
    config: Config,
    analyzer: Arc<dyn Analyzer>,
    show_progress: bool,
}

impl Workflow {
    pub fn new(config: Config) -> Self {
        let analyzer = Arc::new(MediaInfoAnalyzer::new(&config.analyzer));

        Self {
            config,
            analyzer,
            show_progress: true,
        }
    }

    /// Replace the mediainfo analyzer
    pub fn with_analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Show a progress bar while remote directories are listed
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Collect media information from a local directory
    pub async fn collect_local<P: AsRef<Path>>(&self, directory: P) -> Result<CollectionSummary> {
        let directory = directory.as_ref();
        info!("Collecting files from local directory {}", directory.display());

        let source = Arc::new(LocalSource::new(self.analyzer.clone()));
        self.run(source, &directory.to_string_lossy()).await
    }

    /// Collect media information from the configured FTP host
    pub async fn collect_ftp(&self, directory: &str) -> Result<CollectionSummary> {
        let transport = Arc::new(FtpTransport::new(self.config.ftp.clone()));
        self.collect_remote(transport, directory).await
    }

    /// Collect media information from the configured SMB share
    pub async fn collect_smb(&self, directory: &str) -> Result<CollectionSummary> {
        if self.config.smb.service.is_empty() {
            return Err(GuerreroError::Config(
                "No SMB service configured (expected //server/share)".to_string(),
            ));
        }

        let transport = Arc::new(SmbTransport::new(self.config.smb.clone()));
        self.collect_remote(transport, directory).await
    }

    /// Analyze a single local file and normalize every record found
    pub async fn probe<P: AsRef<Path>>(&self, file: P) -> Result<Vec<MediaInfo>> {
        let file = file.as_ref();
        info!("Probing {}", file.display());

        if !file.is_file() {
            return Err(GuerreroError::Config(format!("Not a file: {}", file.display())));
        }

        let normalizer = Normalizer::new(self.config.normalizer.strict);
        let records = self.analyzer.analyze(file).await?;
        if records.is_empty() {
            warn!("No media info found for {}", file.display());
        }

        records.iter().map(|raw| normalizer.normalize(raw)).collect()
    }

    async fn collect_remote<T: RemoteTransport + 'static>(
        &self,
        transport: Arc<T>,
        directory: &str,
    ) -> Result<CollectionSummary> {
        let root = remote_root(directory);
        info!("Collecting files from \"{}\"", transport.format_name(&root));

        let mut source = RemoteSource::new(transport, self.analyzer.clone())
            .with_chunk_size(self.config.collector.chunk_size)
            .with_list_concurrency(self.config.collector.list_concurrency);

        let bar = if self.show_progress {
            let (bar, callback) = listing_progress()?;
            source = source.with_progress(callback);
            Some(bar)
        } else {
            None
        };

        let result = self.run(Arc::new(source), &root).await;
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
        result
    }

    async fn run(&self, source: Arc<dyn Source>, directory: &str) -> Result<CollectionSummary> {
        let settings = &self.config.collector;
        let options = PatternOptions {
            dot: settings.dot,
            match_base: settings.match_base,
            case_sensitive: settings.case_sensitive,
        };
        let filter = PatternFilter::new(&settings.include, &settings.exclude, options)?
            .with_verbose(settings.verbose_filters);

        let collector = Collector::new(source)
            .with_filter(filter)
            .with_normalizer(Normalizer::new(self.config.normalizer.strict))
            .with_concurrency(settings.concurrency);

        let mut writer = WriterFactory::create_writer(&self.config.output)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let consumer = tokio::spawn(async move { drain_events(writer.as_mut(), rx).await });

        let result = collector.execute(directory, &tx).await;
        drop(tx);

        let written = consumer
            .await
            .map_err(|e| GuerreroError::tool("writer", e.to_string()))??;
        debug!("Writer handled {} events", written);

        let summary = result?;
        info!(
            "Collection finished: {} files listed, {} accepted, {} analyzed, {} without media info, {} failed",
            summary.listed, summary.accepted, summary.succeeded, summary.empty, summary.failed
        );
        Ok(summary)
    }
}

/// Absolute form of a remote directory without a trailing slash, `/` for the root.
fn remote_root(directory: &str) -> String {
    format!("/{}", directory.trim_matches('/'))
}

fn listing_progress() -> Result<(ProgressBar, ProgressCallback)> {
    let bar = ProgressBar::new(1);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} directories")
            .map_err(|e| GuerreroError::Config(format!("Invalid progress template: {}", e)))?
            .progress_chars("#>-"),
    );

    let handle = bar.clone();
    let callback: ProgressCallback = Arc::new(move |progress: Progress| {
        handle.set_length(progress.total as u64);
        handle.set_position(progress.done as u64);
    });

    Ok((bar, callback))
}
