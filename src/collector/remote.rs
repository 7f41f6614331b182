//! Collection from remote hosts through a partial download.
//!
//! Most containers keep their metadata in the first few kilobytes, so only a
//! chunk of every remote file is fetched into a temporary file, which is then
//! handed to the analyzer.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::{debug, error, trace};

use crate::analyzer::Analyzer;
use crate::error::Result;
use crate::media::{FileEntry, RawMediaInfo};
use crate::reader::{DirectoryLister, DirectoryReader, ProgressCallback};

use super::{Collector, Source};

/// Fetches the beginning of a remote file.
#[async_trait]
pub trait ChunkDownloader: Send + Sync {
    /// Returns at least `min_size` bytes unless the file is shorter.
    async fn download_chunk(&self, file: &str, min_size: usize) -> Result<Vec<u8>>;
}

/// Everything a [`RemoteSource`] needs from a protocol implementation.
pub trait RemoteTransport: DirectoryLister + ChunkDownloader {}

impl<T: DirectoryLister + ChunkDownloader + ?Sized> RemoteTransport for T {}

pub struct RemoteSource<T: RemoteTransport> {
    transport: Arc<T>,
    reader: DirectoryReader<T>,
    analyzer: Arc<dyn Analyzer>,
    chunk_size: usize,
}

impl<T: RemoteTransport> RemoteSource<T> {
    pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

    pub fn new(transport: Arc<T>, analyzer: Arc<dyn Analyzer>) -> Self {
        Self {
            reader: DirectoryReader::new(transport.clone(), Collector::DEFAULT_CONCURRENCY),
            transport,
            analyzer,
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Number of directories listed at the same time.
    pub fn with_list_concurrency(mut self, concurrency: usize) -> Self {
        self.reader = self.reader.with_concurrency(concurrency);
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.reader = self.reader.with_progress(progress);
        self
    }

    async fn download_to_temporary_file(&self, file: &str) -> Result<NamedTempFile> {
        let formatted = self.transport.format_name(file);
        let suffix = Path::new(file)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        trace!("Creating temporary file for file \"{}\"", formatted);
        let temp = tempfile::Builder::new()
            .prefix("guerrero-")
            .suffix(&suffix)
            .tempfile()?;

        debug!("Downloading up to {} bytes of file \"{}\"", self.chunk_size, formatted);
        let data = self.transport.download_chunk(file, self.chunk_size).await?;

        debug!(
            "Writing partial download of \"{}\" to temporary file \"{}\"",
            formatted,
            temp.path().display()
        );
        tokio::fs::write(temp.path(), &data).await?;
        trace!("{} bytes written to \"{}\"", data.len(), temp.path().display());

        Ok(temp)
    }
}

#[async_trait]
impl<T: RemoteTransport + 'static> Source for RemoteSource<T> {
    async fn list(&self, directory: &str) -> Result<Vec<FileEntry>> {
        self.reader.run(directory).await
    }

    async fn load_media_info(&self, file: &str) -> Result<Vec<RawMediaInfo>> {
        let temp = self.download_to_temporary_file(file).await.inspect_err(|e| {
            error!(
                "Saving file \"{}\" to a temporary file failed ({})",
                self.transport.format_name(file),
                e
            )
        })?;

        let result = self.analyzer.analyze(temp.path()).await;
        if let Err(e) = &result {
            error!(
                "Error loading information for file \"{}\" ({})",
                self.transport.format_name(file),
                e
            );
        }

        // Dropping the handle removes the temporary file.
        drop(temp);
        result
    }

    fn format_name(&self, name: &str) -> String {
        self.transport.format_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::MockAnalyzer;
    use crate::error::GuerreroError;
    use crate::media::DirectoryListing;
    use crate::reader::Progress;
    use crate::reader::tests::{FixtureLister, InFlight};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    struct FixtureTransport {
        tree: FixtureLister,
        content: Vec<u8>,
        requests: Mutex<Vec<(String, usize)>>,
        listings: InFlight,
        downloads: InFlight,
    }

    impl FixtureTransport {
        fn new(content: &[u8]) -> Self {
            Self::with_tree(FixtureLister::default_tree(), content)
        }

        fn with_tree(tree: FixtureLister, content: &[u8]) -> Self {
            Self {
                tree,
                content: content.to_vec(),
                requests: Mutex::new(Vec::new()),
                listings: InFlight::default(),
                downloads: InFlight::default(),
            }
        }
    }

    #[async_trait]
    impl DirectoryLister for FixtureTransport {
        async fn list(&self, directory: &str) -> Result<DirectoryListing> {
            self.listings.hold().await;
            self.tree.list(directory).await
        }

        fn format_name(&self, name: &str) -> String {
            format!("fixture://{}", name)
        }
    }

    #[async_trait]
    impl ChunkDownloader for FixtureTransport {
        async fn download_chunk(&self, file: &str, min_size: usize) -> Result<Vec<u8>> {
            self.requests.lock().unwrap().push((file.to_string(), min_size));
            self.downloads.hold().await;
            if file.ends_with(".missing") {
                return Err(GuerreroError::tool("fixture", "no such file"));
            }
            Ok(self.content.iter().take(min_size).copied().collect())
        }
    }

    #[tokio::test]
    async fn test_list_walks_the_remote_tree() {
        let source = RemoteSource::new(
            Arc::new(FixtureTransport::new(b"")),
            Arc::new(MockAnalyzer::new()),
        )
        .with_list_concurrency(4);

        let files = source.list("/").await.unwrap();

        assert_eq!(files.len(), 6);
        assert!(files.contains(&FileEntry::new("/other stuff/nested/deeply/bananarama.jpg", 1000)));
    }

    #[tokio::test]
    async fn test_listing_and_fetching_pools_are_independent() {
        let transport = Arc::new(FixtureTransport::with_tree(FixtureLister::wide_tree(), b"abc"));
        let mut analyzer = MockAnalyzer::new();
        analyzer
            .expect_analyze()
            .times(12)
            .returning(|_| Ok(vec![RawMediaInfo::default()]));

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let source = RemoteSource::new(transport.clone(), Arc::new(analyzer))
            .with_progress(Arc::new(move |p| sink.lock().unwrap().push(p)))
            .with_list_concurrency(1);
        let collector = Collector::new(Arc::new(source)).with_concurrency(4);

        let (tx, _rx) = mpsc::unbounded_channel();
        let summary = collector.execute("/", &tx).await.unwrap();

        assert_eq!(summary.succeeded, 12);
        assert_eq!(transport.listings.peak(), 1);
        assert_eq!(transport.downloads.peak(), 4);
        assert_eq!(events.lock().unwrap().last(), Some(&Progress { done: 7, total: 7 }));
    }

    #[tokio::test]
    async fn test_load_media_info_analyzes_a_temporary_chunk() {
        let seen = Arc::new(Mutex::new(None::<PathBuf>));
        let mut analyzer = MockAnalyzer::new();
        let record = seen.clone();
        analyzer.expect_analyze().times(1).returning(move |path| {
            assert_eq!(std::fs::read(path).unwrap(), b"0123");
            *record.lock().unwrap() = Some(path.to_path_buf());
            Ok(vec![RawMediaInfo::default()])
        });

        let transport = Arc::new(FixtureTransport::new(b"0123456789"));
        let source = RemoteSource::new(transport.clone(), Arc::new(analyzer)).with_chunk_size(4);

        let records = source.load_media_info("/movies/pilot.mkv").await.unwrap();
        assert_eq!(records.len(), 1);

        let path = seen.lock().unwrap().clone().unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("guerrero-"));
        assert!(name.ends_with(".mkv"));
        assert!(!path.exists(), "temporary file must be removed");

        assert_eq!(
            *transport.requests.lock().unwrap(),
            vec![("/movies/pilot.mkv".to_string(), 4)]
        );
    }

    #[tokio::test]
    async fn test_failed_download_skips_the_analyzer() {
        let mut analyzer = MockAnalyzer::new();
        analyzer.expect_analyze().times(0);
        let source = RemoteSource::new(Arc::new(FixtureTransport::new(b"")), Arc::new(analyzer));

        let err = source.load_media_info("/broken.missing").await.unwrap_err();
        assert!(err.to_string().contains("no such file"));
    }

    #[tokio::test]
    async fn test_temporary_file_is_removed_when_analysis_fails() {
        let seen = Arc::new(Mutex::new(None::<PathBuf>));
        let record = seen.clone();
        let mut analyzer = MockAnalyzer::new();
        analyzer.expect_analyze().returning(move |path| {
            *record.lock().unwrap() = Some(path.to_path_buf());
            Err(GuerreroError::tool("mediainfo", "exit status: 1"))
        });
        let source = RemoteSource::new(Arc::new(FixtureTransport::new(b"abc")), Arc::new(analyzer));

        assert!(source.load_media_info("/a/b").await.is_err());
        let path = seen.lock().unwrap().clone().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_format_name_delegates_to_transport() {
        let source = RemoteSource::new(
            Arc::new(FixtureTransport::new(b"")),
            Arc::new(MockAnalyzer::new()),
        );
        assert_eq!(source.format_name("/a.mkv"), "fixture:///a.mkv");
    }
}
