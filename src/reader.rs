//! Recursive traversal of remote directory trees.
//!
//! The reader only knows how to walk a tree; listing a single directory is
//! delegated to a [`DirectoryLister`]. Directories are processed from a queue
//! with a bounded number of listings in flight, all driven from the task that
//! called [`DirectoryReader::run`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tracing::{debug, error, trace};

use crate::error::{DirectoryError, GuerreroError, Result};
use crate::media::{DirectoryListing, FileEntry};

/// Lists the files and direct subdirectories of one directory.
///
/// Implementations return full paths and leave out `.` and `..`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectoryLister: Send + Sync {
    async fn list(&self, directory: &str) -> Result<DirectoryListing>;

    /// Human readable name of a file or directory, used for logging only.
    fn format_name(&self, name: &str) -> String {
        name.to_string()
    }
}

/// Traversal status reported after every change of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    /// Completed plus queued directories; grows as subdirectories are found.
    pub total: usize,
}

pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Walks a directory tree through a [`DirectoryLister`].
///
/// A reader runs one traversal at a time: calling [`run`](Self::run) while a
/// traversal is in progress fails with [`GuerreroError::ReaderBusy`].
pub struct DirectoryReader<L: DirectoryLister + ?Sized> {
    lister: Arc<L>,
    concurrency: usize,
    progress: Option<ProgressCallback>,
    running: AtomicBool,
}

impl<L: DirectoryLister + ?Sized> DirectoryReader<L> {
    pub fn new(lister: Arc<L>, concurrency: usize) -> Self {
        Self {
            lister,
            concurrency: concurrency.max(1),
            progress: None,
            running: AtomicBool::new(false),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Collects every file below `root`, in no particular order.
    ///
    /// Directories that fail to list do not stop the traversal; once the
    /// queue is drained they are reported together as
    /// [`GuerreroError::Traversal`].
    pub async fn run(&self, root: &str) -> Result<Vec<FileEntry>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            error!("Reader is already running");
            return Err(GuerreroError::ReaderBusy);
        }
        let _running = RunningGuard(&self.running);

        debug!("Initializing traversal of \"{}\"", root);
        trace!("Formatted alias of \"{}\" is \"{}\"", root, self.lister.format_name(root));

        self.traverse(root).await
    }

    async fn traverse(&self, root: &str) -> Result<Vec<FileEntry>> {
        let mut state = Traversal::default();
        let mut in_flight = FuturesUnordered::new();

        state.queue.push_back(root.to_string());
        self.notify(&state);

        loop {
            while in_flight.len() < self.concurrency {
                let Some(directory) = state.queue.pop_front() else {
                    break;
                };
                debug!("Processing directory \"{}\"", self.lister.format_name(&directory));
                in_flight.push(async move {
                    let result = self.lister.list(&directory).await;
                    (directory, result)
                });
            }

            let Some((directory, result)) = in_flight.next().await else {
                break;
            };

            state.done += 1;
            match result {
                Ok(listing) => {
                    debug!(
                        "Found {} files in directory \"{}\"",
                        listing.files.len(),
                        self.lister.format_name(&directory)
                    );
                    state.files.extend(listing.files);
                    self.notify(&state);
                    for subdirectory in listing.directories {
                        state.queue.push_back(subdirectory);
                        self.notify(&state);
                    }
                }
                Err(e) => {
                    error!(
                        "Error processing directory \"{}\" ({})",
                        self.lister.format_name(&directory),
                        e
                    );
                    state.errors.push(DirectoryError {
                        directory,
                        message: e.to_string(),
                    });
                    self.notify(&state);
                }
            }
        }

        self.notify(&state);

        if state.errors.is_empty() {
            Ok(state.files)
        } else {
            Err(GuerreroError::Traversal(state.errors))
        }
    }

    fn notify(&self, state: &Traversal) {
        if let Some(progress) = &self.progress {
            progress(Progress {
                done: state.done,
                total: state.done + state.queue.len(),
            });
        }
    }
}

/// Clears the running flag when a traversal ends, also when it is dropped early.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Traversal {
    queue: VecDeque<String>,
    files: Vec<FileEntry>,
    errors: Vec<DirectoryError>,
    done: usize,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::{Notify, watch};

    /// An in-memory tree keyed by directory path (with trailing slash).
    pub(crate) struct FixtureLister {
        tree: HashMap<String, DirectoryListing>,
    }

    impl FixtureLister {
        pub(crate) fn new(entries: &[(&str, &[(&str, u64)], &[&str])]) -> Self {
            let tree = entries
                .iter()
                .map(|(dir, files, dirs)| {
                    let listing = DirectoryListing {
                        files: files
                            .iter()
                            .map(|(name, size)| FileEntry::new(format!("{}{}", dir, name), *size))
                            .collect(),
                        directories: dirs.iter().map(|d| format!("{}{}/", dir, d)).collect(),
                    };
                    (dir.to_string(), listing)
                })
                .collect();
            Self { tree }
        }

        /// Root with one file and three subdirectories: one empty, one with a
        /// nested empty directory, one with four files and a nested chain.
        pub(crate) fn default_tree() -> Self {
            Self::new(&[
                ("/", &[("hello.txt", 42)], &["empty", "more", "other stuff"]),
                ("/empty/", &[], &[]),
                ("/more/", &[], &["even more"]),
                ("/more/even more/", &[], &[]),
                (
                    "/other stuff/",
                    &[
                        ("how.txt", 42),
                        ("now.txt", 17),
                        ("brown.txt", 1337),
                        ("cow.txt", 47110815),
                    ],
                    &["nested"],
                ),
                ("/other stuff/nested/", &[], &["deeply"]),
                ("/other stuff/nested/deeply/", &[("bananarama.jpg", 1000)], &[]),
            ])
        }

        /// Root with six subdirectories holding two files each.
        pub(crate) fn wide_tree() -> Self {
            Self::new(&[
                ("/", &[], &["a", "b", "c", "d", "e", "f"]),
                ("/a/", &[("1.mkv", 1), ("2.mkv", 2)], &[]),
                ("/b/", &[("1.mkv", 1), ("2.mkv", 2)], &[]),
                ("/c/", &[("1.mkv", 1), ("2.mkv", 2)], &[]),
                ("/d/", &[("1.mkv", 1), ("2.mkv", 2)], &[]),
                ("/e/", &[("1.mkv", 1), ("2.mkv", 2)], &[]),
                ("/f/", &[("1.mkv", 1), ("2.mkv", 2)], &[]),
            ])
        }
    }

    /// Counts calls that are in progress and remembers the highest count.
    #[derive(Default)]
    pub(crate) struct InFlight {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl InFlight {
        /// Stays in flight across a few scheduler turns.
        pub(crate) async fn hold(&self) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            self.current.fetch_sub(1, Ordering::SeqCst);
        }

        pub(crate) fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DirectoryLister for FixtureLister {
        async fn list(&self, directory: &str) -> Result<DirectoryListing> {
            tokio::task::yield_now().await;
            self.tree
                .get(directory)
                .cloned()
                .ok_or_else(|| GuerreroError::tool("fixture", "Directory not found"))
        }

        fn format_name(&self, name: &str) -> String {
            format!("[{}]", name)
        }
    }

    fn sorted(mut files: Vec<FileEntry>) -> Vec<FileEntry> {
        files.sort_by(|a, b| a.name.cmp(&b.name));
        files
    }

    fn expected_files() -> Vec<FileEntry> {
        sorted(vec![
            FileEntry::new("/hello.txt", 42),
            FileEntry::new("/other stuff/how.txt", 42),
            FileEntry::new("/other stuff/now.txt", 17),
            FileEntry::new("/other stuff/brown.txt", 1337),
            FileEntry::new("/other stuff/cow.txt", 47110815),
            FileEntry::new("/other stuff/nested/deeply/bananarama.jpg", 1000),
        ])
    }

    #[tokio::test]
    async fn test_run_collects_all_files() {
        for concurrency in 1..=5 {
            let reader = DirectoryReader::new(Arc::new(FixtureLister::default_tree()), concurrency);
            let files = reader.run("/").await.unwrap();
            assert_eq!(sorted(files), expected_files(), "concurrency {}", concurrency);
            assert!(!reader.is_running());
        }
    }

    struct CountingLister {
        inner: FixtureLister,
        in_flight: InFlight,
    }

    #[async_trait]
    impl DirectoryLister for CountingLister {
        async fn list(&self, directory: &str) -> Result<DirectoryListing> {
            self.in_flight.hold().await;
            self.inner.list(directory).await
        }
    }

    #[tokio::test]
    async fn test_listings_in_flight_are_bounded() {
        for concurrency in 1..=4 {
            let lister = Arc::new(CountingLister {
                inner: FixtureLister::wide_tree(),
                in_flight: InFlight::default(),
            });
            let reader = DirectoryReader::new(lister.clone(), concurrency);

            let files = reader.run("/").await.unwrap();

            assert_eq!(files.len(), 12);
            assert_eq!(lister.in_flight.peak(), concurrency, "concurrency {}", concurrency);
        }
    }

    #[tokio::test]
    async fn test_with_concurrency_keeps_progress() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let lister = Arc::new(CountingLister {
            inner: FixtureLister::wide_tree(),
            in_flight: InFlight::default(),
        });
        let reader = DirectoryReader::new(lister.clone(), 1)
            .with_progress(Arc::new(move |p| sink.lock().unwrap().push(p)))
            .with_concurrency(2);

        reader.run("/").await.unwrap();

        assert_eq!(lister.in_flight.peak(), 2);
        assert_eq!(events.lock().unwrap().last(), Some(&Progress { done: 7, total: 7 }));
    }

    #[tokio::test]
    async fn test_run_aggregates_errors() {
        let lister = FixtureLister::new(&[
            ("/", &[("a.mkv", 1)], &["missing", "ok"]),
            ("/ok/", &[("b.mkv", 2)], &["gone"]),
        ]);
        let reader = DirectoryReader::new(Arc::new(lister), 2);

        let err = reader.run("/").await.unwrap_err();

        let mut errors = match err {
            GuerreroError::Traversal(errors) => errors,
            other => panic!("expected a traversal error, got {:?}", other),
        };
        errors.sort_by(|a, b| a.directory.cmp(&b.directory));
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].directory, "/missing/");
        assert_eq!(errors[1].directory, "/ok/gone/");
        assert!(errors[0].message.contains("Directory not found"));
    }

    #[tokio::test]
    async fn test_progress_is_reported() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let reader = DirectoryReader::new(Arc::new(FixtureLister::default_tree()), 2)
            .with_progress(Arc::new(move |p| sink.lock().unwrap().push(p)));

        reader.run("/").await.unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.first(), Some(&Progress { done: 0, total: 1 }));
        assert_eq!(events.last(), Some(&Progress { done: 7, total: 7 }));
        assert!(events.windows(2).all(|w| w[0].done <= w[1].done));
        assert!(events.iter().all(|p| p.done <= p.total));
    }

    /// Blocks every listing until the gate opens.
    struct GatedLister {
        inner: FixtureLister,
        started: Notify,
        gate: watch::Receiver<bool>,
    }

    #[async_trait]
    impl DirectoryLister for GatedLister {
        async fn list(&self, directory: &str) -> Result<DirectoryListing> {
            self.started.notify_one();
            let mut gate = self.gate.clone();
            while !*gate.borrow_and_update() {
                if gate.changed().await.is_err() {
                    break;
                }
            }
            self.inner.list(directory).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_run_is_rejected() {
        let (open, gate) = watch::channel(false);
        let lister = Arc::new(GatedLister {
            inner: FixtureLister::default_tree(),
            started: Notify::new(),
            gate,
        });
        let reader = Arc::new(DirectoryReader::new(lister.clone(), 2));

        let first = tokio::spawn({
            let reader = reader.clone();
            async move { reader.run("/").await }
        });
        lister.started.notified().await;
        assert!(reader.is_running());

        let second = reader.run("/").await;
        assert!(matches!(second, Err(GuerreroError::ReaderBusy)));

        open.send(true).unwrap();
        let files = first.await.unwrap().unwrap();
        assert_eq!(sorted(files), expected_files());

        // Usable again once the first traversal finished.
        assert!(reader.run("/").await.is_ok());
    }

    #[tokio::test]
    async fn test_dropped_run_releases_the_reader() {
        let (open, gate) = watch::channel(false);
        let lister = Arc::new(GatedLister {
            inner: FixtureLister::default_tree(),
            started: Notify::new(),
            gate,
        });
        let reader = DirectoryReader::new(lister, 2);

        {
            let run = reader.run("/");
            tokio::pin!(run);
            assert!(futures::poll!(run.as_mut()).is_pending());
            assert!(reader.is_running());
        }
        assert!(!reader.is_running());

        open.send(true).unwrap();
        let files = reader.run("/").await.unwrap();
        assert_eq!(sorted(files), expected_files());
    }

    #[tokio::test]
    async fn test_mocked_lister_single_directory() {
        let mut lister = MockDirectoryLister::new();
        lister
            .expect_list()
            .withf(|dir| dir == "/share")
            .times(1)
            .returning(|_| {
                Ok(DirectoryListing {
                    files: vec![FileEntry::new("/share/a.mkv", 10)],
                    directories: Vec::new(),
                })
            });
        lister.expect_format_name().returning(|n| n.to_string());

        let reader = DirectoryReader::new(Arc::new(lister), 3);
        let files = reader.run("/share").await.unwrap();

        assert_eq!(files, vec![FileEntry::new("/share/a.mkv", 10)]);
    }
}
