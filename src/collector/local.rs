use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};
use walkdir::{DirEntry, WalkDir};

use crate::analyzer::Analyzer;
use crate::error::{GuerreroError, Result};
use crate::media::{FileEntry, RawMediaInfo};

use super::Source;

/// Collects files from the local file system.
///
/// Hidden files and directories are skipped. Unreadable entries are logged
/// and left out instead of failing the listing.
pub struct LocalSource {
    analyzer: Arc<dyn Analyzer>,
}

impl LocalSource {
    pub fn new(analyzer: Arc<dyn Analyzer>) -> Self {
        Self { analyzer }
    }
}

#[async_trait]
impl Source for LocalSource {
    async fn list(&self, directory: &str) -> Result<Vec<FileEntry>> {
        let root = PathBuf::from(directory);
        if !root.is_dir() {
            return Err(GuerreroError::Config(format!(
                "Not a directory: {}",
                root.display()
            )));
        }

        tokio::task::spawn_blocking(move || walk(&root))
            .await
            .map_err(|e| GuerreroError::tool("walkdir", e.to_string()))
    }

    async fn load_media_info(&self, file: &str) -> Result<Vec<RawMediaInfo>> {
        self.analyzer.analyze(Path::new(file)).await
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn walk(root: &Path) -> Vec<FileEntry> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                error!("Error processing file or directory: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        match entry.metadata() {
            Ok(metadata) => files.push(FileEntry::new(
                entry.path().to_string_lossy(),
                metadata.len(),
            )),
            Err(e) => error!("Could not read metadata of {}: {}", entry.path().display(), e),
        }
    }

    debug!("Found {} files below {}", files.len(), root.display());
    files
}
