//! SMB access through the Samba command line clients.
//!
//! Directories are listed with `smbclient --command=ls`, chunks are read from
//! `smbget --stdout`, which is stopped once enough bytes have arrived.

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use regex::Regex;
use tracing::trace;

use crate::collector::ChunkDownloader;
use crate::command::ToolCommand;
use crate::config::SmbConfig;
use crate::error::Result;
use crate::media::{DirectoryListing, FileEntry};
use crate::reader::DirectoryLister;

use super::join_path;

static LS_DIRECTORY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^  (?P<name>.+?)\s+D\s+(?P<size>0)  (?P<date>[A-Z][a-z]{2} [A-Z][a-z]{2}\s+\d{1,2} \d{1,2}:\d{2}:\d{2} \d{4})$",
    )
    .expect("valid regex")
});

static LS_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^  (?P<name>.+?)\s+(?:[A-Z]+\s+)?(?P<size>\d+)  (?P<date>[A-Z][a-z]{2} [A-Z][a-z]{2}\s+\d{1,2} \d{1,2}:\d{2}:\d{2} \d{4})$",
    )
    .expect("valid regex")
});

/// An entry of an `smbclient` `ls` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmbEntry {
    pub name: String,
    pub size: u64,
    pub modified: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmbListing {
    pub files: Vec<SmbEntry>,
    /// Includes `.` and `..` as reported by the server.
    pub directories: Vec<SmbEntry>,
}

fn parse_date(date: &str) -> Option<NaiveDateTime> {
    let date = date.split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDateTime::parse_from_str(&date, "%a %b %d %H:%M:%S %Y").ok()
}

/// Parses the output of `smbclient --command=ls`.
pub fn parse_ls(output: &str) -> SmbListing {
    let mut listing = SmbListing::default();

    for line in output.lines().map(|line| line.trim_end_matches('\r')) {
        if let Some(caps) = LS_DIRECTORY.captures(line) {
            listing.directories.push(SmbEntry {
                name: caps["name"].to_string(),
                size: 0,
                modified: parse_date(&caps["date"]),
            });
        } else if let Some(caps) = LS_FILE.captures(line) {
            let Ok(size) = caps["size"].parse() else {
                continue;
            };
            listing.files.push(SmbEntry {
                name: caps["name"].to_string(),
                size,
                modified: parse_date(&caps["date"]),
            });
        }
    }

    listing
}

/// Lists and downloads files of an SMB share.
#[derive(Debug, Clone)]
pub struct SmbTransport {
    config: SmbConfig,
}

impl SmbTransport {
    pub fn new(config: SmbConfig) -> Self {
        Self { config }
    }

    /// `//server/share` without the leading slashes.
    fn share(&self) -> &str {
        self.config.service.trim_start_matches('/')
    }

    pub fn ls_command(&self, directory: &str) -> ToolCommand {
        let cmd = ToolCommand::new(&self.config.smbclient_path, "SMB directory listing")
            .arg(&self.config.service)
            .arg(format!("--directory={}", directory))
            .arg("--command=ls");

        match (&self.config.username, &self.config.password) {
            (Some(user), Some(password)) => cmd.secret_arg(format!("--user={}%{}", user, password)),
            (Some(user), None) => cmd.arg(format!("--user={}", user)).arg("--no-pass"),
            (None, _) => cmd.arg("--no-pass"),
        }
    }

    pub fn download_command(&self, file: &str) -> ToolCommand {
        let cmd = ToolCommand::new(&self.config.smbget_path, "SMB chunk download").arg("--stdout");

        let cmd = match (&self.config.username, &self.config.password) {
            (Some(user), Some(password)) => cmd
                .arg(format!("--username={}", user))
                .secret_arg(format!("--password={}", password)),
            (Some(user), None) => cmd.arg(format!("--username={}", user)),
            (None, _) => cmd.arg("--guest"),
        };

        cmd.arg(format!("smb://{}{}", self.share(), ensure_leading_slash(file)))
    }
}

fn ensure_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

#[async_trait]
impl DirectoryLister for SmbTransport {
    async fn list(&self, directory: &str) -> Result<DirectoryListing> {
        let output = self.ls_command(directory).execute().await?;
        let ls = parse_ls(&String::from_utf8_lossy(&output));

        Ok(DirectoryListing {
            files: ls
                .files
                .into_iter()
                .map(|file| FileEntry::new(join_path(directory, &file.name), file.size))
                .collect(),
            directories: ls
                .directories
                .into_iter()
                .filter(|dir| dir.name != "." && dir.name != "..")
                .map(|dir| join_path(directory, &dir.name))
                .collect(),
        })
    }

    fn format_name(&self, name: &str) -> String {
        format!(
            "smb://{}@{}{}",
            self.config.username.as_deref().unwrap_or("guest"),
            self.share(),
            ensure_leading_slash(name)
        )
    }
}

#[async_trait]
impl ChunkDownloader for SmbTransport {
    async fn download_chunk(&self, file: &str, min_size: usize) -> Result<Vec<u8>> {
        let data = self.download_command(file).read_prefix(min_size).await?;
        trace!("Download of \"{}\" complete ({} bytes read)", self.format_name(file), data.len());
        Ok(data)
    }
}
