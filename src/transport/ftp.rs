//! FTP access through `curl`.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{trace, warn};

use crate::collector::ChunkDownloader;
use crate::command::ToolCommand;
use crate::config::FtpConfig;
use crate::error::Result;
use crate::media::{DirectoryListing, FileEntry};
use crate::reader::DirectoryLister;

use super::join_path;

// drwxr-xr-x    2 ftp      ftp          4096 Mar 03 12:00 Season 1
static UNIX_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<kind>[-dl])\S{9,10}\s+\d+\s+(?:\S+\s+){1,2}(?P<size>\d+)\s+[A-Z][a-z]{2}\s+\d{1,2}\s+(?:\d{1,2}:\d{2}|\d{4})\s(?P<name>.+)$",
    )
    .expect("valid regex")
});

// 03-03-24  12:00PM       <DIR>          Season 1
static DOS_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\d{2}-\d{2}-\d{2,4}\s+\d{1,2}:\d{2}(?:AM|PM)?\s+(?:(?P<dir><DIR>)|(?P<size>\d+))\s+(?P<name>.+)$",
    )
    .expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

/// One line of an FTP `LIST` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub kind: EntryKind,
    pub name: String,
    pub size: u64,
}

/// Parses a `LIST` response in Unix `ls -l` or MS-DOS format.
///
/// Lines in neither format (e.g. `total 42`) are skipped. Symlink names lose
/// their ` -> target` part.
pub fn parse_listing(output: &str) -> Vec<ListEntry> {
    output
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter_map(|line| {
            let entry = parse_unix_line(line).or_else(|| parse_dos_line(line));
            if entry.is_none() && !line.trim().is_empty() {
                trace!("Skipping unrecognized listing line \"{}\"", line);
            }
            entry
        })
        .collect()
}

fn parse_unix_line(line: &str) -> Option<ListEntry> {
    let caps = UNIX_ENTRY.captures(line)?;
    let kind = match &caps["kind"] {
        "d" => EntryKind::Directory,
        "l" => EntryKind::Symlink,
        _ => EntryKind::File,
    };
    let name = match kind {
        EntryKind::Symlink => caps["name"].split(" -> ").next().unwrap_or_default(),
        _ => &caps["name"],
    };

    Some(ListEntry {
        kind,
        name: name.to_string(),
        size: caps["size"].parse().ok()?,
    })
}

fn parse_dos_line(line: &str) -> Option<ListEntry> {
    let caps = DOS_ENTRY.captures(line)?;
    let (kind, size) = match caps.name("size") {
        Some(size) => (EntryKind::File, size.as_str().parse().ok()?),
        None => (EntryKind::Directory, 0),
    };

    Some(ListEntry {
        kind,
        name: caps["name"].to_string(),
        size,
    })
}

fn ensure_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Lists and downloads files of an FTP host by running `curl`.
#[derive(Debug, Clone)]
pub struct FtpTransport {
    config: FtpConfig,
}

impl FtpTransport {
    pub fn new(config: FtpConfig) -> Self {
        Self { config }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "ftp://{}:{}{}",
            self.config.host,
            self.config.port,
            encode_path(&ensure_leading_slash(path))
        )
    }

    fn curl(&self, description: &str) -> ToolCommand {
        ToolCommand::new(&self.config.curl_path, description)
            .args(["--silent", "--show-error", "--no-epsv", "--user"])
            .secret_arg(format!("{}:{}", self.config.user, self.config.password))
    }

    /// Command listing `directory`; the trailing slash makes curl send `LIST`.
    pub fn list_command(&self, directory: &str) -> ToolCommand {
        let path = format!("{}/", directory.trim_end_matches('/'));
        self.curl("FTP directory listing").arg(self.url(&path))
    }

    pub fn download_command(&self, file: &str, size: usize) -> ToolCommand {
        self.curl("FTP chunk download")
            .args(["--speed-time", "1", "--range"])
            .arg(format!("0-{}", size.saturating_sub(1)))
            .arg(self.url(file))
    }
}

#[async_trait]
impl DirectoryLister for FtpTransport {
    async fn list(&self, directory: &str) -> Result<DirectoryListing> {
        let output = self.list_command(directory).execute().await?;

        let mut listing = DirectoryListing::default();
        for entry in parse_listing(&String::from_utf8_lossy(&output)) {
            let path = join_path(directory, &entry.name);
            match entry.kind {
                EntryKind::Symlink => warn!("Ignoring symlink \"{}\"", self.format_name(&path)),
                EntryKind::File => listing.files.push(FileEntry::new(path, entry.size)),
                EntryKind::Directory if entry.name != "." && entry.name != ".." => {
                    listing.directories.push(path)
                }
                EntryKind::Directory => {}
            }
        }

        Ok(listing)
    }

    fn format_name(&self, name: &str) -> String {
        format!(
            "ftp://{}@{}{}",
            self.config.user,
            self.config.host,
            ensure_leading_slash(name)
        )
    }
}

#[async_trait]
impl ChunkDownloader for FtpTransport {
    async fn download_chunk(&self, file: &str, min_size: usize) -> Result<Vec<u8>> {
        // Servers without REST support ignore the range, so stop reading ourselves.
        let data = self.download_command(file, min_size).read_prefix(min_size).await?;
        trace!("Download of \"{}\" complete ({} bytes read)", self.format_name(file), data.len());
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MASKED;

    const UNIX_LISTING: &str = "\
total 24\r
drwxr-xr-x    2 ftp      ftp          4096 Mar 03 12:00 .\r
drwxr-xr-x    5 ftp      ftp          4096 Mar 03 12:00 ..\r
drwxr-xr-x    2 ftp      ftp          4096 Mar 03 12:00 Season 1\r
-rw-r--r--    1 ftp      ftp     734003200 Jan 17  2014 Pilot (2011).mkv\r
-rw-r--r--    1 1000     1000          512 Feb  9 08:15 notes.txt\r
lrwxrwxrwx    1 ftp      ftp            14 Mar 03 12:00 latest -> Season 1/e01.mkv\r
";

    const DOS_LISTING: &str = "\
03-03-24  12:00PM       <DIR>          Season 1
01-17-14  09:30AM            734003200 Pilot (2011).mkv
";

    fn transport() -> FtpTransport {
        FtpTransport::new(FtpConfig {
            host: "media.example.com".to_string(),
            port: 2121,
            user: "bob".to_string(),
            password: "hunter2".to_string(),
            curl_path: "curl".to_string(),
        })
    }

    #[test]
    fn test_parse_unix_listing() {
        let entries = parse_listing(UNIX_LISTING);

        assert_eq!(entries.len(), 6);
        assert_eq!(
            entries[2],
            ListEntry {
                kind: EntryKind::Directory,
                name: "Season 1".to_string(),
                size: 4096,
            }
        );
        assert_eq!(
            entries[3],
            ListEntry {
                kind: EntryKind::File,
                name: "Pilot (2011).mkv".to_string(),
                size: 734003200,
            }
        );
        assert_eq!(entries[4].name, "notes.txt");
        assert_eq!(entries[4].size, 512);
        assert_eq!(entries[5].kind, EntryKind::Symlink);
        assert_eq!(entries[5].name, "latest");
    }

    #[test]
    fn test_parse_dos_listing() {
        let entries = parse_listing(DOS_LISTING);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, EntryKind::Directory);
        assert_eq!(entries[0].name, "Season 1");
        assert_eq!(entries[1].kind, EntryKind::File);
        assert_eq!(entries[1].size, 734003200);
    }

    #[test]
    fn test_format_name() {
        let ftp = transport();
        assert_eq!(ftp.format_name("/tv/Suits/s01e01.mkv"), "ftp://bob@media.example.com/tv/Suits/s01e01.mkv");
        assert_eq!(ftp.format_name("tv"), "ftp://bob@media.example.com/tv");
    }

    #[test]
    fn test_list_command() {
        let cmd = transport().list_command("/tv shows/");

        assert_eq!(cmd.args.last().unwrap(), "ftp://media.example.com:2121/tv%20shows/");
        assert!(cmd.args.contains(&"bob:hunter2".to_string()));
        assert!(!cmd.display().contains("hunter2"));
        assert!(cmd.display().contains(MASKED));
    }

    #[test]
    fn test_root_list_command() {
        let cmd = transport().list_command("/");
        assert_eq!(cmd.args.last().unwrap(), "ftp://media.example.com:2121/");
    }

    #[test]
    fn test_download_command() {
        let cmd = transport().download_command("/tv/Pilot (2011).mkv", 10_000);

        let range = cmd.args.iter().position(|a| a == "--range").unwrap();
        assert_eq!(cmd.args[range + 1], "0-9999");
        assert_eq!(
            cmd.args.last().unwrap(),
            "ftp://media.example.com:2121/tv/Pilot%20%282011%29.mkv"
        );
    }
}
