use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::{GuerreroError, Result};

// Default values for collector configuration
fn default_concurrency() -> usize {
    3
}

fn default_chunk_size() -> usize {
    10_000
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub collector: CollectorConfig,
    pub normalizer: NormalizerConfig,
    pub analyzer: AnalyzerConfig,
    pub ftp: FtpConfig,
    pub smb: SmbConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Maximum number of files analyzed at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Maximum number of remote directories listed at the same time
    #[serde(default = "default_concurrency")]
    pub list_concurrency: usize,
    /// Minimum number of bytes downloaded from remote files
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Glob patterns a file must match (any of them); empty accepts all
    #[serde(default)]
    pub include: Vec<String>,
    /// Glob patterns a file must not match
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Let wildcards match hidden files and directories
    #[serde(default = "default_true")]
    pub dot: bool,
    /// Match patterns without a slash against the file name only
    #[serde(default = "default_true")]
    pub match_base: bool,
    #[serde(default = "default_true")]
    pub case_sensitive: bool,
    /// Log why each file was accepted or rejected
    #[serde(default)]
    pub verbose_filters: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Fail a file on the first property that cannot be normalized
    pub strict: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Path to the mediainfo binary
    pub binary_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Path to the curl binary
    pub curl_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmbConfig {
    /// Share in `//server/share` form
    pub service: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub smbclient_path: String,
    pub smbget_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriterKind {
    /// Print the name of every file
    Console,
    /// Write all results to a JSON array file
    Json,
    /// Discard all results
    Null,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub writer: WriterKind,
    /// Target file of the JSON writer
    pub path: Option<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            list_concurrency: default_concurrency(),
            chunk_size: default_chunk_size(),
            include: Vec::new(),
            exclude: Vec::new(),
            dot: true,
            match_base: true,
            case_sensitive: true,
            verbose_filters: false,
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            binary_path: "mediainfo".to_string(),
        }
    }
}

impl Default for FtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 21,
            user: "anonymous".to_string(),
            password: "guest".to_string(),
            curl_path: "curl".to_string(),
        }
    }
}

impl Default for SmbConfig {
    fn default() -> Self {
        Self {
            service: String::new(),
            username: None,
            password: None,
            smbclient_path: "smbclient".to_string(),
            smbget_path: "smbget".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            writer: WriterKind::Console,
            path: None,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GuerreroError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| GuerreroError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| GuerreroError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| GuerreroError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.collector.concurrency, 3);
        assert_eq!(config.collector.chunk_size, 10_000);
        assert!(config.collector.dot);
        assert!(config.collector.match_base);
        assert!(!config.normalizer.strict);
        assert_eq!(config.analyzer.binary_path, "mediainfo");
        assert_eq!(config.ftp.port, 21);
        assert_eq!(config.output.writer, WriterKind::Console);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [collector]
            include = ["*.mkv", "*.avi"]
            concurrency = 8

            [output]
            writer = "json"
            path = "out.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.collector.include, vec!["*.mkv", "*.avi"]);
        assert_eq!(config.collector.concurrency, 8);
        assert_eq!(config.collector.list_concurrency, 3);
        assert!(config.collector.case_sensitive);
        assert_eq!(config.output.writer, WriterKind::Json);
        assert_eq!(config.output.path.as_deref(), Some("out.json"));
        assert_eq!(config.smb.smbclient_path, "smbclient");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("guerrero.toml");

        let mut config = Config::default();
        config.ftp.host = "media.example.com".to_string();
        config.smb.username = Some("bob".to_string());
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.ftp.host, "media.example.com");
        assert_eq!(loaded.smb.username.as_deref(), Some("bob"));
        assert_eq!(loaded.smb.password, None);
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[collector\nconcurrency = ").unwrap();

        assert!(matches!(Config::from_file(&path), Err(GuerreroError::Config(_))));
    }
}
