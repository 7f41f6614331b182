use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use crate::error::{GuerreroError, Result};
use crate::media::FileInfo;

use super::Writer;

/// Streams every analyzed file into a JSON array.
///
/// The file is created (or truncated) by `initialize` and is only valid JSON
/// once `finalize` has run.
pub struct JsonFileWriter {
    path: PathBuf,
    file: Option<BufWriter<File>>,
    written: usize,
}

impl JsonFileWriter {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            file: None,
            written: 0,
        }
    }

    fn file(&mut self) -> Result<&mut BufWriter<File>> {
        self.file.as_mut().ok_or_else(|| {
            GuerreroError::Io(std::io::Error::other("JSON writer has not been initialized"))
        })
    }
}

fn to_pretty_json(file: &FileInfo) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    file.serialize(&mut serializer)?;
    Ok(buffer)
}

#[async_trait]
impl Writer for JsonFileWriter {
    async fn initialize(&mut self) -> Result<()> {
        debug!("Opening JSON output file {}", self.path.display());
        let file = File::create(&self.path).await?;
        let mut file = BufWriter::new(file);
        file.write_all(b"[").await?;

        self.file = Some(file);
        self.written = 0;
        Ok(())
    }

    async fn info(&mut self, info: &FileInfo) -> Result<()> {
        let json = to_pretty_json(info)?;
        let separator = self.written > 0;

        let file = self.file()?;
        if separator {
            file.write_all(b", ").await?;
        }
        file.write_all(&json).await?;

        self.written += 1;
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        let file = self.file()?;
        file.write_all(b"]").await?;
        file.flush().await?;

        self.file = None;
        info!("Wrote {} entries to {}", self.written, self.path.display());
        Ok(())
    }
}
