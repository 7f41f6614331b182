use std::io::Write;

use async_trait::async_trait;

use crate::error::Result;
use crate::media::FileInfo;

use super::Writer;

/// Prints the formatted name of every file that has been analyzed.
pub struct ConsoleWriter {
    out: Box<dyn Write + Send>,
}

impl ConsoleWriter {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }
}

#[async_trait]
impl Writer for ConsoleWriter {
    async fn info(&mut self, file: &FileInfo) -> Result<()> {
        writeln!(self.out, "{}", file.formatted_name)?;
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
