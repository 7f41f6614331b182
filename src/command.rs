use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::error::{GuerreroError, Result};

/// Placeholder shown instead of secret arguments in logs.
pub const MASKED: &str = "°°°°°°°°";

/// An external tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
    masked: Vec<usize>,
}

impl ToolCommand {
    /// Create a new tool command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
            masked: Vec::new(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add an argument that must not show up in logs
    pub fn secret_arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.masked.push(self.args.len());
        self.args.push(arg.into());
        self
    }

    /// Add a path argument
    pub fn path<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// The command line as it may be logged.
    pub fn display(&self) -> String {
        let args = self.args.iter().enumerate().map(|(i, arg)| {
            if self.masked.contains(&i) {
                MASKED.to_string()
            } else if arg.contains(char::is_whitespace) {
                format!("\"{}\"", arg)
            } else {
                arg.clone()
            }
        });

        std::iter::once(self.binary_path.clone())
            .chain(args)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary_path);
        cmd.args(&self.args).stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> GuerreroError {
        if e.kind() == std::io::ErrorKind::NotFound {
            GuerreroError::ToolNotFound(self.binary_path.clone())
        } else {
            GuerreroError::tool(&self.description, format!("failed to execute: {}", e))
        }
    }

    /// Execute the command and return its standard output
    pub async fn execute(&self) -> Result<Vec<u8>> {
        trace!("Executing \"{}\"", self.display());
        debug!("Description: {}", self.description);

        let output = self
            .command()
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("stderr output was: \"{}\"", stderr.trim());
            return Err(GuerreroError::tool(
                &self.description,
                format!("{} ({})", output.status, stderr.trim()),
            ));
        }

        Ok(output.stdout)
    }

    /// Execute the command and return its standard output as text
    pub async fn execute_text(&self) -> Result<String> {
        let stdout = self.execute().await?;
        String::from_utf8(stdout)
            .map_err(|e| GuerreroError::parse(&self.description, format!("invalid UTF-8: {}", e)))
    }

    /// Read at most `limit` bytes of standard output, then stop the process.
    ///
    /// A process that ends before `limit` bytes were produced must exit
    /// successfully, one that is stopped early is not checked.
    pub async fn read_prefix(&self, limit: usize) -> Result<Vec<u8>> {
        trace!("Executing \"{}\" (reading up to {} bytes)", self.display(), limit);

        let mut child = self
            .command()
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let mut buffer = Vec::with_capacity(limit);
        if let Some(stdout) = child.stdout.take() {
            stdout.take(limit as u64).read_to_end(&mut buffer).await?;
        }

        if buffer.len() >= limit {
            // Ignore the result, the process may already be gone.
            let _ = child.kill().await;
            return Ok(buffer);
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(GuerreroError::tool(&self.description, status.to_string()));
        }

        Ok(buffer)
    }
}
