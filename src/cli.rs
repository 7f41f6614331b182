use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{Config, WriterKind};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Collect media information from a local directory
    Local {
        /// Directory to traverse
        directory: PathBuf,

        #[command(flatten)]
        options: CollectOptions,
    },

    /// Collect media information from an FTP host
    Ftp {
        /// Remote directory to traverse
        #[arg(default_value = "/")]
        directory: String,

        /// Host name
        #[arg(long)]
        host: Option<String>,

        /// Port
        #[arg(long)]
        port: Option<u16>,

        /// User name
        #[arg(short, long)]
        user: Option<String>,

        /// Password
        #[arg(short, long)]
        password: Option<String>,

        #[command(flatten)]
        options: CollectOptions,
    },

    /// Collect media information from an SMB share
    Smb {
        /// Remote directory to traverse
        #[arg(default_value = "/")]
        directory: String,

        /// Share in //server/share form
        #[arg(long)]
        service: Option<String>,

        /// User name (guest access if omitted)
        #[arg(short, long)]
        user: Option<String>,

        /// Password
        #[arg(short, long)]
        password: Option<String>,

        #[command(flatten)]
        options: CollectOptions,
    },

    /// Analyze a single local file and print its normalized media information
    Probe {
        /// File to analyze
        file: PathBuf,

        /// Fail on the first property that cannot be normalized
        #[arg(long)]
        strict: bool,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Output file
        #[arg(short, long, default_value = "guerrero.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Options shared by all collection commands
#[derive(ClapArgs, Debug, Default)]
pub struct CollectOptions {
    /// Glob pattern a file must match (repeatable)
    #[arg(short, long)]
    pub include: Vec<String>,

    /// Glob pattern a file must not match (repeatable)
    #[arg(short, long)]
    pub exclude: Vec<String>,

    /// Maximum number of files analyzed at the same time
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Maximum number of remote directories listed at the same time
    #[arg(long)]
    pub list_concurrency: Option<usize>,

    /// Minimum number of bytes downloaded per remote file
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Fail a file on the first property that cannot be normalized
    #[arg(long)]
    pub strict: bool,

    /// Log why each file was accepted or rejected
    #[arg(long)]
    pub verbose_filters: bool,

    /// Output writer
    #[arg(long, value_enum)]
    pub writer: Option<OutputKind>,

    /// Output file of the JSON writer
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputKind {
    Console,
    Json,
    Null,
}

impl From<OutputKind> for WriterKind {
    fn from(kind: OutputKind) -> Self {
        match kind {
            OutputKind::Console => WriterKind::Console,
            OutputKind::Json => WriterKind::Json,
            OutputKind::Null => WriterKind::Null,
        }
    }
}

impl CollectOptions {
    /// Override file configuration with the values given on the command line.
    pub fn apply(&self, config: &mut Config) {
        if !self.include.is_empty() {
            config.collector.include = self.include.clone();
        }
        if !self.exclude.is_empty() {
            config.collector.exclude = self.exclude.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.collector.concurrency = concurrency;
        }
        if let Some(concurrency) = self.list_concurrency {
            config.collector.list_concurrency = concurrency;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.collector.chunk_size = chunk_size;
        }
        if self.strict {
            config.normalizer.strict = true;
        }
        if self.verbose_filters {
            config.collector.verbose_filters = true;
        }
        if let Some(output) = &self.output {
            config.output.path = Some(output.to_string_lossy().to_string());
            // An output file implies the JSON writer unless another one was asked for.
            config.output.writer = WriterKind::Json;
        }
        if let Some(writer) = self.writer {
            config.output.writer = writer.into();
        }
    }
}
