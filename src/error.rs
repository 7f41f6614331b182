use std::fmt;

use thiserror::Error;

/// A directory that could not be listed during a traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryError {
    pub directory: String,
    pub message: String,
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.directory, self.message)
    }
}

/// A single value the normalizer could not turn into a typed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizationIssue {
    /// The field is known but its value does not have the expected shape.
    Unparsable {
        field: String,
        value: String,
        reason: String,
    },
    /// The field is not part of the dispatch table.
    Unhandled { field: String, value: String },
}

impl fmt::Display for NormalizationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unparsable { field, value, reason } => {
                write!(f, "unparsable value \"{}\" for property \"{}\" ({})", value, field, reason)
            }
            Self::Unhandled { field, value } => {
                write!(f, "unhandled property \"{}\" with value \"{}\"", field, value)
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum GuerreroError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid pattern \"{pattern}\": {message}")]
    Pattern { pattern: String, message: String },

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("{tool} failed: {message}")]
    Tool { tool: String, message: String },

    #[error("Failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    #[error("Normalization error: {0}")]
    Normalization(NormalizationIssue),

    #[error("Reader is already running")]
    ReaderBusy,

    #[error("Errors have occurred in {} directories: {}", .0.len(), join_errors(.0))]
    Traversal(Vec<DirectoryError>),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GuerreroError {
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn parse(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            what: what.into(),
            message: message.into(),
        }
    }
}

fn join_errors(errors: &[DirectoryError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, GuerreroError>;
