//! Error handling for the host exporter.

use std::io;
use std::path::Path;
use std::time::Duration;

/// A specialized `Result` type for exporter operations.
pub type Result<T> = std::result::Result<T, ExporterError>;

/// The main error type for collection and serving.
///
/// Collector-level errors never reach an HTTP client; the registry logs them
/// and drops the failing collector's output for that scrape.
#[derive(Debug, thiserror::Error)]
pub enum ExporterError {
    /// The external binary could not be found
    #[error("external tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// The external binary ran but exited unsuccessfully
    #[error("external tool {tool} failed (exit code {code:?}): {stderr}")]
    ToolExecution {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The external binary did not finish within the configured bound
    #[error("external tool {tool} timed out after {timeout:?}")]
    ToolTimeout { tool: String, timeout: Duration },

    /// A row of tool output did not match its schema
    #[error("failed to parse record: {0}")]
    RecordParse(String),

    /// A host file or sensor could not be read
    #[error("source unavailable: {path}: {reason}")]
    SourceUnavailable { path: String, reason: String },

    /// A host file or sensor exists but is not readable by this process
    #[error("permission denied: {path}")]
    PermissionDenied { path: String },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),
}

impl ExporterError {
    /// Create a new record parse error
    pub fn record_parse(msg: impl Into<String>) -> Self {
        Self::RecordParse(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Create a new source-unavailable error for `path`
    pub fn source_unavailable(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            path: path.as_ref().display().to_string(),
            reason: reason.into(),
        }
    }

    /// Classify an I/O error raised while reading a host source.
    pub fn from_source_io(path: impl AsRef<Path>, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.as_ref().display().to_string(),
            },
            _ => Self::source_unavailable(path, err.to_string()),
        }
    }

    /// Classify an I/O error raised while spawning an external tool.
    pub fn from_spawn_io(tool: impl Into<String>, err: io::Error) -> Self {
        let tool = tool.into();
        match err.kind() {
            io::ErrorKind::NotFound => Self::ToolNotFound { tool },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path: tool },
            _ => Self::ToolExecution {
                tool,
                code: None,
                stderr: err.to_string(),
            },
        }
    }
}
