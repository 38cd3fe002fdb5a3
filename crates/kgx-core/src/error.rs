//! Error taxonomy for transformations.

use std::path::PathBuf;

/// Errors raised while reading, filtering or writing a graph.
///
/// Per-record errors are recoverable: the record is dropped, a warning is
/// logged and the run continues. Everything else aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum KgxError {
    #[error("malformed record: {reason}")]
    MalformedRecord { reason: String },

    #[error("incomplete association {id}: missing {}", .missing.join(", "))]
    IncompleteAssociation { id: String, missing: Vec<&'static str> },

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {format} input: {message}")]
    Parse { format: String, message: String },

    #[error("failed to write {format} output: {message}")]
    Write { format: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl KgxError {
    /// Shorthand for a malformed-record error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        KgxError::MalformedRecord {
            reason: reason.into(),
        }
    }

    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        KgxError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(format: impl Into<String>, message: impl ToString) -> Self {
        KgxError::Parse {
            format: format.into(),
            message: message.to_string(),
        }
    }

    pub fn write(format: impl Into<String>, message: impl ToString) -> Self {
        KgxError::Write {
            format: format.into(),
            message: message.to_string(),
        }
    }

    /// Whether the run may continue after this error (the record is dropped).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            KgxError::MalformedRecord { .. } | KgxError::IncompleteAssociation { .. }
        )
    }
}

/// An edge was stored before one of its endpoints was seen.
///
/// Not an error: sources routinely stream edges ahead of the nodes they
/// reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferentialWarning {
    pub subject: String,
    pub object: String,
    pub missing: Vec<String>,
}

impl std::fmt::Display for ReferentialWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "edge {} -> {} references unknown node(s): {}",
            self.subject,
            self.object,
            self.missing.join(", ")
        )
    }
}
