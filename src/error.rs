//! Centralized error types for eml2pdf.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the eml2pdf library.
///
/// Every variant except [`ConvertError::Io`] is an *expected* fatal
/// condition: it carries a human-readable message and aborts the run with
/// the "fatal" exit status. I/O failures are reported as internal errors.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The input file does not exist.
    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    /// The message could not be parsed, or the parse tree has structural defects.
    #[error("Defects parsing email: {0}")]
    Parse(String),

    /// Neither a `text/html` nor a `text/plain` part exists and a body was required.
    #[error("No body parts found; aborting.")]
    NoBody,

    /// The HTML body could not be decoded, even after charset detection.
    #[error("Could not decode HTML body with charset '{declared}' nor detected charset '{detected}'")]
    Charset { declared: String, detected: String },

    /// An inline image referenced by `cid:` is not base64 encoded.
    #[error("Inline image '{cid}' has transfer encoding '{encoding}', only base64 is supported")]
    InlineImageEncoding { cid: String, encoding: String },

    /// The external HTML renderer is not installed.
    #[error("eml2pdf requires '{0}' to be installed and on the PATH")]
    RendererMissing(String),

    /// The external renderer failed or produced unexpected diagnostics.
    #[error("{0}")]
    Render(String),

    /// The output directory does not exist.
    #[error("Output directory does not exist: {0}")]
    OutputDirMissing(PathBuf),

    /// The requested output file already exists.
    #[error("Output file {0} already exists.")]
    OutputExists(PathBuf),

    /// The character encoding is not supported.
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// The rendered PDF could not be read or rewritten.
    #[error("PDF metadata error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// Any other expected fatal condition.
    #[error("{0}")]
    Fatal(String),
}

/// Convenience alias for `Result<T, ConvertError>`.
pub type Result<T> = std::result::Result<T, ConvertError>;

impl ConvertError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// `true` for expected fatal conditions, `false` for internal failures.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Io { .. })
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare; prefer `ConvertError::io`).
impl From<std::io::Error> for ConvertError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_is_not_fatal() {
        let err = ConvertError::io(
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        );
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("/tmp/x"));
    }

    #[test]
    fn test_expected_errors_are_fatal() {
        assert!(ConvertError::NoBody.is_fatal());
        assert!(ConvertError::Parse("x".into()).is_fatal());
        assert!(ConvertError::Render("bad".into()).is_fatal());
    }
}
