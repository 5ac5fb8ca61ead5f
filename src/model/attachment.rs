//! Extracted attachment records.

use std::path::PathBuf;

use super::mail::PartId;

/// One attachment written to the output directory.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExtractedAttachment {
    /// Final path on disk, after collision resolution.
    pub path: PathBuf,

    /// Filename before collision resolution (decoded, date-prefixed if requested).
    pub filename: String,

    /// Declared MIME type of the source part.
    pub content_type: String,

    /// Number of bytes written.
    pub size: u64,

    /// The part the file was extracted from.
    pub part: PartId,
}
