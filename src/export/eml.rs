//! Sidecar files written next to the output PDF when a run has problems.
//!
//! `<stem>_warnings_and_errors.txt` summarizes what went wrong and
//! `<stem>_original.eml` keeps the input so the message can be retried.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{ConvertError, Result};
use crate::model::diagnostics::Diagnostics;

use super::filename::modified_output_name;

pub const WARNINGS_SUFFIX: &str = "_warnings_and_errors.txt";
pub const ORIGINAL_SUFFIX: &str = "_original.eml";

/// Path of the warnings summary for `output_pdf`.
pub fn warnings_path(output_pdf: &Path) -> PathBuf {
    modified_output_name(output_pdf, WARNINGS_SUFFIX)
}

/// Path of the preserved input for `output_pdf`.
pub fn original_path(output_pdf: &Path) -> PathBuf {
    modified_output_name(output_pdf, ORIGINAL_SUFFIX)
}

/// Write the warnings summary, with an `ERROR:` line when `fatal` is set.
///
/// Nothing is written when there is neither a warning nor an error.
pub fn write_warnings_file(
    output_pdf: &Path,
    diagnostics: &Diagnostics,
    fatal: Option<&str>,
) -> Result<Option<PathBuf>> {
    if !diagnostics.has_warnings() && fatal.is_none() {
        return Ok(None);
    }
    let path = warnings_path(output_pdf);
    std::fs::write(&path, diagnostics.summary(fatal)).map_err(|e| ConvertError::io(&path, e))?;
    info!(path = %path.display(), "Wrote warnings summary");
    Ok(Some(path))
}

/// Save the verbatim input next to the output PDF.
pub fn write_original_copy(output_pdf: &Path, original: &[u8]) -> Result<PathBuf> {
    let path = original_path(output_pdf);
    std::fs::write(&path, original).map_err(|e| ConvertError::io(&path, e))?;
    info!(path = %path.display(), "Saved original message");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::diagnostics::WarningKind;

    #[test]
    fn test_sidecar_paths() {
        let pdf = Path::new("/out/2024-01-01T00-00-00.pdf");
        assert_eq!(
            warnings_path(pdf),
            PathBuf::from("/out/2024-01-01T00-00-00_warnings_and_errors.txt")
        );
        assert_eq!(original_path(pdf), PathBuf::from("/out/2024-01-01T00-00-00_original.eml"));
    }

    #[test]
    fn test_no_warnings_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("mail.pdf");
        assert_eq!(write_warnings_file(&pdf, &Diagnostics::new(), None).unwrap(), None);
        assert!(!warnings_path(&pdf).exists());
    }

    #[test]
    fn test_error_only_still_written() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("mail.pdf");
        let path = write_warnings_file(&pdf, &Diagnostics::new(), Some("boom"))
            .unwrap()
            .unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "ERROR: boom\n");
    }

    #[test]
    fn test_warnings_and_original_written() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("mail.pdf");
        let mut diag = Diagnostics::new();
        diag.warn(WarningKind::LossyDecode, "bad bytes");

        let summary = write_warnings_file(&pdf, &diag, None).unwrap().unwrap();
        assert_eq!(std::fs::read_to_string(summary).unwrap(), "WARNING: bad bytes\n");

        let original = write_original_copy(&pdf, b"raw\xffbytes").unwrap();
        assert_eq!(std::fs::read(original).unwrap(), b"raw\xffbytes");
    }
}
