//! Non-fatal warnings collected during a run.
//!
//! Warnings are recorded explicitly and returned to the caller, which uses
//! them to decide on sidecar files and the exit status.

use std::fmt;

/// What kind of non-fatal problem occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A `cid:` reference in the HTML body matched no part.
    UnresolvedInlineImage,
    /// Body bytes had to be decoded with replacement characters.
    LossyDecode,
    /// A declared charset is unknown; UTF-8 was used instead.
    UnknownCharset,
    /// A remote `<img>` URL could not be fetched and was removed.
    UnreachableImage,
    /// No body was printed and no attachment could be extracted.
    NoAttachments,
}

/// One recorded warning.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WARNING: {}", self.message)
    }
}

/// Warnings accumulated during a single run.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and log it.
    pub fn warn(&mut self, kind: WarningKind, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(kind = ?kind, "{message}");
        self.warnings.push(Warning { kind, message });
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn count(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }

    /// Text for the warnings sidecar file: one `WARNING: ...` line per warning,
    /// followed by an `ERROR: ...` line when the run failed.
    pub fn summary(&self, fatal: Option<&str>) -> String {
        let mut out = String::new();
        for warning in &self.warnings {
            out.push_str(&warning.to_string());
            out.push('\n');
        }
        if let Some(message) = fatal {
            out.push_str("ERROR: ");
            out.push_str(message);
            out.push('\n');
        }
        out
    }
}
