//! Output file naming: extension inference, date prefixes and collision handling.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

/// Name used for attachments with neither a filename nor a Content-ID.
pub const FLOATING_ATTACHMENT: &str = "floating_attachment";

/// Redundant aliases dropped before picking an extension (`.jpg` wins for JPEG).
const EXTENSION_BLACKLIST: [&str; 5] = ["jfif", "jpe", "jpeg", "pjp", "pjpeg"];

static DATE_SHAPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}[-_]\d{2}[-_]\d{2}").expect("date pattern is valid"));

/// Best-guess extension for a MIME type, with a leading dot.
///
/// All known extensions minus the blacklist, sorted; the first one wins.
pub fn guess_extension(mime_type: &str) -> Option<String> {
    let known = mime_guess::get_mime_extensions_str(&mime_type.to_ascii_lowercase())?;
    let mut candidates: Vec<&str> = known
        .iter()
        .copied()
        .filter(|ext| !EXTENSION_BLACKLIST.contains(ext))
        .collect();
    candidates.sort_unstable();
    candidates.first().map(|ext| format!(".{ext}"))
}

/// Prefix `name` with `YYYY-MM-DD-` unless it already contains a date.
pub fn add_date_prefix(name: &str, date: NaiveDate) -> String {
    if DATE_SHAPED.is_match(name) {
        name.to_string()
    } else {
        format!("{}-{name}", date.format("%Y-%m-%d"))
    }
}

/// Return `path`, or the first `stem_N.ext` (N = 1, 2, ...) that does not exist.
///
/// The check is not atomic with the later write.
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
    let parent = path.parent().unwrap_or(Path::new("."));

    let mut counter = 1u64;
    loop {
        let candidate = match &ext {
            Some(ext) => parent.join(format!("{stem}_{counter}.{ext}")),
            None => parent.join(format!("{stem}_{counter}")),
        };
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// `dir/stem.pdf` + `suffix` → `dir/stem<suffix>`.
pub fn modified_output_name(output: &Path, suffix: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!("{stem}{suffix}"))
}

/// Timestamped name for the body PDF.
pub fn default_output_name(now: NaiveDateTime) -> String {
    format!("{}.pdf", now.format("%Y-%m-%dT%H-%M-%S"))
}

/// Make a decoded attachment name safe to join onto the output directory.
///
/// Path separators and control characters become `_`. Returns `None` when
/// nothing usable is left.
pub fn sanitize_attachment_name(name: &str) -> Option<String> {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    match sanitized.as_str() {
        "" | "." | ".." => None,
        _ => Some(sanitized),
    }
}
