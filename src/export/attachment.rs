//! Extract attachment parts to the output directory.

use std::path::Path;

use chrono::NaiveDate;
use humansize::{format_size, BINARY};
use tracing::{debug, info};

use crate::error::{ConvertError, Result};
use crate::model::attachment::ExtractedAttachment;
use crate::model::mail::{Message, Part, PartSet};
use crate::parser::{finder, header};

use super::filename::{
    add_date_prefix, guess_extension, sanitize_attachment_name, unique_path, FLOATING_ATTACHMENT,
};

/// Options for one extraction pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttachmentOptions {
    /// Prefix names lacking a date with this one.
    pub date_prefix: Option<NaiveDate>,
    /// Skip parts that declare no filename.
    pub ignore_floating: bool,
}

/// Write every attachment candidate not in `exclude` to `output_dir`.
///
/// Returns one record per file written; skipped floating parts are not counted.
pub fn extract_attachments(
    msg: &Message,
    output_dir: &Path,
    options: &AttachmentOptions,
    exclude: &PartSet,
) -> Result<Vec<ExtractedAttachment>> {
    let candidates = finder::attachment_candidates(msg, exclude);
    debug!(candidates = candidates.len(), "Attachments found");

    let mut written = Vec::new();
    for id in candidates {
        let part = msg.part(id);
        let Some(mut filename) = attachment_filename(part, options.ignore_floating) else {
            debug!(part = id.0, "Skipping floating attachment");
            continue;
        };

        if let Some(date) = options.date_prefix {
            filename = add_date_prefix(&filename, date);
        }

        let path = unique_path(&output_dir.join(&filename));
        let data = part.decoded_payload().unwrap_or_default();
        std::fs::write(&path, data).map_err(|e| ConvertError::io(&path, e))?;
        info!(
            path = %path.display(),
            size = %format_size(data.len(), BINARY),
            "Extracted attachment"
        );

        written.push(ExtractedAttachment {
            path,
            filename,
            content_type: part.content_type.clone(),
            size: data.len() as u64,
            part: id,
        });
    }

    Ok(written)
}

/// Name for an attachment part, or `None` if it should be skipped.
///
/// Declared filenames are decoded. Without one, the Content-ID or the
/// floating placeholder is used, plus an extension guessed from the type.
pub fn attachment_filename(part: &Part, ignore_floating: bool) -> Option<String> {
    if let Some(declared) = part.filename.as_deref() {
        let decoded = if header::has_encoded_words(declared) {
            let decoded = header::decode_header(declared);
            debug!(declared, decoded = %decoded, "Decoded attachment filename");
            decoded
        } else {
            declared.to_string()
        };
        match sanitize_attachment_name(&decoded) {
            Some(name) => return Some(name),
            None => debug!(declared, "Declared filename is unusable"),
        }
    }

    if ignore_floating {
        return None;
    }

    let base = part
        .bare_content_id()
        .and_then(sanitize_attachment_name)
        .unwrap_or_else(|| FLOATING_ATTACHMENT.to_string());
    let extension = guess_extension(&part.content_type).unwrap_or_default();
    Some(format!("{base}{extension}"))
}
