//! HTML bodies: charset decoding with detection fallback and `cid:` inlining.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::error::{ConvertError, Result};
use crate::model::diagnostics::{Diagnostics, WarningKind};
use crate::model::mail::{Message, Part, PartSet};
use crate::parser::{charset, finder, mime};

/// `cid:` references as they appear in `src` attributes and CSS.
static CID_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"cid:([\w_@.-]+)").expect("cid pattern is valid"));

/// Placeholder written in place of a `cid:` reference that matches no part.
pub const BROKEN_IMAGE: &str = "broken";

/// Decode a `text/html` part and inline every image it references by Content-ID.
///
/// Resolved image parts are added to `consumed`.
pub fn html_body(
    msg: &Message,
    part: &Part,
    consumed: &mut PartSet,
    diagnostics: &mut Diagnostics,
) -> Result<String> {
    let html = decode_html_body(part)?;
    inline_cid_images(msg, &html, consumed, diagnostics)
}

/// Decode HTML bytes with the declared charset, retrying once with a detected one.
pub fn decode_html_body(part: &Part) -> Result<String> {
    let bytes = part.decoded_payload().unwrap_or_default();
    let declared = part.charset().unwrap_or("utf-8");
    info!(charset = declared, "HTML body");

    if let Some(text) = charset::lookup(declared).and_then(|enc| charset::decode_strict(bytes, enc))
    {
        return Ok(text);
    }

    let detected = charset::detect_charset(bytes);
    info!(
        declared,
        detected = detected.name(),
        "Declared charset can't decode body; trying again with detected charset"
    );
    charset::decode_strict(bytes, detected).ok_or_else(|| ConvertError::Charset {
        declared: declared.to_string(),
        detected: detected.name().to_string(),
    })
}

/// Replace every `cid:<token>` in `html` with a `data:` URI.
///
/// Tokens are looked up by Content-ID, then by Content-Type `name`. Tokens
/// that match nothing become [`BROKEN_IMAGE`] and record a warning.
pub fn inline_cid_images(
    msg: &Message,
    html: &str,
    consumed: &mut PartSet,
    diagnostics: &mut Diagnostics,
) -> Result<String> {
    let mut out = String::with_capacity(html.len());
    let mut last = 0;

    for caps in CID_REFERENCE.captures_iter(html) {
        let (Some(whole), Some(token)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&html[last..whole.start()]);
        last = whole.end();

        let cid = token.as_str();
        debug!(cid, "Looking for image for cid");
        let image = finder::first_by_content_id(msg, cid)
            .or_else(|| finder::first_by_content_type_name(msg, cid));

        match image {
            Some(image) => {
                out.push_str(&data_uri(cid, image)?);
                consumed.insert(image.id);
            }
            None => {
                diagnostics.warn(
                    WarningKind::UnresolvedInlineImage,
                    format!("Could not find image cid {cid} in email content."),
                );
                out.push_str(BROKEN_IMAGE);
            }
        }
    }

    out.push_str(&html[last..]);
    Ok(out)
}

/// Build a `data:` URI from a base64-encoded image part.
///
/// The MIME type is sniffed from the decoded bytes; the declared type is ignored.
fn data_uri(cid: &str, image: &Part) -> Result<String> {
    if !image.has_transfer_encoding("base64") {
        return Err(ConvertError::InlineImageEncoding {
            cid: cid.to_string(),
            encoding: image
                .transfer_encoding
                .clone()
                .unwrap_or_else(|| "none".to_string()),
        });
    }

    let encoded: String = String::from_utf8_lossy(image.raw_payload().unwrap_or_default())
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect();
    let mime_type = mime::sniff_mime_type(image.decoded_payload().unwrap_or_default());

    Ok(format!("data:{mime_type};base64,{encoded}"))
}
