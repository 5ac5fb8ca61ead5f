//! MIME tree construction: turns raw message bytes into a [`Message`] arena.
//!
//! Parsing is delegated to `mailparse`; this module copies its tree into an
//! owned, index-addressed arena and scans it for structural defects. A
//! message with any defect is rejected as a whole.

use std::fmt;

use mailparse::body::Body;
use mailparse::{MailHeader, ParsedMail};
use tracing::debug;

use crate::error::{ConvertError, Result};
use crate::model::mail::{Header, Headers, Message, Part, PartBody, PartId};
use crate::parser::header::unfold;

/// Maximum multipart nesting accepted before the tree is considered malformed.
const MAX_DEPTH: usize = 64;

/// A complete message carried as the payload of a part.
const ENCAPSULATED_MESSAGE: &str = "message/rfc822";

/// A structural problem found while building the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defect {
    pub part: PartId,
    pub kind: DefectKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefectKind {
    /// `multipart/*` without a `boundary` parameter.
    NoBoundary,
    /// The opening `--boundary` line never appears.
    StartBoundaryNotFound,
    /// The closing `--boundary--` line is missing.
    CloseBoundaryNotFound,
    /// The payload cannot be decoded with its transfer encoding.
    UndecodablePayload(String),
    /// Multipart nesting deeper than [`MAX_DEPTH`].
    TooDeep,
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let part = self.part.0;
        match &self.kind {
            DefectKind::NoBoundary => write!(f, "part {part}: multipart without boundary"),
            DefectKind::StartBoundaryNotFound => {
                write!(f, "part {part}: start boundary not found")
            }
            DefectKind::CloseBoundaryNotFound => {
                write!(f, "part {part}: close boundary not found")
            }
            DefectKind::UndecodablePayload(reason) => {
                write!(f, "part {part}: undecodable payload ({reason})")
            }
            DefectKind::TooDeep => write!(f, "part {part}: nesting deeper than {MAX_DEPTH}"),
        }
    }
}

/// Parse a raw message and reject it if the tree has any defect.
pub fn parse_message(raw_message: &[u8]) -> Result<Message> {
    let (message, defects) = parse_message_tree(raw_message)?;
    if !defects.is_empty() {
        let listed: Vec<String> = defects.iter().map(ToString::to_string).collect();
        return Err(ConvertError::Parse(listed.join("; ")));
    }
    Ok(message)
}

/// Parse a raw message and return the tree together with every defect found.
///
/// Only fails when the underlying parser cannot produce a tree at all.
pub fn parse_message_tree(raw_message: &[u8]) -> Result<(Message, Vec<Defect>)> {
    let parsed =
        mailparse::parse_mail(raw_message).map_err(|e| ConvertError::Parse(e.to_string()))?;

    let mut parts = Vec::new();
    let mut defects = Vec::new();
    push_part(&parsed, 0, &mut parts, &mut defects);

    debug!(parts = parts.len(), defects = defects.len(), "Built message tree");
    Ok((Message::from_parts(parts), defects))
}

/// Copy `parsed` and its descendants into `parts` in pre-order.
///
/// `message/rfc822` payloads are parsed in turn and their root becomes the
/// only child of the encapsulating part.
fn push_part(
    parsed: &ParsedMail<'_>,
    depth: usize,
    parts: &mut Vec<Part>,
    defects: &mut Vec<Defect>,
) -> PartId {
    let id = PartId(parts.len());
    let headers = collect_headers(&parsed.headers);

    let transfer_encoding = headers
        .get("content-transfer-encoding")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let content_id = headers
        .get("content-id")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let filename = declared_filename(&headers, parsed);

    let is_multipart = parsed.ctype.mimetype.starts_with("multipart/");
    let is_encapsulated = parsed.ctype.mimetype == ENCAPSULATED_MESSAGE;

    let mut encapsulated = None;
    let body = if is_multipart {
        check_boundaries(parsed, id, defects);
        PartBody::Multipart(Vec::new())
    } else {
        let raw = encoded_body(parsed);
        let decoded = match parsed.get_body_raw() {
            Ok(decoded) => decoded,
            Err(e) => {
                defects.push(Defect {
                    part: id,
                    kind: DefectKind::UndecodablePayload(e.to_string()),
                });
                Vec::new()
            }
        };
        if is_encapsulated {
            encapsulated = Some(decoded);
            PartBody::Multipart(Vec::new())
        } else {
            PartBody::Leaf { raw, decoded }
        }
    };

    parts.push(Part {
        id,
        headers,
        content_type: parsed.ctype.mimetype.clone(),
        params: parsed.ctype.params.clone(),
        transfer_encoding,
        content_id,
        filename,
        body,
    });

    if !is_multipart && !is_encapsulated {
        return id;
    }
    if depth >= MAX_DEPTH {
        defects.push(Defect {
            part: id,
            kind: DefectKind::TooDeep,
        });
        return id;
    }

    let children: Vec<PartId> = match encapsulated {
        Some(inner) => match mailparse::parse_mail(&inner) {
            Ok(inner) => vec![push_part(&inner, depth + 1, parts, defects)],
            Err(e) => {
                defects.push(Defect {
                    part: id,
                    kind: DefectKind::UndecodablePayload(e.to_string()),
                });
                Vec::new()
            }
        },
        None => parsed
            .subparts
            .iter()
            .map(|sub| push_part(sub, depth + 1, parts, defects))
            .collect(),
    };
    parts[id.0].body = PartBody::Multipart(children);

    id
}

/// Raw header values with folding removed (encoded words are kept).
fn collect_headers(raw: &[MailHeader<'_>]) -> Headers {
    Headers::new(
        raw.iter()
            .map(|h| Header {
                name: h.get_key(),
                value: unfold(&String::from_utf8_lossy(h.get_value_raw())),
            })
            .collect(),
    )
}

/// Content-Disposition `filename`, else Content-Type `name`.
///
/// Parameters are read from the raw header so that encoded words survive
/// for the header decoder; RFC 2231 continuations are resolved by `mailparse`.
fn declared_filename(headers: &Headers, parsed: &ParsedMail<'_>) -> Option<String> {
    headers
        .get("content-disposition")
        .and_then(|raw| {
            mailparse::parse_content_disposition(raw)
                .params
                .get("filename")
                .cloned()
        })
        .or_else(|| {
            headers
                .get("content-type")
                .and_then(|raw| mailparse::parse_content_type(raw).params.get("name").cloned())
        })
        .or_else(|| parsed.ctype.params.get("name").cloned())
}

/// The body exactly as it appears in the message.
fn encoded_body(parsed: &ParsedMail<'_>) -> Vec<u8> {
    match parsed.get_body_encoded() {
        Body::Base64(body) | Body::QuotedPrintable(body) => body.get_raw().to_vec(),
        Body::SevenBit(body) | Body::EightBit(body) => body.get_raw().to_vec(),
        Body::Binary(body) => body.get_raw().to_vec(),
    }
}

/// Verify that a multipart body declares and actually uses its boundary.
fn check_boundaries(parsed: &ParsedMail<'_>, id: PartId, defects: &mut Vec<Defect>) {
    let Some(boundary) = parsed.ctype.params.get("boundary") else {
        defects.push(Defect {
            part: id,
            kind: DefectKind::NoBoundary,
        });
        return;
    };

    // `raw_bytes` spans the whole part; mailparse keeps only the preamble as its body.
    let body = parsed.raw_bytes;
    let open = format!("--{boundary}");
    let close = format!("--{boundary}--");

    if !contains_line_starting_with(body, open.as_bytes()) {
        defects.push(Defect {
            part: id,
            kind: DefectKind::StartBoundaryNotFound,
        });
    } else if !contains_line_starting_with(body, close.as_bytes()) {
        defects.push(Defect {
            part: id,
            kind: DefectKind::CloseBoundaryNotFound,
        });
    }
}

fn contains_line_starting_with(body: &[u8], prefix: &[u8]) -> bool {
    body.split(|&b| b == b'\n').any(|line| line.starts_with(prefix))
}

/// Detect a MIME type from content alone, ignoring any declared type.
pub fn sniff_mime_type(bytes: &[u8]) -> String {
    tree_magic_mini::from_u8(bytes).to_string()
}
