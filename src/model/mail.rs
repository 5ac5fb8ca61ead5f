//! Core message tree types.
//!
//! A parsed message is an arena of [`Part`]s. Index 0 is the root and the
//! arena order is the pre-order walk order, so "first part matching X" is
//! simply the first match in [`Message::all_parts`]. Parts are identified by
//! [`PartId`], never by content: two parts with identical bytes are distinct.

use std::collections::BTreeSet;

/// Stable identity of a part inside its [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct PartId(pub usize);

/// A set of parts, by identity (consumed inline images, exclusion sets).
pub type PartSet = BTreeSet<PartId>;

/// One raw header field. The value keeps encoded words but has folding removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Multi-valued, order-preserving header map with case-insensitive lookup.
#[derive(Debug, Clone, Default)]
pub struct Headers(Vec<Header>);

impl Headers {
    pub fn new(headers: Vec<Header>) -> Self {
        Self(headers)
    }

    /// First value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

/// Body of a part: either child parts or a leaf payload.
#[derive(Debug, Clone)]
pub enum PartBody {
    /// `multipart/*` containers and encapsulated `message/rfc822` parts.
    Multipart(Vec<PartId>),
    Leaf {
        /// Body exactly as it appears in the message (still transfer-encoded).
        raw: Vec<u8>,
        /// Transfer-decoded bytes (no charset decoding applied).
        decoded: Vec<u8>,
    },
}

/// A node in the message tree.
#[derive(Debug, Clone)]
pub struct Part {
    pub id: PartId,
    pub headers: Headers,
    /// Lowercased `type/subtype`. Defaults to `text/plain`.
    pub content_type: String,
    /// Content-Type parameters (lowercased keys).
    pub params: std::collections::BTreeMap<String, String>,
    /// `Content-Transfer-Encoding`, trimmed, as written.
    pub transfer_encoding: Option<String>,
    /// `Content-ID`, trimmed, as written (normally `<...>`).
    pub content_id: Option<String>,
    /// Declared filename (Content-Disposition `filename`, else Content-Type
    /// `name`). May still contain encoded words.
    pub filename: Option<String>,
    pub body: PartBody,
}

impl Part {
    pub fn is_multipart(&self) -> bool {
        matches!(self.body, PartBody::Multipart(_))
    }

    /// Transfer-decoded payload. `None` for multipart parts.
    pub fn decoded_payload(&self) -> Option<&[u8]> {
        match &self.body {
            PartBody::Leaf { decoded, .. } => Some(decoded),
            PartBody::Multipart(_) => None,
        }
    }

    /// Undecoded payload as it appears in the message. `None` for multipart parts.
    pub fn raw_payload(&self) -> Option<&[u8]> {
        match &self.body {
            PartBody::Leaf { raw, .. } => Some(raw),
            PartBody::Multipart(_) => None,
        }
    }

    /// Declared `charset` parameter, if any.
    pub fn charset(&self) -> Option<&str> {
        self.params.get("charset").map(String::as_str)
    }

    /// A Content-Type parameter by (lowercase) name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// `true` when the declared transfer encoding matches `encoding` (case-insensitive).
    pub fn has_transfer_encoding(&self, encoding: &str) -> bool {
        self.transfer_encoding
            .as_deref()
            .is_some_and(|e| e.eq_ignore_ascii_case(encoding))
    }

    /// Content-ID with surrounding angle brackets removed.
    pub fn bare_content_id(&self) -> Option<&str> {
        self.content_id
            .as_deref()
            .map(|cid| cid.trim_start_matches('<').trim_end_matches('>'))
            .filter(|cid| !cid.is_empty())
    }
}

/// A parsed email: the root headers plus the part arena.
#[derive(Debug, Clone)]
pub struct Message {
    parts: Vec<Part>,
}

impl Message {
    /// Build a message from an arena already in pre-order (root first).
    pub(crate) fn from_parts(parts: Vec<Part>) -> Self {
        debug_assert!(!parts.is_empty(), "a message always has a root part");
        Self { parts }
    }

    pub fn root(&self) -> &Part {
        &self.parts[0]
    }

    /// Root header map.
    pub fn headers(&self) -> &Headers {
        &self.root().headers
    }

    /// First raw value of a root header.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers().get(name)
    }

    /// Every part in pre-order, root and multipart containers included.
    pub fn all_parts(&self) -> impl Iterator<Item = &Part> {
        self.parts.iter()
    }

    pub fn part(&self, id: PartId) -> &Part {
        &self.parts[id.0]
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}
