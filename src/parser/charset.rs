//! Charset lookup, strict and lossy decoding, and statistical detection.

use encoding_rs::Encoding;

/// Resolve a MIME charset label (case-insensitive, whitespace tolerant).
pub fn lookup(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().trim_matches('"').as_bytes())
}

/// Decode `bytes` strictly: `None` on an unknown label or any malformed sequence.
pub fn decode_strict(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
}

/// Decode `bytes`, replacing malformed sequences with U+FFFD.
///
/// Returns the text and whether any replacement happened.
pub fn decode_lossy(bytes: &[u8], encoding: &'static Encoding) -> (String, bool) {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    (text.into_owned(), had_errors)
}

/// Best statistical guess for the charset of `bytes`.
///
/// Only used as a fallback when the declared charset cannot decode the body.
pub fn detect_charset(bytes: &[u8]) -> &'static Encoding {
    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}
