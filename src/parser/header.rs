//! RFC 5322 header values: unfolding and RFC 2047 encoded-word decoding.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use tracing::warn;

/// Encoded words are frequently emitted without padding.
const ENCODED_WORD_B64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Remove header folding: a line break followed by whitespace becomes just the whitespace.
pub fn unfold(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' if chars.peek() == Some(&'\n') => {
                chars.next();
                if !matches!(chars.peek(), Some(' ' | '\t')) {
                    result.push_str("\r\n");
                }
            }
            '\n' => {
                if !matches!(chars.peek(), Some(' ' | '\t')) {
                    result.push('\n');
                }
            }
            _ => result.push(ch),
        }
    }
    result.trim().to_string()
}

/// Decode a raw header value into a single readable string.
///
/// Each encoded word is decoded on its own with its declared charset and the
/// pieces are concatenated with nothing in between. Whitespace that only
/// separates two encoded words is dropped (RFC 2047 §6.2); text outside
/// encoded words is kept verbatim.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// Malformed encoded words are preserved as-is.
pub fn decode_header(raw: &str) -> String {
    let input = unfold(raw);
    let mut result = String::with_capacity(input.len());
    let mut remaining = input.as_str();
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        let after_start = &remaining[start + 2..];

        match try_decode_one_word(after_start) {
            Some(decoded) => {
                if !last_was_encoded || !before.trim().is_empty() {
                    result.push_str(before);
                }
                result.push_str(&decoded.text);
                remaining = &remaining[start + 2 + decoded.consumed..];
                last_was_encoded = true;
            }
            None => {
                result.push_str(before);
                result.push_str("=?");
                remaining = after_start;
                last_was_encoded = false;
            }
        }
    }

    result.push_str(remaining);
    result
}

/// `true` if the value contains at least one well-formed encoded word.
pub fn has_encoded_words(raw: &str) -> bool {
    let mut remaining = raw;
    while let Some(start) = remaining.find("=?") {
        if try_decode_one_word(&remaining[start + 2..]).is_some() {
            return true;
        }
        remaining = &remaining[start + 2..];
    }
    false
}

struct DecodedWord {
    text: String,
    /// Bytes consumed from the string *after* the initial `=?`.
    consumed: usize,
}

fn try_decode_one_word(s: &str) -> Option<DecodedWord> {
    // charset?encoding?encoded_text?=
    let first_q = s.find('?')?;
    let charset = &s[..first_q];
    if charset.is_empty() || charset.contains(char::is_whitespace) {
        return None;
    }

    let rest = &s[first_q + 1..];
    let second_q = rest.find('?')?;
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let end = rest2.find("?=")?;
    let encoded_text = &rest2[..end];
    if encoded_text.contains(char::is_whitespace) {
        return None;
    }

    let bytes = match encoding {
        "B" | "b" => ENCODED_WORD_B64.decode(encoded_text).ok()?,
        "Q" | "q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    Some(DecodedWord {
        text: decode_word_charset(charset, &bytes),
        consumed: first_q + 1 + second_q + 1 + end + 2,
    })
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                match std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                {
                    Some(byte) => {
                        result.push(byte);
                        i += 3;
                    }
                    None => {
                        result.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

/// Decode the bytes of one encoded word with its charset label.
///
/// RFC 2231 language suffixes (`utf-8*en`) are ignored.
fn decode_word_charset(charset: &str, bytes: &[u8]) -> String {
    let label = charset.split('*').next().unwrap_or(charset);
    match super::charset::lookup(label) {
        Some(encoding) => {
            let (decoded, _) = encoding.decode_without_bom_handling(bytes);
            decoded.into_owned()
        }
        None => {
            warn!(charset = label, "Unknown charset in encoded word, falling back to UTF-8 lossy");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}
