//! Plain-text bodies: charset decoding, line wrapping and promotion to HTML.

use tracing::{debug, info};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::model::diagnostics::{Diagnostics, WarningKind};
use crate::model::mail::Part;
use crate::parser::charset;

/// Column at which plain-text lines are wrapped.
pub const WRAP_WIDTH: usize = 80;

const TAB_WIDTH: usize = 8;

/// Decode a `text/plain` part and turn it into a printable HTML document.
pub fn plain_body_to_html(part: &Part, diagnostics: &mut Diagnostics) -> String {
    let text = decode_plain_body(part, diagnostics);
    text_to_html(&text)
}

/// Decode the text of a `text/plain` part, never failing.
///
/// `8bit` parts are decoded strictly with their declared charset, falling
/// back to UTF-8 with replacement. Otherwise the declared charset (UTF-8
/// when absent) is used; malformed bytes become U+FFFD.
pub fn decode_plain_body(part: &Part, diagnostics: &mut Diagnostics) -> String {
    let bytes = part.decoded_payload().unwrap_or_default();

    if part.has_transfer_encoding("8bit") {
        info!(charset = part.charset(), "Plain body is pre-decoded (8bit transfer encoding)");
        if let Some(text) = part
            .charset()
            .and_then(charset::lookup)
            .and_then(|encoding| charset::decode_strict(bytes, encoding))
        {
            return text;
        }
        let text = String::from_utf8_lossy(bytes);
        if matches!(text, std::borrow::Cow::Owned(_)) {
            diagnostics.warn(
                WarningKind::LossyDecode,
                "Invalid UTF-8 in 8bit plain message body, replacing undecodable bytes",
            );
        }
        return text.into_owned();
    }

    let label = part.charset().unwrap_or("utf-8");
    info!(charset = label, "Plain text body");

    let encoding = match charset::lookup(label) {
        Some(encoding) => encoding,
        None => {
            diagnostics.warn(
                WarningKind::UnknownCharset,
                format!("Unknown charset '{label}' in plain message body, decoding as UTF-8"),
            );
            encoding_rs::UTF_8
        }
    };

    let (text, replaced) = charset::decode_lossy(bytes, encoding);
    if replaced {
        diagnostics.warn(
            WarningKind::LossyDecode,
            "Undecodable bytes in plain message body, replacing them",
        );
    }
    text
}

/// Wrap, escape and embed text in a minimal monospace HTML document.
pub fn text_to_html(text: &str) -> String {
    let wrapped = wrap_text(text, WRAP_WIDTH);
    format!("<html><body><pre>\n{}\n</pre></body></html>", html_escape(&wrapped))
}

/// Wrap every line of `text` to `width` display columns.
///
/// Each input line is wrapped on its own. Tabs are expanded, trailing
/// whitespace is dropped and words longer than `width` are split. Text that
/// is already wrapped comes back unchanged.
pub fn wrap_text(text: &str, width: usize) -> String {
    let mut out: Vec<String> = Vec::new();
    for line in text.lines() {
        wrap_line(&expand_tabs(line), width, &mut out);
    }
    debug!(lines = out.len(), "Wrapped plain text");
    out.join("\n")
}

fn wrap_line(line: &str, width: usize, out: &mut Vec<String>) {
    if line.width() <= width {
        out.push(line.trim_end().to_string());
        return;
    }

    let mut current = String::new();
    let mut current_width = 0;
    let mut first = true;

    for chunk in split_chunks(line) {
        let is_space = chunk.starts_with(char::is_whitespace);
        let chunk_width = chunk.width();

        if is_space {
            if current.is_empty() && !first {
                continue;
            }
            if current_width + chunk_width <= width {
                current.push_str(chunk);
                current_width += chunk_width;
            } else {
                if !current.trim_end().is_empty() {
                    out.push(current.trim_end().to_string());
                }
                current.clear();
                current_width = 0;
                first = false;
            }
            continue;
        }

        if current_width + chunk_width > width && !current.trim_end().is_empty() {
            out.push(current.trim_end().to_string());
            current.clear();
            current_width = 0;
            first = false;
        }

        if chunk_width <= width - current_width {
            current.push_str(chunk);
            current_width += chunk_width;
            continue;
        }

        // A single word wider than the remaining room: split it by columns.
        for ch in chunk.chars() {
            let w = ch.width().unwrap_or(0);
            if current_width + w > width && !current.is_empty() {
                out.push(std::mem::take(&mut current));
                current_width = 0;
                first = false;
            }
            current.push(ch);
            current_width += w;
        }
    }

    let rest = current.trim_end();
    if !rest.is_empty() || first {
        out.push(rest.to_string());
    }
}

/// Split a line into alternating runs of whitespace and non-whitespace.
fn split_chunks(line: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut in_space: Option<bool> = None;
    for (i, ch) in line.char_indices() {
        let space = ch.is_whitespace();
        if in_space.is_some_and(|s| s != space) {
            chunks.push(&line[start..i]);
            start = i;
        }
        in_space = Some(space);
    }
    if start < line.len() {
        chunks.push(&line[start..]);
    }
    chunks
}

/// Replace tabs with spaces up to the next multiple of [`TAB_WIDTH`] columns.
fn expand_tabs(line: &str) -> String {
    if !line.contains('\t') {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + 8);
    let mut column = 0;
    for ch in line.chars() {
        if ch == '\t' {
            let pad = TAB_WIDTH - column % TAB_WIDTH;
            out.extend(std::iter::repeat_n(' ', pad));
            column += pad;
        } else {
            out.push(ch);
            column += ch.width().unwrap_or(0);
        }
    }
    out
}

/// Escape the five HTML-significant characters.
pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::mime::parse_message;

    fn strip_ws(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_short_lines_untouched() {
        assert_eq!(wrap_text("hello\n\nworld  ", 80), "hello\n\nworld");
    }

    #[test]
    fn test_wraps_on_word_boundaries() {
        let line = "word ".repeat(30);
        let wrapped = wrap_text(&line, 80);
        for l in wrapped.lines() {
            assert!(l.width() <= 80, "line too wide: {l:?}");
            assert!(!l.starts_with(' '));
        }
        assert_eq!(strip_ws(&wrapped), strip_ws(&line));
        assert_eq!(wrapped.lines().count(), 2);
    }

    #[test]
    fn test_long_word_is_split() {
        let word = "x".repeat(200);
        let wrapped = wrap_text(&word, 80);
        let lines: Vec<&str> = wrapped.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), 80);
        assert_eq!(lines[2].len(), 40);
    }

    #[test]
    fn test_wrapping_is_idempotent() {
        let text = format!(
            "{}\n\tindented {}\n{}",
            "lorem ipsum dolor ".repeat(12),
            "x".repeat(150),
            "short"
        );
        let once = wrap_text(&text, 80);
        assert_eq!(wrap_text(&once, 80), once);
    }

    #[test]
    fn test_leading_indent_kept_on_first_line() {
        let text = format!("    {}", "abc ".repeat(30));
        let wrapped = wrap_text(&text, 80);
        assert!(wrapped.starts_with("    abc"));
        assert!(wrapped.lines().nth(1).is_some_and(|l| l.starts_with("abc")));
    }

    #[test]
    fn test_overflowing_leading_whitespace_dropped() {
        let text = format!("{}word", " ".repeat(100));
        assert_eq!(wrap_text(&text, 80), "word");
    }

    #[test]
    fn test_wrapping_keeps_every_word() {
        let text = format!("{} tail", "lorem ipsum dolor sit amet ".repeat(20));
        let wrapped = wrap_text(&text, 80);
        assert!(wrapped.lines().all(|l| l.width() <= 80 && !l.is_empty()));
        let before: Vec<&str> = text.split_whitespace().collect();
        let after: Vec<&str> = wrapped.split_whitespace().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_wide_characters_counted_by_width() {
        let text = "漢".repeat(50);
        let wrapped = wrap_text(&text, 80);
        let first = wrapped.lines().next().unwrap();
        assert_eq!(first.width(), 80);
        assert_eq!(first.chars().count(), 40);
    }

    #[test]
    fn test_expand_tabs() {
        assert_eq!(expand_tabs("a\tb"), "a       b");
        assert_eq!(expand_tabs("\t"), "        ");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#x27;Jerry&#x27;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_text_to_html_document() {
        assert_eq!(
            text_to_html("a < b"),
            "<html><body><pre>\na &lt; b\n</pre></body></html>"
        );
    }

    #[test]
    fn test_decode_declared_charset() {
        let msg = parse_message(
            b"Content-Type: text/plain; charset=iso-8859-1\r\n\r\ncaf\xe9\r\n",
        )
        .unwrap();
        let mut diag = Diagnostics::new();
        let text = decode_plain_body(msg.root(), &mut diag);
        assert!(text.starts_with("café"));
        assert!(!diag.has_warnings());
    }

    #[test]
    fn test_decode_invalid_utf8_warns_once() {
        let msg = parse_message(
            b"Content-Type: text/plain; charset=utf-8\r\n\r\nbad \xff\xfe bytes\r\n",
        )
        .unwrap();
        let mut diag = Diagnostics::new();
        let text = decode_plain_body(msg.root(), &mut diag);
        assert!(text.contains('\u{FFFD}'));
        assert_eq!(diag.warnings().len(), 1);
        assert_eq!(diag.count(WarningKind::LossyDecode), 1);
    }

    #[test]
    fn test_decode_8bit_honors_declared_charset() {
        let msg = parse_message(
            b"Content-Type: text/plain; charset=iso-8859-1\r\n\
Content-Transfer-Encoding: 8bit\r\n\r\nna\xefve\r\n",
        )
        .unwrap();
        let mut diag = Diagnostics::new();
        let text = decode_plain_body(msg.root(), &mut diag);
        assert!(text.starts_with("naïve"));
        assert!(!diag.has_warnings());
    }

    #[test]
    fn test_decode_8bit_without_charset_is_utf8() {
        let msg = parse_message(
            b"Content-Type: text/plain\r\n\
Content-Transfer-Encoding: 8bit\r\n\r\nna\xc3\xafve\r\n",
        )
        .unwrap();
        let mut diag = Diagnostics::new();
        assert!(decode_plain_body(msg.root(), &mut diag).starts_with("naïve"));
        assert!(!diag.has_warnings());
    }

    #[test]
    fn test_decode_8bit_failing_charset_falls_back_lossy() {
        let msg = parse_message(
            b"Content-Type: text/plain; charset=utf-8\r\n\
Content-Transfer-Encoding: 8bit\r\n\r\nbad \xff bytes\r\n",
        )
        .unwrap();
        let mut diag = Diagnostics::new();
        let text = decode_plain_body(msg.root(), &mut diag);
        assert!(text.starts_with("bad \u{FFFD} bytes"));
        assert_eq!(diag.warnings().len(), 1);
        assert_eq!(diag.count(WarningKind::LossyDecode), 1);
    }

    #[test]
    fn test_unknown_charset_warns() {
        let msg = parse_message(b"Content-Type: text/plain; charset=x-martian\r\n\r\nhi\r\n")
            .unwrap();
        let mut diag = Diagnostics::new();
        let text = decode_plain_body(msg.root(), &mut diag);
        assert!(text.starts_with("hi"));
        assert_eq!(diag.count(WarningKind::UnknownCharset), 1);
    }
}
