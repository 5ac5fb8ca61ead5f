//! Reading a single message from a file or stdin.

use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::error::{ConvertError, Result};
use crate::parser::charset;

/// UTF-8 byte order mark.
const BOM: &[u8] = b"\xEF\xBB\xBF";

/// The bytes of one input message.
#[derive(Debug, Clone)]
pub struct InputMessage {
    /// Exactly what was read, kept for the `_original.eml` sidecar.
    pub original: Vec<u8>,
    /// UTF-8 (or untouched 8-bit) message bytes ready for parsing.
    pub message: Vec<u8>,
}

/// Read a message from `source` (`-` for stdin).
///
/// When `encoding` names anything other than UTF-8, the input is transcoded
/// to UTF-8 first. A leading BOM or an mbox `From ` separator line is skipped.
pub fn read_input(source: &str, encoding: Option<&str>) -> Result<InputMessage> {
    let original = if source == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .map_err(|e| ConvertError::io("<stdin>", e))?;
        buf
    } else {
        let path = Path::new(source);
        std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConvertError::InputNotFound(path.to_path_buf())
            } else {
                ConvertError::io(path, e)
            }
        })?
    };

    let message = prepare_message(&original, encoding)?;
    debug!(
        source,
        bytes = original.len(),
        encoding = encoding.unwrap_or("utf-8"),
        "Read input message"
    );
    Ok(InputMessage { original, message })
}

/// Transcode and strip framing from raw input bytes.
pub fn prepare_message(raw: &[u8], encoding: Option<&str>) -> Result<Vec<u8>> {
    let transcoded = match encoding.map(str::trim).filter(|e| !e.is_empty()) {
        None => raw.to_vec(),
        Some(label) => {
            let enc = charset::lookup(label)
                .ok_or_else(|| ConvertError::UnsupportedEncoding(label.to_string()))?;
            if enc == encoding_rs::UTF_8 {
                raw.to_vec()
            } else {
                let (text, _) = charset::decode_lossy(raw, enc);
                text.into_bytes()
            }
        }
    };

    let data = transcoded.strip_prefix(BOM).unwrap_or(&transcoded);
    Ok(skip_from_line(data).to_vec())
}

/// Skip an mbox `From ` separator if the data starts with one.
fn skip_from_line(data: &[u8]) -> &[u8] {
    if !data.starts_with(b"From ") {
        return data;
    }
    match data.iter().position(|&b| b == b'\n') {
        Some(pos) => &data[pos + 1..],
        None => &[],
    }
}
