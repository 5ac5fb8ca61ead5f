//! Formatted header block prepended to the rendered body.

use crate::body::plain::html_escape;
use crate::model::mail::Message;
use crate::parser::header::decode_header;

/// Headers shown in the block, in display order.
pub const FORMATTED_HEADERS: [&str; 4] = ["Subject", "From", "To", "Date"];

/// `<b>Name</b>: value<br/>` for each present header, then a blank line.
pub fn header_block(msg: &Message) -> String {
    let mut block = String::new();
    for name in FORMATTED_HEADERS {
        let Some(raw) = msg.header_value(name).filter(|v| !v.is_empty()) else {
            continue;
        };
        block.push_str(&format!(
            "<b>{name}</b>: {}<br/>",
            html_escape(&decode_header(raw))
        ));
    }
    block.push_str("<br/>");
    block
}
