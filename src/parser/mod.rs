//! Email parsing: input reading, MIME tree construction, header and charset decoding.

pub mod charset;
pub mod eml;
pub mod finder;
pub mod header;
pub mod mime;
