//! Output side of a run: attachments, PDF rendering and metadata, sidecar files.

pub mod attachment;
pub mod eml;
pub mod filename;
pub mod metadata;
pub mod pdf;
pub mod text;
