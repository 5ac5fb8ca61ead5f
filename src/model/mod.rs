//! Core data model types: the message tree, attachment records and run diagnostics.

pub mod attachment;
pub mod diagnostics;
pub mod mail;
