//! `eml2pdf`: convert an email into a PDF of its body plus its attachments.
//!
//! This crate provides the core library: building a MIME part tree from raw
//! message bytes, choosing and decoding the body, inlining `cid:` images,
//! extracting attachments under collision-free names, and driving an
//! external HTML → PDF renderer.

pub mod body;
pub mod config;
pub mod convert;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
