//! One complete conversion run: parse, render the body, extract attachments.
//!
//! Warnings are gathered in a [`Diagnostics`] value for the whole run. When
//! any were recorded, a summary and a copy of the input are written next to
//! the output PDF. A fatal error after the output name is known still leaves
//! the summary behind, ending with an `ERROR:` line.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::body::images::{remove_invalid_urls, ImageFetcher};
use crate::body::{resolve_body, BodySource};
use crate::error::{ConvertError, Result};
use crate::export::attachment::{extract_attachments, AttachmentOptions};
use crate::export::eml::{write_original_copy, write_warnings_file};
use crate::export::filename::{default_output_name, unique_path};
use crate::export::metadata::{merge_pdf_metadata, message_metadata};
use crate::export::pdf::{benign_error_patterns, check_render_output, RenderEnvironment, Renderer};
use crate::export::text::header_block;
use crate::model::attachment::ExtractedAttachment;
use crate::model::diagnostics::{Diagnostics, WarningKind};
use crate::model::mail::{Message, PartSet};
use crate::parser::eml::InputMessage;
use crate::parser::finder::filenamed_parts;
use crate::parser::mime::parse_message;

/// Everything that shapes a run, after CLI and configuration are merged.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Explicit output PDF path. Must not exist yet.
    pub output_file: Option<PathBuf>,
    /// Directory for attachments and the default-named PDF. Must exist.
    pub output_directory: PathBuf,
    /// Render the body to PDF.
    pub body: bool,
    /// Extract attachments.
    pub attachments: bool,
    /// Prepend the Subject/From/To/Date block to the body.
    pub headers: bool,
    pub add_prefix_date: bool,
    pub ignore_floating_attachments: bool,
    /// URL substrings for images that are never loaded.
    pub image_blacklist: Vec<String>,
    pub render_env: RenderEnvironment,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            output_file: None,
            output_directory: PathBuf::from("."),
            body: true,
            attachments: true,
            headers: false,
            add_prefix_date: false,
            ignore_floating_attachments: false,
            image_blacklist: crate::body::images::DEFAULT_LOAD_BLACKLIST
                .iter()
                .map(|s| s.to_string())
                .collect(),
            render_env: RenderEnvironment::default(),
        }
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Path of the body PDF (reserved even when the body was not rendered).
    pub output_pdf: PathBuf,
    pub body_rendered: bool,
    pub body_source: Option<BodySource>,
    pub attachments: Vec<ExtractedAttachment>,
    pub diagnostics: Diagnostics,
    /// Warnings summary and original copy, when written.
    pub sidecars: Vec<PathBuf>,
}

impl RunReport {
    pub fn has_warnings(&self) -> bool {
        self.diagnostics.has_warnings()
    }
}

/// Process exit status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success = 0,
    /// Completed, but with warnings.
    Warnings = 1,
    /// An expected fatal condition stopped the run.
    Fatal = 2,
    /// Unexpected internal failure.
    Internal = 3,
}

impl RunStatus {
    /// Classify a run outcome. Warnings count as success when hidden.
    pub fn classify(result: &Result<RunReport>, mostly_hide_warnings: bool) -> Self {
        match result {
            Ok(report) if report.has_warnings() && !mostly_hide_warnings => Self::Warnings,
            Ok(_) => Self::Success,
            Err(e) if e.is_fatal() => Self::Fatal,
            Err(_) => Self::Internal,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Run one conversion of `input`.
pub fn run(
    options: &ConvertOptions,
    input: &InputMessage,
    renderer: &dyn Renderer,
    fetcher: Option<&dyn ImageFetcher>,
) -> Result<RunReport> {
    if options.body && !renderer.is_available() {
        return Err(ConvertError::RendererMissing(renderer.name().to_string()));
    }
    if !options.output_directory.is_dir() {
        return Err(ConvertError::OutputDirMissing(options.output_directory.clone()));
    }

    let output_pdf = output_pdf_path(options, Local::now().naive_local())?;
    info!(path = %output_pdf.display(), "Output file name");

    let mut diagnostics = Diagnostics::new();
    match convert_message(options, input, renderer, fetcher, &output_pdf, &mut diagnostics) {
        Ok(converted) => {
            let mut sidecars = Vec::new();
            if diagnostics.has_warnings() {
                sidecars.extend(write_warnings_file(&output_pdf, &diagnostics, None)?);
                sidecars.push(write_original_copy(&output_pdf, &input.original)?);
            }
            Ok(RunReport {
                output_pdf,
                body_rendered: converted.body_rendered,
                body_source: converted.body_source,
                attachments: converted.attachments,
                diagnostics,
                sidecars,
            })
        }
        Err(e) => {
            if e.is_fatal() {
                if let Err(write_err) =
                    write_warnings_file(&output_pdf, &diagnostics, Some(&e.to_string()))
                {
                    warn!(error = %write_err, "Could not write warnings summary");
                }
            }
            Err(e)
        }
    }
}

/// `--output-file` if given (and free), else a unique timestamped name.
pub fn output_pdf_path(options: &ConvertOptions, now: NaiveDateTime) -> Result<PathBuf> {
    match &options.output_file {
        Some(path) if path.exists() => Err(ConvertError::OutputExists(path.clone())),
        Some(path) => Ok(path.clone()),
        None => Ok(unique_path(
            &options.output_directory.join(default_output_name(now)),
        )),
    }
}

struct Converted {
    body_rendered: bool,
    body_source: Option<BodySource>,
    attachments: Vec<ExtractedAttachment>,
}

fn convert_message(
    options: &ConvertOptions,
    input: &InputMessage,
    renderer: &dyn Renderer,
    fetcher: Option<&dyn ImageFetcher>,
    output_pdf: &Path,
    diagnostics: &mut Diagnostics,
) -> Result<Converted> {
    let msg = parse_message(&input.message)?;
    let resolved = resolve_body(&msg, options.body, diagnostics)?;

    let mut body_rendered = false;
    if options.body {
        if let Some(payload) = resolved.payload.as_deref() {
            render_body(options, &msg, payload, renderer, fetcher, output_pdf, diagnostics)?;
            body_rendered = true;
        }
    }

    let attachments = if options.attachments {
        extract_with_fallback(options, &msg, &resolved.consumed, diagnostics)?
    } else {
        Vec::new()
    };

    Ok(Converted {
        body_rendered,
        body_source: resolved.source,
        attachments,
    })
}

fn render_body(
    options: &ConvertOptions,
    msg: &Message,
    payload: &str,
    renderer: &dyn Renderer,
    fetcher: Option<&dyn ImageFetcher>,
    output_pdf: &Path,
    diagnostics: &mut Diagnostics,
) -> Result<()> {
    let mut html = remove_invalid_urls(payload, &options.image_blacklist, fetcher, diagnostics);
    if options.headers {
        let block = header_block(msg);
        info!(header_info = %block, "Prepending header block");
        html.insert_str(0, &block);
    }
    debug!(bytes = html.len(), "Final payload ready for rendering");

    let output = renderer.render(&html, output_pdf)?;
    let patterns = benign_error_patterns(&options.render_env)?;
    check_render_output(&output, &patterns)?;

    merge_pdf_metadata(output_pdf, &message_metadata(msg))?;
    Ok(())
}

/// Extract attachments, retrying with filenamed inline parts when the body
/// was skipped and nothing was found.
fn extract_with_fallback(
    options: &ConvertOptions,
    msg: &Message,
    consumed: &PartSet,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<ExtractedAttachment>> {
    let attachment_options = AttachmentOptions {
        date_prefix: options.add_prefix_date.then(|| Local::now().date_naive()),
        ignore_floating: options.ignore_floating_attachments,
    };
    let dir = &options.output_directory;

    let mut written = extract_attachments(msg, dir, &attachment_options, consumed)?;
    if options.body || !written.is_empty() {
        return Ok(written);
    }

    info!("First try: didn't print body (on request) or extract any attachments. Retrying with filenamed parts.");
    let filenamed = filenamed_parts(msg, consumed);
    if !filenamed.is_empty() {
        let relaxed: PartSet = consumed.difference(&filenamed).copied().collect();
        written = extract_attachments(msg, dir, &attachment_options, &relaxed)?;
    }

    if written.is_empty() {
        diagnostics.warn(
            WarningKind::NoAttachments,
            "Second try: didn't print body (on request) and still didn't find any attachments \
             even when looked for referenced ones with a filename. Giving up.",
        );
    }
    Ok(written)
}
