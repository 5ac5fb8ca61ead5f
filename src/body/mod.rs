//! Body resolution: pick the part to render and turn it into HTML.
//!
//! The HTML part wins over the plain-text part. When neither exists the run
//! either fails or, if the body was not requested, continues without one.

pub mod html;
pub mod images;
pub mod plain;

use tracing::debug;

use crate::error::{ConvertError, Result};
use crate::model::diagnostics::Diagnostics;
use crate::model::mail::{Message, PartId, PartSet};
use crate::parser::finder;

/// Which part the body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BodySource {
    Html(PartId),
    Plain(PartId),
}

/// Outcome of body resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolvedBody {
    /// HTML ready for rendering. `None` when there is no body part.
    pub payload: Option<String>,
    /// Parts inlined into the body as images.
    pub consumed: PartSet,
    pub source: Option<BodySource>,
}

/// Resolve the body of `msg`.
///
/// Fails with [`ConvertError::NoBody`] when there is neither a `text/html`
/// nor a `text/plain` part and `body_required` is set.
pub fn resolve_body(
    msg: &Message,
    body_required: bool,
    diagnostics: &mut Diagnostics,
) -> Result<ResolvedBody> {
    if let Some(part) = finder::first_by_content_type(msg, "text/html") {
        let mut consumed = PartSet::new();
        let payload = html::html_body(msg, part, &mut consumed, diagnostics)?;
        debug!(part = part.id.0, inlined = consumed.len(), "Resolved HTML body");
        return Ok(ResolvedBody {
            payload: Some(payload),
            consumed,
            source: Some(BodySource::Html(part.id)),
        });
    }

    if let Some(part) = finder::first_by_content_type(msg, "text/plain") {
        let payload = plain::plain_body_to_html(part, diagnostics);
        debug!(part = part.id.0, "Resolved plain text body");
        return Ok(ResolvedBody {
            payload: Some(payload),
            consumed: PartSet::new(),
            source: Some(BodySource::Plain(part.id)),
        });
    }

    if body_required {
        return Err(ConvertError::NoBody);
    }
    debug!("No body parts found, but the body is not required; proceeding");
    Ok(ResolvedBody::default())
}
