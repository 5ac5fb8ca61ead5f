//! Removal of `<img>` sources that cannot or should not be loaded by the renderer.

use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};
use tracing::debug;

use crate::error::{ConvertError, Result};
use crate::model::diagnostics::{Diagnostics, WarningKind};

/// Tracking pixels and spacers that are never worth fetching.
pub const DEFAULT_LOAD_BLACKLIST: [&str; 3] = ["emltrk.com", "trk.email", "shim.gif"];

// Quoted attribute values may contain `>`.
static IMG_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<img\b(?:[^>"']|"[^"]*"|'[^']*')*>"#).expect("img pattern is valid")
});

static SRC_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\s+src\s*=\s*("[^"]*"|'[^']*'|[^\s"'>]+)"#).expect("src pattern is valid")
});

/// Answers whether a remote URL can be retrieved.
pub trait ImageFetcher {
    fn can_fetch(&self, url: &str) -> bool;
}

/// [`ImageFetcher`] backed by a blocking HTTP client. One request at a time.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("eml2pdf/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ConvertError::Fatal(format!("Cannot create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl ImageFetcher for HttpFetcher {
    fn can_fetch(&self, url: &str) -> bool {
        let encoded = url.replace(' ', "%20");
        match self.client.get(&encoded).send().and_then(|r| r.error_for_status()) {
            Ok(_) => true,
            Err(e) => {
                debug!(url = %encoded, error = %e, "Image fetch failed");
                false
            }
        }
    }
}

/// Strip `src` from every `<img>` whose source would break or slow rendering.
///
/// * `broken` (unresolved `cid:`) is removed;
/// * `data:` sources are kept;
/// * sources containing a blacklisted substring are removed;
/// * anything else is kept only if `fetcher` can retrieve it. Without a
///   fetcher, remote sources are kept unchecked.
pub fn remove_invalid_urls(
    html: &str,
    blacklist: &[String],
    fetcher: Option<&dyn ImageFetcher>,
    diagnostics: &mut Diagnostics,
) -> String {
    IMG_TAG
        .replace_all(html, |tag: &Captures<'_>| {
            let tag = &tag[0];
            let Some(attr) = SRC_ATTR.captures(tag) else {
                return tag.to_string();
            };
            let src = attribute_value(&attr[1]);
            if keep_source(&src, blacklist, fetcher, diagnostics) {
                tag.to_string()
            } else {
                SRC_ATTR.replace(tag, "").into_owned()
            }
        })
        .into_owned()
}

fn keep_source(
    src: &str,
    blacklist: &[String],
    fetcher: Option<&dyn ImageFetcher>,
    diagnostics: &mut Diagnostics,
) -> bool {
    let lower = src.to_lowercase();
    if lower == "broken" {
        return false;
    }
    if lower.starts_with("data") {
        debug!("Ignoring data URL");
        return true;
    }
    if blacklist.iter().any(|item| lower.contains(&item.to_lowercase())) {
        debug!(src, "Removing URL that was found in blacklist");
        return false;
    }
    let Some(fetcher) = fetcher else {
        return true;
    };
    debug!(src, "Getting img URL");
    if fetcher.can_fetch(src) {
        true
    } else {
        diagnostics.warn(
            WarningKind::UnreachableImage,
            format!("Could not retrieve img URL {src}, replacing with blank."),
        );
        false
    }
}

/// Unquote an attribute value and resolve the `&amp;` entity.
fn attribute_value(raw: &str) -> String {
    raw.trim_matches(|c| c == '"' || c == '\'').replace("&amp;", "&")
}
