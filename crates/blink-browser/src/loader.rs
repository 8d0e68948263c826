//! Request loading.
//!
//! [Fetch Standard § 4 Fetching](https://fetch.spec.whatwg.org/#fetching)
//!
//! The host never performs network I/O itself. A [`RequestLoader`] turns a
//! [`RequestDescriptor`] into markup; [`LocalLoader`] covers the schemes
//! that need no network at all.

use std::fs;
use std::path::PathBuf;

use blink_common::{DataUrl, Method, RequestDescriptor, scheme_of};

use crate::error::LoadError;

/// Markup fetched for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedContent {
    /// Response body, decoded as text.
    pub markup: String,
    /// URL relative references in the markup resolve against.
    pub base_url: String,
    /// Content type reported for the body.
    pub mime_type: String,
}

/// Fetches the body of a request. Called on the load worker thread.
pub trait RequestLoader: Send + Sync {
    /// Fetch `request`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::InvalidRequest`] for requests the loader
    /// rejects outright and [`LoadError::Network`] for fetch failures.
    fn load(&self, request: &RequestDescriptor) -> Result<LoadedContent, LoadError>;
}

/// Loader for `about:blank`, `data:` and `file:` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalLoader;

impl RequestLoader for LocalLoader {
    fn load(&self, request: &RequestDescriptor) -> Result<LoadedContent, LoadError> {
        let url = request.url.trim();
        if url.is_empty() {
            return Err(LoadError::InvalidRequest("empty URL".to_string()));
        }
        let Some(scheme) = scheme_of(url) else {
            return Err(LoadError::InvalidRequest(format!(
                "'{url}' is not an absolute URL"
            )));
        };
        if !matches!(request.method, Method::Get | Method::Head) {
            return Err(LoadError::InvalidRequest(format!(
                "{} is not supported for {scheme}: URLs",
                request.method
            )));
        }

        let mut content = match scheme.as_str() {
            "about" => load_about(url)?,
            "data" => load_data(url)?,
            "file" => load_file(url)?,
            _ => {
                return Err(LoadError::Network(format!(
                    "no loader for scheme '{scheme}'"
                )));
            }
        };

        // HEAD: "the response's body is null".
        if request.method == Method::Head {
            content.markup.clear();
        }
        tracing::debug!(url, bytes = content.markup.len(), "request loaded");
        Ok(content)
    }
}

/// [about: URL scheme](https://fetch.spec.whatwg.org/#scheme-fetch)
///
/// "If request's current URL's path is the string "blank", then return a
/// new response whose status message is `OK`, header list is
/// « (`Content-Type`, `text/html;charset=utf-8`) », and body is the empty
/// byte sequence."
fn load_about(url: &str) -> Result<LoadedContent, LoadError> {
    let path = url[url.find(':').map_or(0, |i| i + 1)..]
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    if path.eq_ignore_ascii_case("blank") {
        Ok(LoadedContent {
            markup: String::new(),
            base_url: "about:blank".to_string(),
            mime_type: "text/html;charset=utf-8".to_string(),
        })
    } else {
        Err(LoadError::Network(format!("unknown about: page '{url}'")))
    }
}

fn load_data(url: &str) -> Result<LoadedContent, LoadError> {
    let data = DataUrl::parse(url).map_err(|e| LoadError::InvalidRequest(e.to_string()))?;
    let markup = data
        .decode_text()
        .map_err(|e| LoadError::InvalidRequest(e.to_string()))?;
    Ok(LoadedContent {
        markup,
        base_url: url.to_string(),
        mime_type: data.mime_type,
    })
}

/// "For now, unfortunate as it is, file URLs are left as an exercise for
/// the reader." Only the local path form is handled: `file:///abs/path`
/// or `file:/abs/path`.
fn load_file(url: &str) -> Result<LoadedContent, LoadError> {
    let rest = &url["file:".len()..];
    let path = rest
        .strip_prefix("//localhost")
        .or_else(|| rest.strip_prefix("//"))
        .unwrap_or(rest);
    let path = path.split(['?', '#']).next().unwrap_or_default();
    if path.is_empty() {
        return Err(LoadError::InvalidRequest(format!("'{url}' has no path")));
    }
    let path = PathBuf::from(path);
    let markup = fs::read_to_string(&path)
        .map_err(|e| LoadError::Network(format!("failed to read '{}': {e}", path.display())))?;
    Ok(LoadedContent {
        markup,
        base_url: url.to_string(),
        mime_type: "text/html".to_string(),
    })
}
