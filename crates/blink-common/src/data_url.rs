//! `data:` URL decoding.
//!
//! [Fetch Standard § 6 data: URLs](https://fetch.spec.whatwg.org/#data-urls)
//!
//! Used by the local request loader so that markup can be loaded through
//! `load_request` without any networking.

use base64::Engine;
use thiserror::Error;

/// Errors produced while decoding a `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataUrlError {
    /// The input does not start with `data:`.
    #[error("not a data: URL")]
    NotDataUrl,
    /// "If position is past the end of input, then return failure."
    #[error("invalid data URL: missing comma")]
    MissingComma,
    /// The base64 payload could not be decoded.
    #[error("base64 decode error: {0}")]
    Base64(String),
    /// A `%XX` escape is malformed.
    #[error("invalid percent-encoding at byte {0}")]
    PercentEncoding(usize),
}

/// A parsed `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    /// The MIME type, `text/plain;charset=US-ASCII` when omitted.
    pub mime_type: String,
    /// Whether the payload is base64-encoded.
    pub base64: bool,
    /// The raw (still encoded) payload after the comma.
    payload: String,
}

impl DataUrl {
    /// [§ 6.1 data: URL processor](https://fetch.spec.whatwg.org/#data-url-processor)
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not a `data:` URL or has no comma.
    pub fn parse(url: &str) -> Result<Self, DataUrlError> {
        // STEP 1-3: "Let input be the result of running the URL serializer
        // on dataURL with exclude fragment set to true" and remove the
        // leading "data:".
        let rest = url
            .get(..5)
            .filter(|prefix| prefix.eq_ignore_ascii_case("data:"))
            .map(|_| &url[5..])
            .ok_or(DataUrlError::NotDataUrl)?;
        let rest = rest.split('#').next().unwrap_or_default();

        // STEP 5: "Let mimeType be the result of collecting a sequence of
        // code points that are not equal to U+002C (,)."
        let (metadata, payload) = rest.split_once(',').ok_or(DataUrlError::MissingComma)?;
        let metadata = metadata.trim();

        // STEP 11: "If mimeType ends with U+003B (;), followed by zero or
        // more U+0020 SPACE, followed by an ASCII case-insensitive match
        // for "base64", then ... set base64 to true".
        let (mime, base64) = match metadata.rsplit_once(';') {
            Some((mime, flag)) if flag.trim().eq_ignore_ascii_case("base64") => (mime, true),
            _ => (metadata, false),
        };
        let mime_type = if mime.is_empty() {
            "text/plain;charset=US-ASCII".to_string()
        } else {
            mime.to_ascii_lowercase()
        };

        Ok(Self {
            mime_type,
            base64,
            payload: payload.to_string(),
        })
    }

    /// Decode the payload into raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the base64 or percent-encoding is malformed.
    pub fn decode(&self) -> Result<Vec<u8>, DataUrlError> {
        let bytes = percent_decode(&self.payload)?;
        if self.base64 {
            let cleaned: Vec<u8> = bytes
                .into_iter()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            base64::engine::general_purpose::STANDARD
                .decode(cleaned)
                .map_err(|e| DataUrlError::Base64(e.to_string()))
        } else {
            Ok(bytes)
        }
    }

    /// Decode the payload as UTF-8 text, replacing invalid sequences.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be decoded.
    pub fn decode_text(&self) -> Result<String, DataUrlError> {
        self.decode()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// [URL Standard § 1.3 Percent-encoded bytes](https://url.spec.whatwg.org/#percent-decode)
fn percent_decode(input: &str) -> Result<Vec<u8>, DataUrlError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or(DataUrlError::PercentEncoding(i))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}
