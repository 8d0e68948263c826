//! URL resolution for content identifiers.
//!
//! [URL Standard](https://url.spec.whatwg.org/)
//!
//! The host view records either a URL or the base identifier supplied with
//! raw markup. Relative references found in that markup are resolved
//! against it with [`resolve_url`].

/// [URL Standard § 4.2 URL miscellaneous](https://url.spec.whatwg.org/#url-miscellaneous)
///
/// Return the lower-cased scheme of `url`, or `None` if it has no scheme.
///
/// "A URL-scheme string must be one ASCII alpha, followed by zero or more
/// of ASCII alphanumeric, U+002B (+), U+002D (-), and U+002E (.)."
#[must_use]
pub fn scheme_of(url: &str) -> Option<String> {
    let (scheme, _) = url.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        return None;
    }
    Some(scheme.to_ascii_lowercase())
}

/// [§ 2.5 URLs](https://html.spec.whatwg.org/multipage/urls-and-fetching.html#resolving-urls)
///
/// Resolve a potentially relative URL against a base URL.
///
/// STEP 1: "If url is an absolute URL, return url."
///
/// STEP 2: "Otherwise, resolve url relative to base."
///
/// NOTE: This is a simplified implementation covering scheme-relative,
/// path-absolute and path-relative references, including `.` and `..`
/// segments. Query strings and fragments on the base are dropped.
#[must_use]
pub fn resolve_url(href: &str, base_url: Option<&str>) -> String {
    // STEP 1: Absolute URLs are returned unchanged.
    if scheme_of(href).is_some() {
        return href.to_string();
    }

    // STEP 2: Resolve relative URL against base.
    let Some(base) = base_url else {
        return href.to_string();
    };
    let Some(scheme) = scheme_of(base) else {
        return href.to_string();
    };

    if let Some(rest) = href.strip_prefix("//") {
        return format!("{scheme}://{rest}");
    }

    // Split the base into "scheme://authority" and its path.
    let after_scheme = &base[scheme.len() + 1..];
    let (origin, base_path) = after_scheme.strip_prefix("//").map_or_else(
        || (format!("{scheme}:"), after_scheme),
        |authority_and_path| {
            let split = authority_and_path
                .find('/')
                .unwrap_or(authority_and_path.len());
            (
                format!("{scheme}://{}", &authority_and_path[..split]),
                &authority_and_path[split..],
            )
        },
    );
    let base_path = base_path
        .split(['?', '#'])
        .next()
        .unwrap_or_default();

    let joined = if href.starts_with('/') {
        href.to_string()
    } else {
        let base_dir = base_path.rsplit_once('/').map_or("", |(dir, _)| dir);
        format!("{base_dir}/{href}")
    };

    format!("{origin}{}", remove_dot_segments(&joined))
}

/// [RFC 3986 § 5.2.4](https://www.rfc-editor.org/rfc/rfc3986#section-5.2.4)
fn remove_dot_segments(path: &str) -> String {
    let mut output: Vec<&str> = Vec::new();
    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.len().saturating_sub(1);
    for (i, segment) in segments.iter().enumerate() {
        match *segment {
            "." => {
                if i == last {
                    output.push("");
                }
            }
            ".." => {
                if output.len() > 1 {
                    let _ = output.pop();
                }
                if i == last {
                    output.push("");
                }
            }
            other => output.push(other),
        }
    }
    let joined = output.join("/");
    if joined.starts_with('/') {
        joined
    } else {
        format!("/{joined}")
    }
}
