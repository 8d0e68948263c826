//! Host objects bound for page scripts: `document`, `navigator` and
//! `localStorage`.
//!
//! Each load gets a fresh [`DocumentObject`] over the markup being loaded.
//! Scripts that write to it mark the document dirty, and the load pipeline
//! re-parses and re-lays out the rewritten markup before rendering.

use std::collections::BTreeMap;

use blink_dom::DomTree;
use blink_js::{HostCallError, HostObject, ScriptValue};
use parking_lot::Mutex;

struct DocumentState {
    markup: String,
    dirty: bool,
}

/// [§ 3.1 The Document object](https://html.spec.whatwg.org/multipage/dom.html#the-document-object)
pub struct DocumentObject {
    url: String,
    state: Mutex<DocumentState>,
}

impl DocumentObject {
    /// A document over `markup`, reachable at `url`.
    #[must_use]
    pub fn new(markup: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: Mutex::new(DocumentState {
                markup: markup.into(),
                dirty: false,
            }),
        }
    }

    /// Whether a script has changed the markup.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// The current markup.
    #[must_use]
    pub fn markup(&self) -> String {
        self.state.lock().markup.clone()
    }

    /// Current markup, if a script has changed it.
    #[must_use]
    pub fn take_rewritten(&self) -> Option<String> {
        let mut state = self.state.lock();
        if state.dirty {
            state.dirty = false;
            Some(state.markup.clone())
        } else {
            None
        }
    }

    fn rewrite(&self, f: impl FnOnce(&mut String)) {
        let mut state = self.state.lock();
        f(&mut state.markup);
        state.dirty = true;
    }

    /// Parse the current markup. `None` while a script has left it
    /// unparsable.
    fn dom(&self) -> Option<DomTree> {
        blink_html::parse_document(&self.state.lock().markup)
            .ok()
            .map(|parsed| parsed.dom)
    }

    fn text_content(&self) -> ScriptValue {
        self.dom()
            .map(|dom| {
                let body = dom.elements_by_tag_name("body").first().copied();
                dom.text_content(body.unwrap_or_else(|| dom.root()))
            })
            .into()
    }
}

impl HostObject for DocumentObject {
    fn class_name(&self) -> &str {
        "HTMLDocument"
    }

    fn methods(&self) -> &[&str] {
        &["write", "writeln", "setContent", "getElementCount", "getTextById"]
    }

    fn property_names(&self) -> &[&str] {
        &["title", "URL", "textContent"]
    }

    fn get_property(&self, name: &str) -> ScriptValue {
        match name {
            // "If the title element is null, return the empty string."
            "title" => self
                .dom()
                .and_then(|dom| dom.title())
                .unwrap_or_default()
                .into(),
            "URL" => self.url.as_str().into(),
            "textContent" => self.text_content(),
            _ => ScriptValue::Null,
        }
    }

    fn set_property(&self, name: &str, value: ScriptValue) -> Result<(), HostCallError> {
        match name {
            "title" => {
                let title = value.to_string();
                self.rewrite(|markup| set_title(markup, &title));
                Ok(())
            }
            _ => Err(HostCallError(format!("HTMLDocument.{name} is read-only"))),
        }
    }

    fn invoke(&self, method: &str, args: &[ScriptValue]) -> Result<ScriptValue, HostCallError> {
        match method {
            // [§ 8.4.3 document.write()](https://html.spec.whatwg.org/multipage/dynamic-markup-insertion.html#dom-document-write)
            //
            // NOTE: Content is appended to the end of the body rather than
            // at the insertion point, since scripts run after parsing.
            "write" | "writeln" => {
                let mut text: String = args.iter().map(ToString::to_string).collect();
                if method == "writeln" {
                    text.push('\n');
                }
                self.rewrite(|markup| append_to_body(markup, &text));
                Ok(ScriptValue::Null)
            }
            "setContent" => {
                let markup = args.first().map(ToString::to_string).unwrap_or_default();
                self.rewrite(|current| *current = markup);
                Ok(ScriptValue::Null)
            }
            "getElementCount" => {
                let tag = args
                    .first()
                    .and_then(ScriptValue::as_str)
                    .ok_or_else(|| HostCallError("getElementCount expects a tag name".to_string()))?
                    .to_ascii_lowercase();
                let count = self
                    .dom()
                    .map_or(0, |dom| dom.elements_by_tag_name(&tag).len());
                Ok(count.into())
            }
            "getTextById" => {
                let id = args
                    .first()
                    .and_then(ScriptValue::as_str)
                    .ok_or_else(|| HostCallError("getTextById expects an id".to_string()))?;
                Ok(self
                    .dom()
                    .and_then(|dom| {
                        dom.iter_all()
                            .find(|&n| dom.as_element(n).and_then(|e| e.id()) == Some(id))
                            .map(|n| dom.text_content(n))
                    })
                    .into())
            }
            _ => Err(HostCallError::unknown_method("HTMLDocument", method)),
        }
    }
}

/// Insert `text` before the last `</body>`, or at the end.
fn append_to_body(markup: &mut String, text: &str) {
    let at = markup
        .to_ascii_lowercase()
        .rfind("</body>")
        .unwrap_or(markup.len());
    markup.insert_str(at, text);
}

/// [§ 3.1.3 document.title setter](https://html.spec.whatwg.org/multipage/dom.html#document.title)
///
/// "If the title element is null, then append a new title element to the
/// head element." Without a head, the title goes first.
fn set_title(markup: &mut String, title: &str) {
    let escaped = escape_text(title);
    let lower = markup.to_ascii_lowercase();
    let open = lower
        .find("<title")
        .and_then(|start| lower[start..].find('>').map(|end| start + end + 1));
    let close = open.and_then(|open| lower[open..].find("</title").map(|end| open + end));
    match (open, close) {
        (Some(open), Some(close)) => markup.replace_range(open..close, &escaped),
        _ => {
            let element = format!("<title>{escaped}</title>");
            let at = lower
                .find("<head")
                .and_then(|start| lower[start..].find('>').map(|end| start + end + 1))
                .unwrap_or(0);
            markup.insert_str(at, &element);
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;")
}

/// [§ 8.9.1 The Navigator object](https://html.spec.whatwg.org/multipage/system-state.html#the-navigator-object)
pub struct NavigatorObject {
    user_agent: String,
    cookie_enabled: bool,
}

impl NavigatorObject {
    /// A navigator reporting `user_agent`. `cookieEnabled` follows DOM
    /// storage.
    #[must_use]
    pub fn new(user_agent: impl Into<String>, storage_enabled: bool) -> Self {
        Self {
            user_agent: user_agent.into(),
            cookie_enabled: storage_enabled,
        }
    }
}

impl HostObject for NavigatorObject {
    fn class_name(&self) -> &str {
        "Navigator"
    }

    fn methods(&self) -> &[&str] {
        &["javaEnabled"]
    }

    fn property_names(&self) -> &[&str] {
        &[
            "userAgent",
            "appName",
            "appVersion",
            "platform",
            "language",
            "cookieEnabled",
            "onLine",
        ]
    }

    fn get_property(&self, name: &str) -> ScriptValue {
        match name {
            "userAgent" => self.user_agent.as_str().into(),
            // "Must return the string "Netscape"."
            "appName" => "Netscape".into(),
            // "Must return the string "4.0" or a string representing the
            // version of the browser in detail."
            "appVersion" => self
                .user_agent
                .strip_prefix("Mozilla/")
                .unwrap_or("4.0")
                .into(),
            "platform" => std::env::consts::OS.into(),
            "language" => "en-US".into(),
            "cookieEnabled" => self.cookie_enabled.into(),
            // No network stack: content is always local.
            "onLine" => false.into(),
            _ => ScriptValue::Null,
        }
    }

    fn invoke(&self, method: &str, _args: &[ScriptValue]) -> Result<ScriptValue, HostCallError> {
        match method {
            "javaEnabled" => Ok(false.into()),
            _ => Err(HostCallError::unknown_method("Navigator", method)),
        }
    }
}

/// [§ 12.2.1 The Storage interface](https://html.spec.whatwg.org/multipage/webstorage.html#the-storage-interface)
///
/// One store per host session, shared by every load in it.
#[derive(Default)]
pub struct StorageObject {
    items: Mutex<BTreeMap<String, String>>,
}

impl StorageObject {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value stored under `key`.
    #[must_use]
    pub fn item(&self, key: &str) -> Option<String> {
        self.items.lock().get(key).cloned()
    }

    /// Number of stored pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

fn key_arg(args: &[ScriptValue], method: &str) -> Result<String, HostCallError> {
    args.first()
        .map(ToString::to_string)
        .ok_or_else(|| HostCallError(format!("Storage.{method} expects a key")))
}

impl HostObject for StorageObject {
    fn class_name(&self) -> &str {
        "Storage"
    }

    fn methods(&self) -> &[&str] {
        &["getItem", "setItem", "removeItem", "clear", "key"]
    }

    fn property_names(&self) -> &[&str] {
        &["length"]
    }

    fn get_property(&self, name: &str) -> ScriptValue {
        match name {
            "length" => self.len().into(),
            _ => ScriptValue::Null,
        }
    }

    fn invoke(&self, method: &str, args: &[ScriptValue]) -> Result<ScriptValue, HostCallError> {
        let mut items = self.items.lock();
        match method {
            // "return null if no such pair exists"
            "getItem" => Ok(items.get(&key_arg(args, method)?).cloned().into()),
            "setItem" => {
                let key = key_arg(args, method)?;
                let value = args.get(1).map(ToString::to_string).unwrap_or_default();
                let _ = items.insert(key, value);
                Ok(ScriptValue::Null)
            }
            "removeItem" => {
                let _ = items.remove(&key_arg(args, method)?);
                Ok(ScriptValue::Null)
            }
            "clear" => {
                items.clear();
                Ok(ScriptValue::Null)
            }
            // "return the name of the nth key, or null if n is greater than
            // or equal to the number of key/value pairs."
            "key" => {
                let index = args.first().and_then(ScriptValue::as_number).unwrap_or(0.0);
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let key = (index >= 0.0)
                    .then(|| items.keys().nth(index as usize).cloned())
                    .flatten();
                Ok(key.into())
            }
            _ => Err(HostCallError::unknown_method("Storage", method)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_title_replaces_existing() {
        let mut markup = "<head><TITLE>Old</TITLE></head>".to_string();
        set_title(&mut markup, "New & <b>");
        assert_eq!(markup, "<head><TITLE>New &amp; &lt;b></TITLE></head>");
    }

    #[test]
    fn test_set_title_inserts_into_head() {
        let mut markup = "<html><head></head><body>x</body></html>".to_string();
        set_title(&mut markup, "T");
        assert_eq!(markup, "<html><head><title>T</title></head><body>x</body></html>");

        let mut bare = "<p>x</p>".to_string();
        set_title(&mut bare, "T");
        assert_eq!(bare, "<title>T</title><p>x</p>");
    }

    #[test]
    fn test_write_appends_inside_body() {
        let mut markup = "<body><p>a</p></body>".to_string();
        append_to_body(&mut markup, "<p>b</p>");
        assert_eq!(markup, "<body><p>a</p><p>b</p></body>");
    }
}
