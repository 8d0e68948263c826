//! User-agent defaults for element boxes.
//!
//! [§ 15.3.1 Hidden elements](https://html.spec.whatwg.org/multipage/rendering.html#hidden-elements)
//! [§ 15.3.3 Flow content](https://html.spec.whatwg.org/multipage/rendering.html#flow-content-3)

/// Outer display type of an element under the user-agent stylesheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayKind {
    /// `display: none`
    Hidden,
    /// `display: block` (and `list-item`, which lays out the same here)
    Block,
    /// `display: inline`
    Inline,
    /// Replaced or otherwise unbreakable inline content.
    Atomic,
    /// `<br>`
    LineBreak,
}

/// [§ 15.3.1 Hidden elements](https://html.spec.whatwg.org/multipage/rendering.html#hidden-elements)
///
/// "area, base, basefont, datalist, head, link, meta, noembed, noframes,
/// param, rp, script, style, template, title { display: none; }"
const HIDDEN_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "datalist", "head", "link", "meta", "noembed", "noframes",
    "param", "rp", "script", "style", "template", "title",
];

const BLOCK_ELEMENTS: &[&str] = &[
    "html", "body", "address", "article", "aside", "blockquote", "center", "dd", "details",
    "dialog", "dir", "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form",
    "h1", "h2", "h3", "h4", "h5", "h6", "header", "hgroup", "hr", "legend", "li", "listing",
    "main", "menu", "nav", "ol", "p", "plaintext", "pre", "search", "section", "summary",
    "table", "tr", "ul", "xmp",
];

const ATOMIC_ELEMENTS: &[&str] = &[
    "img", "input", "button", "select", "textarea", "canvas", "video", "iframe", "svg",
];

/// Default display kind for a tag name.
///
/// Unknown elements are inline, matching the CSS initial value of
/// `display`.
#[must_use]
pub fn default_display_for_element(tag_name: &str) -> DisplayKind {
    if HIDDEN_ELEMENTS.contains(&tag_name) {
        DisplayKind::Hidden
    } else if tag_name == "br" {
        DisplayKind::LineBreak
    } else if BLOCK_ELEMENTS.contains(&tag_name) {
        DisplayKind::Block
    } else if ATOMIC_ELEMENTS.contains(&tag_name) {
        DisplayKind::Atomic
    } else {
        DisplayKind::Inline
    }
}

/// [§ 15.3.7 Sections and headings](https://html.spec.whatwg.org/multipage/rendering.html#sections-and-headings)
///
/// Font size multiplier relative to the parent.
#[must_use]
pub fn font_scale(tag_name: &str) -> f32 {
    match tag_name {
        "h1" => 2.0,
        "h2" => 1.5,
        "h3" => 1.17,
        "h5" | "small" => 0.83,
        "h6" | "sub" | "sup" => 0.67,
        "big" => 1.2,
        _ => 1.0,
    }
}

/// Vertical margin, in em of the element's own font size.
///
/// "p { margin-block: 1em; }" and the heading margins from § 15.3.7.
#[must_use]
pub fn block_margin_em(tag_name: &str) -> f32 {
    match tag_name {
        "p" | "ul" | "ol" | "dl" | "pre" | "blockquote" | "figure" | "h3" | "menu" | "dir" => {
            1.0
        }
        "h1" => 0.67,
        "h2" => 0.83,
        "h4" => 1.33,
        "h5" => 1.67,
        "h6" => 2.33,
        "hr" => 0.5,
        _ => 0.0,
    }
}

/// Whether the element gets the list/quote start padding.
#[must_use]
pub fn has_start_indent(tag_name: &str) -> bool {
    matches!(tag_name, "ul" | "ol" | "blockquote" | "menu" | "dir" | "dd")
}

/// Whether white space inside the element is preserved.
#[must_use]
pub fn is_preformatted(tag_name: &str) -> bool {
    matches!(tag_name, "pre" | "listing" | "xmp" | "plaintext" | "textarea")
}
