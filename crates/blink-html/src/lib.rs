//! Markup tokenizer and tree builder for the Blink engine layer.
//!
//! This is the parse stage of the embedded content renderer: markup goes in,
//! a [`DomTree`] comes out, or a [`ParseError`] if the markup cannot be
//! parsed.
//!
//! # Scope
//!
//! - **Tokenizer** ([WHATWG § 13.2.5](https://html.spec.whatwg.org/multipage/parsing.html#tokenization))
//!   - Data, RAWTEXT, tag, attribute, comment and DOCTYPE states
//!   - Common named and all numeric character references
//! - **Tree builder** ([WHATWG § 13.2.6](https://html.spec.whatwg.org/multipage/parsing.html#tree-construction))
//!   - Stack of open elements, void elements, implied `p`/`li`/`option` end tags
//!
//! # Not Yet Implemented
//!
//! - Insertion modes and implicit `html`/`head`/`body` synthesis
//! - Foster parenting and the adoption agency algorithm

/// Parse failures and issues.
pub mod error;
/// Tree construction.
pub mod parser;
/// Tokens.
pub mod token;
/// Tokenizer state machine.
pub mod tokenizer;

use std::fmt::Write as _;

use blink_dom::{DomTree, NodeId, NodeType};

pub use error::{ParseError, ParseErrorKind, ParseIssue};
pub use parser::{HTMLParser, MAX_NESTING_DEPTH, VOID_ELEMENTS};
pub use token::{Attribute, Token};
pub use tokenizer::{HTMLTokenizer, RAW_TEXT_ELEMENTS, TokenizerState};

/// A parsed document plus the recoverable issues noticed along the way.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// The DOM tree.
    pub dom: DomTree,
    /// Recoverable issues (stray end tags and similar).
    pub issues: Vec<ParseIssue>,
}

/// Tokenize and tree-build `markup`.
///
/// # Errors
///
/// Returns a [`ParseError`] if the input ends inside a tag, comment,
/// DOCTYPE or raw text element, or nests too deeply.
pub fn parse_document(markup: &str) -> Result<ParsedDocument, ParseError> {
    let mut tokenizer = HTMLTokenizer::new(markup.to_string());
    tokenizer.run();
    let tokens = tokenizer.into_result()?;
    let (dom, issues) = HTMLParser::new(tokens).run_with_issues()?;
    Ok(ParsedDocument { dom, issues })
}

/// [§ 4.12.1 The script element](https://html.spec.whatwg.org/multipage/scripting.html#the-script-element)
///
/// Collect the source of every inline classic script, in document order.
///
/// Scripts with a `src` attribute are external and skipped, as are
/// non-JavaScript `type`s (e.g. `application/json` data blocks).
#[must_use]
pub fn extract_inline_scripts(dom: &DomTree) -> Vec<String> {
    dom.elements_by_tag_name("script")
        .into_iter()
        .filter(|&id| {
            dom.as_element(id).is_some_and(|e| {
                // "If the element has a src content attribute..." it is
                // fetched, not run inline.
                !e.attrs.contains_key("src")
                    && e.attrs.get("type").is_none_or(|t| {
                        let t = t.trim().to_ascii_lowercase();
                        t.is_empty() || t == "text/javascript" || t == "application/javascript"
                    })
            })
        })
        .map(|id| dom.text_content(id))
        .filter(|source| !source.trim().is_empty())
        .collect()
}

/// Render a tree as an indented outline, one node per line.
#[must_use]
pub fn dump_tree(dom: &DomTree, id: NodeId) -> String {
    let mut out = String::new();
    dump_node(dom, id, 0, &mut out);
    out
}

fn dump_node(dom: &DomTree, id: NodeId, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let Some(node) = dom.get(id) else {
        return;
    };
    let _ = match &node.node_type {
        NodeType::Document => writeln!(out, "{indent}#document"),
        NodeType::Element(data) => {
            let attrs: String = data
                .attrs
                .iter()
                .map(|(k, v)| format!(" {k}=\"{v}\""))
                .collect();
            writeln!(out, "{indent}<{}{attrs}>", data.tag_name)
        }
        NodeType::Text(text) => writeln!(out, "{indent}\"{}\"", text.escape_debug()),
        NodeType::Comment(text) => writeln!(out, "{indent}<!--{text}-->"),
    };
    for &child in dom.children(id) {
        dump_node(dom, child, depth + 1, out);
    }
}
