//! [§ 13.2.6 Tree construction](https://html.spec.whatwg.org/multipage/parsing.html#tree-construction)
//!
//! A simplified tree builder: it maintains the stack of open elements,
//! closes void elements immediately and applies the handful of implied end
//! tags that matter for layout (`p`, `li`, `option`). It does not
//! synthesize `html`/`head`/`body`; fragments stay fragments.

use blink_dom::{DomTree, ElementData, NodeId, NodeType};

use crate::error::{ParseError, ParseErrorKind, ParseIssue};
use crate::token::Token;

/// Maximum depth of the stack of open elements.
pub const MAX_NESTING_DEPTH: usize = 512;

/// [§ 13.1.2 Elements](https://html.spec.whatwg.org/multipage/syntax.html#void-elements)
///
/// "Void elements: area, base, br, col, embed, hr, img, input, link, meta,
/// source, track, wbr"
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Start tags that close an open `p` element.
///
/// [§ 13.2.6.4.7 "in body"](https://html.spec.whatwg.org/multipage/parsing.html#parsing-main-inbody)
/// "If the stack of open elements has a p element in button scope, then
/// close a p element."
const CLOSES_P: &[&str] = &[
    "address", "article", "aside", "blockquote", "div", "dl", "fieldset", "footer", "form",
    "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "main", "nav", "ol", "p", "pre",
    "section", "table", "ul",
];

/// Tree builder over a token stream.
pub struct HTMLParser {
    tokens: Vec<Token>,
    dom: DomTree,
    open_elements: Vec<NodeId>,
    issues: Vec<ParseIssue>,
}

impl HTMLParser {
    /// Create a parser over tokens produced by [`HTMLTokenizer`](crate::HTMLTokenizer).
    #[must_use]
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            dom: DomTree::new(),
            open_elements: Vec::new(),
            issues: Vec::new(),
        }
    }

    /// Build the tree, returning it together with recoverable issues.
    ///
    /// # Errors
    ///
    /// Returns [`ParseErrorKind::NestingTooDeep`] when elements nest deeper
    /// than [`MAX_NESTING_DEPTH`].
    pub fn run_with_issues(mut self) -> Result<(DomTree, Vec<ParseIssue>), ParseError> {
        let tokens = std::mem::take(&mut self.tokens);
        for token in tokens {
            match token {
                Token::Doctype { .. } => {}
                Token::StartTag {
                    name,
                    attributes,
                    self_closing,
                } => {
                    self.close_implied(&name);
                    let mut data = ElementData::new(name.clone());
                    for attr in attributes {
                        let _ = data.attrs.insert(attr.name, attr.value);
                    }
                    let parent = self.current_node();
                    let id = self.dom.alloc(NodeType::Element(data));
                    self.dom.append_child(parent, id);

                    let is_void = VOID_ELEMENTS.contains(&name.as_str());
                    if self_closing && !is_void {
                        // "non-void-html-element-start-tag-with-trailing-solidus"
                        // The flag is honored so that `<div/>` stays empty.
                        self.issue(format!("self-closing non-void element <{name}/>"));
                    }
                    if !is_void && !self_closing {
                        self.open_elements.push(id);
                        if self.open_elements.len() > MAX_NESTING_DEPTH {
                            return Err(ParseError {
                                kind: ParseErrorKind::NestingTooDeep,
                                line: 0,
                                column: 0,
                            });
                        }
                    }
                }
                Token::EndTag { name } => self.close_element(&name),
                Token::Character(text) => {
                    let parent = self.current_node();
                    // Text split by a stray end tag joins the preceding
                    // text node instead of starting a new one.
                    let last_text = self
                        .dom
                        .children(parent)
                        .last()
                        .copied()
                        .filter(|&last| self.dom.as_text(last).is_some());
                    if let Some(NodeType::Text(existing)) = last_text
                        .and_then(|last| self.dom.get_mut(last))
                        .map(|node| &mut node.node_type)
                    {
                        existing.push_str(&text);
                    } else {
                        let id = self.dom.alloc(NodeType::Text(text));
                        self.dom.append_child(parent, id);
                    }
                }
                Token::Comment(data) => {
                    let parent = self.current_node();
                    let id = self.dom.alloc(NodeType::Comment(data));
                    self.dom.append_child(parent, id);
                }
                Token::EndOfFile => break,
            }
        }

        // [§ 13.2.6.4.7] "An end-of-file token: ... Stop parsing." Elements
        // still open are implicitly closed.
        Ok((self.dom, self.issues))
    }

    /// Build the tree, dropping recoverable issues.
    ///
    /// # Errors
    ///
    /// See [`run_with_issues`](Self::run_with_issues).
    pub fn run(self) -> Result<DomTree, ParseError> {
        self.run_with_issues().map(|(dom, _)| dom)
    }

    /// "The current node is the bottommost node in this stack of open
    /// elements." The Document when the stack is empty.
    fn current_node(&self) -> NodeId {
        self.open_elements.last().copied().unwrap_or(NodeId::ROOT)
    }

    fn current_tag(&self) -> Option<&str> {
        self.dom
            .as_element(self.current_node())
            .map(|e| e.tag_name.as_str())
    }

    fn issue(&mut self, message: String) {
        self.issues.push(ParseIssue { message });
    }

    /// Apply the implied end tags for an incoming start tag.
    fn close_implied(&mut self, incoming: &str) {
        if CLOSES_P.contains(&incoming) && self.has_in_scope("p") {
            self.close_element("p");
        }
        // "If node is an li element, then ... generate implied end tags,
        // except for li elements ... Pop elements from the stack of open
        // elements until an li element has been popped."
        let implied: [(&str, &[&str]); 4] = [
            ("li", &["li"]),
            ("option", &["option"]),
            ("dt", &["dt", "dd"]),
            ("dd", &["dt", "dd"]),
        ];
        for (tag, siblings) in implied {
            if incoming == tag
                && let Some(current) = self.current_tag()
                && siblings.contains(&current)
            {
                let _ = self.open_elements.pop();
            }
        }
    }

    fn has_in_scope(&self, tag: &str) -> bool {
        self.open_elements
            .iter()
            .any(|&id| self.dom.as_element(id).is_some_and(|e| e.tag_name == tag))
    }

    /// "Pop elements from the stack of open elements until an element with
    /// the same tag name has been popped from the stack."
    fn close_element(&mut self, tag: &str) {
        let position = self
            .open_elements
            .iter()
            .rposition(|&id| self.dom.as_element(id).is_some_and(|e| e.tag_name == tag));
        match position {
            Some(index) => {
                if index + 1 != self.open_elements.len() {
                    self.issue(format!("end tag </{tag}> closed unclosed descendants"));
                }
                self.open_elements.truncate(index);
            }
            None => self.issue(format!("stray end tag </{tag}> ignored")),
        }
    }
}
