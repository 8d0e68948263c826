//! [§ 13.2.5 Tokenization](https://html.spec.whatwg.org/multipage/parsing.html#tokenization)
//!
//! "The output of the tokenization step is a series of zero or more of the
//! following tokens: DOCTYPE, start tag, end tag, comment, character,
//! end-of-file."

/// A single attribute on a start tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Lower-cased attribute name.
    pub name: String,
    /// Attribute value with character references resolved.
    pub value: String,
}

/// A token produced by [`HTMLTokenizer`](crate::HTMLTokenizer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// "DOCTYPE tokens have a name"
    Doctype {
        /// Lower-cased DOCTYPE name, e.g. `html`.
        name: String,
    },
    /// "Start and end tag tokens have a tag name, a self-closing flag, and
    /// a list of attributes"
    StartTag {
        /// Lower-cased tag name.
        name: String,
        /// Attributes in source order; duplicates are dropped.
        attributes: Vec<Attribute>,
        /// Whether the tag ended in `/>`.
        self_closing: bool,
    },
    /// An end tag.
    EndTag {
        /// Lower-cased tag name.
        name: String,
    },
    /// A run of character data. Adjacent characters are coalesced.
    Character(String),
    /// "Comment and character tokens have data."
    Comment(String),
    /// End of input.
    EndOfFile,
}

impl Token {
    /// Whether this is a start tag with the given name.
    #[must_use]
    pub fn is_start_tag(&self, tag: &str) -> bool {
        matches!(self, Self::StartTag { name, .. } if name == tag)
    }
}
