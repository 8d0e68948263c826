//! Parse failures and recoverable parse issues.

use strum_macros::Display;
use thiserror::Error;

/// [§ 13.2.2 Parse errors](https://html.spec.whatwg.org/multipage/parsing.html#parse-errors)
///
/// The subset of parse errors this parser treats as fatal: input that ends
/// in the middle of a construct, or nesting beyond what layout can handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ParseErrorKind {
    /// "eof-in-tag"
    EofInTag,
    /// "eof-in-comment"
    EofInComment,
    /// "eof-in-doctype"
    EofInDoctype,
    /// End of input inside `<script>`, `<style>`, `<title>` or `<textarea>`.
    EofInRawText,
    /// The stack of open elements exceeded [`MAX_NESTING_DEPTH`](crate::MAX_NESTING_DEPTH).
    NestingTooDeep,
}

/// A fatal parse error with its source position (1-based).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at line {line}, column {column}")]
pub struct ParseError {
    /// What went wrong.
    pub kind: ParseErrorKind,
    /// 1-based line.
    pub line: usize,
    /// 1-based column, in characters.
    pub column: usize,
}

/// A recoverable problem noticed while building the tree, e.g. a stray end
/// tag. The tree is still produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIssue {
    /// Human-readable description.
    pub message: String,
}
