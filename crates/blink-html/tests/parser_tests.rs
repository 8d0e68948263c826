//! Integration tests for the markup tokenizer and tree builder.

use blink_dom::{DomTree, NodeId, NodeType};
use blink_html::{
    HTMLTokenizer, ParseErrorKind, Token, dump_tree, extract_inline_scripts, parse_document,
};

/// Helper to parse markup that is expected to be well-formed.
fn parse(markup: &str) -> DomTree {
    parse_document(markup).expect("markup should parse").dom
}

/// Helper to tokenize markup that is expected to be well-formed.
fn tokenize(markup: &str) -> Vec<Token> {
    let mut tokenizer = HTMLTokenizer::new(markup.to_string());
    tokenizer.run();
    tokenizer.into_result().expect("markup should tokenize")
}

/// Helper to list element tag names in tree order.
fn tags(tree: &DomTree) -> Vec<String> {
    tree.iter_all()
        .filter_map(|id| tree.as_element(id))
        .map(|e| e.tag_name.clone())
        .collect()
}

// ========== tokenizer ==========

#[test]
fn test_tokenize_simple_element() {
    assert_eq!(
        tokenize("<div>hi</div>"),
        vec![
            Token::StartTag {
                name: "div".to_string(),
                attributes: vec![],
                self_closing: false,
            },
            Token::Character("hi".to_string()),
            Token::EndTag {
                name: "div".to_string()
            },
            Token::EndOfFile,
        ]
    );
}

#[test]
fn test_tokenize_attributes_all_quote_styles() {
    let tokens = tokenize(r#"<img SRC="a.png" alt='x y' width=10 hidden>"#);
    let Token::StartTag { name, attributes, .. } = &tokens[0] else {
        panic!("expected start tag, got {:?}", tokens[0]);
    };
    assert_eq!(name, "img");
    let pairs: Vec<(&str, &str)> = attributes
        .iter()
        .map(|a| (a.name.as_str(), a.value.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![("src", "a.png"), ("alt", "x y"), ("width", "10"), ("hidden", "")]
    );
}

#[test]
fn test_tokenize_duplicate_attribute_keeps_first() {
    let tokens = tokenize(r#"<p id="a" id="b">"#);
    let Token::StartTag { attributes, .. } = &tokens[0] else {
        panic!("expected start tag");
    };
    assert_eq!(attributes.len(), 1);
    assert_eq!(attributes[0].value, "a");
}

#[test]
fn test_tokenize_character_references() {
    let tokens = tokenize("a &amp; b &lt;c&gt; &#65;&#x42; &bogus;");
    assert_eq!(tokens[0], Token::Character("a & b <c> AB &bogus;".to_string()));
}

#[test]
fn test_tokenize_script_is_raw_text() {
    let tokens = tokenize("<script>if (a < b && c) { x = '</div>'; }</script>");
    assert_eq!(
        tokens[1],
        Token::Character("if (a < b && c) { x = '</div>'; }".to_string())
    );
    assert_eq!(
        tokens[2],
        Token::EndTag {
            name: "script".to_string()
        }
    );
}

#[test]
fn test_tokenize_comment_and_doctype() {
    let tokens = tokenize("<!DOCTYPE html><!-- note -->x");
    assert_eq!(
        tokens[0],
        Token::Doctype {
            name: "html".to_string()
        }
    );
    assert_eq!(tokens[1], Token::Comment(" note ".to_string()));
    assert_eq!(tokens[2], Token::Character("x".to_string()));
}

#[test]
fn test_lone_less_than_is_text() {
    assert_eq!(tokenize("1 < 2")[0], Token::Character("1 < 2".to_string()));
}

// ========== fatal errors ==========

#[test]
fn test_eof_in_tag_is_fatal() {
    let err = parse_document("<div class=\"x").unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::EofInTag);
    assert_eq!(err.line, 1);
}

#[test]
fn test_eof_in_comment_is_fatal() {
    let err = parse_document("<p>a</p>\n<!-- never closed").unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::EofInComment);
    assert_eq!(err.line, 2);
}

#[test]
fn test_eof_in_script_is_fatal() {
    let err = parse_document("<script>var x = 1;").unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::EofInRawText);
}

#[test]
fn test_nesting_too_deep_is_fatal() {
    let markup = "<div>".repeat(blink_html::MAX_NESTING_DEPTH + 1);
    let err = parse_document(&markup).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::NestingTooDeep);
}

#[test]
fn test_error_display() {
    let err = parse_document("<a").unwrap_err();
    assert_eq!(err.to_string(), "eof-in-tag at line 1, column 3");
}

// ========== tree construction ==========

#[test]
fn test_fragment_is_not_wrapped() {
    let tree = parse("<div>hi</div>");
    assert_eq!(tags(&tree), vec!["div"]);
    assert_eq!(tree.len(), 3);
    assert_eq!(tree.text_content(NodeId::ROOT), "hi");
}

#[test]
fn test_void_elements_do_not_nest() {
    let tree = parse("<p>a<br>b<img src=x>c</p>");
    let p = tree.elements_by_tag_name("p")[0];
    assert_eq!(tree.children(p).len(), 5);
}

#[test]
fn test_p_closed_by_block() {
    let tree = parse("<p>one<div>two</div>");
    let div = tree.elements_by_tag_name("div")[0];
    assert_eq!(tree.parent(div), Some(NodeId::ROOT));
}

#[test]
fn test_li_closes_previous_li() {
    let tree = parse("<ul><li>a<li>b</ul>");
    let ul = tree.elements_by_tag_name("ul")[0];
    assert_eq!(tree.children(ul).len(), 2);
}

#[test]
fn test_stray_end_tag_is_an_issue_not_an_error() {
    let parsed = parse_document("<div>x</span></div>").unwrap();
    assert_eq!(parsed.issues.len(), 1);
    assert!(parsed.issues[0].message.contains("</span>"));
}

#[test]
fn test_text_split_by_stray_end_tag_is_merged() {
    let tree = parse("<p>a</span>b</p>");
    let p = tree.elements_by_tag_name("p")[0];
    let texts: Vec<&str> = tree
        .children(p)
        .iter()
        .filter_map(|&id| tree.as_text(id))
        .collect();
    assert_eq!(texts, vec!["ab"]);
}

#[test]
fn test_unclosed_elements_are_closed_at_eof() {
    let tree = parse("<div><span>open");
    assert_eq!(tags(&tree), vec!["div", "span"]);
}

#[test]
fn test_comment_node_kept() {
    let tree = parse("<!--x-->");
    let child = tree.children(NodeId::ROOT)[0];
    assert!(matches!(
        tree.get(child).map(|n| &n.node_type),
        Some(NodeType::Comment(c)) if c == "x"
    ));
}

// ========== helpers ==========

#[test]
fn test_extract_inline_scripts() {
    let tree = parse(
        r#"<script>a()</script><script src="x.js"></script>
           <script type="application/json">{"k":1}</script><script> </script>
           <script type="text/javascript">b()</script>"#,
    );
    assert_eq!(extract_inline_scripts(&tree), vec!["a()", "b()"]);
}

#[test]
fn test_dump_tree_outline() {
    let tree = parse(r#"<div id="a">hi</div>"#);
    assert_eq!(
        dump_tree(&tree, NodeId::ROOT),
        "#document\n  <div id=\"a\">\n    \"hi\"\n"
    );
}
