//! Tests for DOM tree construction and traversal.

use blink_dom::{DomTree, ElementData, NodeId, NodeType};

/// Helper to create an element node and return its NodeId.
fn alloc_element(tree: &mut DomTree, tag: &str) -> NodeId {
    tree.alloc(NodeType::Element(ElementData::new(tag)))
}

/// Builds `<html><head><title> A  b </title></head><body><p>x</p><p>y</p></body></html>`.
fn sample_tree() -> (DomTree, NodeId, NodeId) {
    let mut tree = DomTree::new();
    let html = alloc_element(&mut tree, "html");
    tree.append_child(NodeId::ROOT, html);
    let head = alloc_element(&mut tree, "head");
    tree.append_child(html, head);
    let title = alloc_element(&mut tree, "title");
    tree.append_child(head, title);
    let title_text = tree.alloc(NodeType::Text(" A  b ".to_string()));
    tree.append_child(title, title_text);
    let body = alloc_element(&mut tree, "body");
    tree.append_child(html, body);
    for text in ["x", "y"] {
        let p = alloc_element(&mut tree, "p");
        tree.append_child(body, p);
        let t = tree.alloc(NodeType::Text(text.to_string()));
        tree.append_child(p, t);
    }
    (tree, html, body)
}

#[test]
fn test_new_tree_has_document_only() {
    let tree = DomTree::new();
    assert_eq!(tree.len(), 1);
    assert!(matches!(
        tree.get(tree.root()).map(|n| &n.node_type),
        Some(NodeType::Document)
    ));
    assert!(tree.children(NodeId::ROOT).is_empty());
}

#[test]
fn test_append_child_links_parent() {
    let (tree, html, body) = sample_tree();
    assert_eq!(tree.parent(body), Some(html));
    assert_eq!(tree.parent(html), Some(NodeId::ROOT));
    assert_eq!(tree.children(html).len(), 2);
}

#[test]
fn test_iter_all_is_tree_order() {
    let (tree, _, _) = sample_tree();
    let tags: Vec<&str> = tree
        .iter_all()
        .filter_map(|id| tree.as_element(id))
        .map(|e| e.tag_name.as_str())
        .collect();
    assert_eq!(tags, vec!["html", "head", "title", "body", "p", "p"]);
}

#[test]
fn test_text_content_and_depth() {
    let (tree, _, body) = sample_tree();
    assert_eq!(tree.text_content(body), "xy");
    assert_eq!(tree.depth(body), 2);
    assert_eq!(tree.depth(NodeId::ROOT), 0);
}

#[test]
fn test_title_collapses_whitespace() {
    let (tree, _, _) = sample_tree();
    assert_eq!(tree.title().as_deref(), Some("A b"));
    assert_eq!(DomTree::new().title(), None);
}

#[test]
fn test_elements_by_tag_name() {
    let (tree, _, _) = sample_tree();
    assert_eq!(tree.elements_by_tag_name("p").len(), 2);
    assert!(tree.elements_by_tag_name("div").is_empty());
}

#[test]
fn test_attr_px() {
    let mut data = ElementData::new("img");
    let _ = data.attrs.insert("width".to_string(), "120px".to_string());
    let _ = data.attrs.insert("height".to_string(), "-4".to_string());
    assert_eq!(data.attr_px("width"), Some(120.0));
    assert_eq!(data.attr_px("height"), None);
    assert_eq!(data.attr_px("missing"), None);
}

#[test]
fn test_append_child_ignores_unknown_ids() {
    let mut tree = DomTree::new();
    let div = alloc_element(&mut tree, "div");
    tree.append_child(NodeId::ROOT, NodeId(99));
    tree.append_child(NodeId(42), div);
    assert!(tree.children(NodeId::ROOT).is_empty());
    assert_eq!(tree.parent(div), None);
    assert_eq!(tree.as_element(NodeId(99)), None);
}
