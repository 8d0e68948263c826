//! Integration tests for the layout engine.

use std::sync::Arc;

use blink_layout::{
    Constraints, Dimension, DisplayKind, FontMetrics, LayoutConfig, LayoutEngine, LayoutError,
    default_display_for_element,
};
use quickcheck::TestResult;
use quickcheck_macros::quickcheck;

/// Helper: lay out markup with a fresh default engine.
fn layout(markup: &str, constraints: Constraints) -> blink_layout::LayoutResult {
    LayoutEngine::default()
        .compute_layout(markup, constraints)
        .expect("layout should succeed")
}

/// Helper: float comparison with a tolerance for accumulated rounding.
fn approx(actual: f32, expected: f32) -> bool {
    (actual - expected).abs() < 0.01
}

/// 10px per character, 20px lines, regardless of font size.
struct FixedMetrics;

impl FontMetrics for FixedMetrics {
    #[allow(clippy::cast_precision_loss)]
    fn text_width(&self, text: &str, _font_size: f32) -> f32 {
        text.chars().count() as f32 * 10.0
    }

    fn line_height(&self, _font_size: f32) -> f32 {
        20.0
    }
}

// ========== display defaults ==========

#[test]
fn test_default_display_block() {
    assert_eq!(default_display_for_element("div"), DisplayKind::Block);
    assert_eq!(default_display_for_element("p"), DisplayKind::Block);
    assert_eq!(default_display_for_element("li"), DisplayKind::Block);
}

#[test]
fn test_default_display_inline() {
    assert_eq!(default_display_for_element("span"), DisplayKind::Inline);
    assert_eq!(default_display_for_element("a"), DisplayKind::Inline);
    assert_eq!(default_display_for_element("custom-tag"), DisplayKind::Inline);
}

#[test]
fn test_default_display_none() {
    for tag in ["head", "script", "style", "title", "meta", "link", "template"] {
        assert_eq!(default_display_for_element(tag), DisplayKind::Hidden, "{tag}");
    }
}

#[test]
fn test_default_display_atomic_and_break() {
    assert_eq!(default_display_for_element("img"), DisplayKind::Atomic);
    assert_eq!(default_display_for_element("br"), DisplayKind::LineBreak);
}

// ========== sizes ==========

#[test]
fn test_div_hi_at_width_320() {
    let result = layout("<div>hi</div>", Constraints::width(320.0));
    assert!(result.size.width <= 320.0);
    assert!(result.size.height >= 0.0);
    assert!(result.metrics.get_int("node_count").unwrap_or(0) >= 1);
    // Two characters at 16px * 0.6, one 16px * 1.2 line.
    assert!(approx(result.size.width, 19.2), "{:?}", result.size);
    assert!(approx(result.size.height, 19.2), "{:?}", result.size);
}

#[test]
fn test_empty_markup_has_zero_size() {
    let result = layout("", Constraints::UNBOUNDED);
    assert!(approx(result.size.width, 0.0));
    assert!(approx(result.size.height, 0.0));
    assert_eq!(result.metrics.get_int("node_count"), Some(0));
}

#[test]
fn test_words_wrap_at_available_width() {
    // "aaaa" and "bbbb" are 38.4px each; the pair with a space is 86.4px.
    let result = layout("<div>aaaa bbbb</div>", Constraints::width(50.0));
    assert_eq!(result.metrics.get_int("line_count"), Some(2));
    assert_eq!(result.metrics.get_int("reflow_count"), Some(1));
    assert!(approx(result.size.height, 38.4));
    assert!(approx(result.size.width, 38.4));

    let wide = layout("<div>aaaa bbbb</div>", Constraints::width(500.0));
    assert_eq!(wide.metrics.get_int("line_count"), Some(1));
    assert_eq!(wide.metrics.get_int("reflow_count"), Some(0));
    assert!(approx(wide.size.width, 86.4));
}

#[test]
fn test_collapsible_white_space() {
    let spaced = layout("<div>  a \n\t b  </div>", Constraints::UNBOUNDED);
    let tight = layout("<div>a b</div>", Constraints::UNBOUNDED);
    assert_eq!(spaced.size, tight.size);
}

#[test]
fn test_overlong_word_overflows() {
    let result = layout("<div>abcdefghij</div>", Constraints::width(50.0));
    assert!(approx(result.size.width, 50.0));
    assert_eq!(result.metrics.get_int("overflow_x"), Some(1));
    assert_eq!(result.metrics.get_int("reflow_count"), Some(0));
}

#[test]
fn test_hidden_elements_generate_no_boxes() {
    let result = layout(
        "<head><title>Doc</title><style>p{}</style></head><script>x()</script><div>x</div>",
        Constraints::UNBOUNDED,
    );
    assert_eq!(result.metrics.get_int("line_count"), Some(1));
    assert_eq!(result.metrics.get_int("box_count"), Some(1));
    assert_eq!(
        result.metrics.get("title").and_then(|v| v.as_text()),
        Some("Doc")
    );
}

#[test]
fn test_br_breaks_lines() {
    let result = layout("a<br>b<br><br>c", Constraints::UNBOUNDED);
    assert_eq!(result.metrics.get_int("line_count"), Some(4));
    assert!(approx(result.size.height, 4.0 * 19.2));
}

#[test]
fn test_image_is_atomic() {
    let result = layout(r#"<img width="50" height="40">"#, Constraints::UNBOUNDED);
    assert!(approx(result.size.width, 50.0));
    assert!(approx(result.size.height, 40.0));
}

#[test]
fn test_adjacent_margins_collapse() {
    // 16 + line + max(16, 16) + line + 16
    let result = layout("<p>a</p><p>b</p>", Constraints::UNBOUNDED);
    assert!(approx(result.size.height, 16.0 + 19.2 + 16.0 + 19.2 + 16.0));
}

#[test]
fn test_list_indent_reduces_available_width() {
    let result = layout("<ul><li>aaaa bbbb</li></ul>", Constraints::width(100.0));
    // 100 - 40 indent leaves 60px: the pair (86.4px) no longer fits.
    assert_eq!(result.metrics.get_int("line_count"), Some(2));
}

#[test]
fn test_heading_font_scale() {
    let result = layout("<h1>ab</h1>", Constraints::UNBOUNDED);
    assert!(approx(result.size.width, 2.0 * 32.0 * 0.6));
}

#[test]
fn test_preformatted_text_keeps_lines() {
    let result = layout("<pre>a  b\nc</pre>", Constraints::width(10.0));
    assert_eq!(result.metrics.get_int("line_count"), Some(2));
    assert_eq!(result.metrics.get_int("reflow_count"), Some(0));
}

// ========== metrics ==========

#[test]
fn test_tree_metrics() {
    let result = layout(
        "<div><span>x</span><!-- c --></div>",
        Constraints::UNBOUNDED,
    );
    assert_eq!(result.metrics.get_int("element_count"), Some(2));
    assert_eq!(result.metrics.get_int("text_node_count"), Some(1));
    assert_eq!(result.metrics.get_int("comment_count"), Some(1));
    assert_eq!(result.metrics.get_int("node_count"), Some(4));
    assert_eq!(result.metrics.get_int("max_depth"), Some(3));
}

#[test]
fn test_parse_issues_are_counted() {
    let result = layout("<div>x</b></div>", Constraints::UNBOUNDED);
    assert_eq!(result.metrics.get_int("parse_issue_count"), Some(1));
}

#[test]
fn test_last_metrics_tracks_latest_pass() {
    let engine = LayoutEngine::default();
    assert!(engine.last_metrics().is_empty());

    let first = engine
        .compute_layout("<div>a</div>", Constraints::UNBOUNDED)
        .unwrap();
    assert_eq!(engine.last_metrics(), first.metrics);

    let second = engine
        .compute_layout("<div>a</div><div>b</div>", Constraints::UNBOUNDED)
        .unwrap();
    assert_eq!(engine.last_metrics(), second.metrics);
    assert_eq!(engine.pass_count(), 2);
}

#[test]
fn test_pass_count_is_not_part_of_result() {
    let engine = LayoutEngine::default();
    let a = engine.compute_layout("<p>x</p>", Constraints::UNBOUNDED).unwrap();
    let b = engine.compute_layout("<p>x</p>", Constraints::UNBOUNDED).unwrap();
    assert_eq!(a, b);
    assert_eq!(engine.pass_count(), 2);
}

// ========== errors ==========

#[test]
fn test_parse_failure_keeps_last_metrics() {
    let engine = LayoutEngine::default();
    let ok = engine.compute_layout("<p>x</p>", Constraints::UNBOUNDED).unwrap();

    let err = engine
        .compute_layout("<div class=\"open", Constraints::UNBOUNDED)
        .unwrap_err();
    assert!(matches!(err, LayoutError::Parse { line: 1, .. }), "{err:?}");
    assert_eq!(engine.last_metrics(), ok.metrics);
    assert_eq!(engine.pass_count(), 1);
}

#[test]
fn test_invalid_constraints_rejected() {
    let engine = LayoutEngine::default();
    for bad in [
        Constraints::width(-1.0),
        Constraints::width(f32::NAN),
        Constraints::new(Dimension::Unbounded, Dimension::Bounded(f32::INFINITY)),
    ] {
        assert!(matches!(
            engine.compute_layout("<p>x</p>", bad),
            Err(LayoutError::InvalidConstraints { .. })
        ));
    }
}

#[test]
fn test_zero_width_is_valid() {
    let result = layout("<div>a b</div>", Constraints::width(0.0));
    assert!(approx(result.size.width, 0.0));
    assert_eq!(result.metrics.get_int("line_count"), Some(2));
}

// ========== configuration ==========

#[test]
fn test_configure_changes_result() {
    let engine = LayoutEngine::default();
    let before = engine
        .compute_layout("<div>ab</div>", Constraints::UNBOUNDED)
        .unwrap();
    engine.configure(LayoutConfig {
        font_size: 32.0,
        ..LayoutConfig::default()
    });
    let after = engine
        .compute_layout("<div>ab</div>", Constraints::UNBOUNDED)
        .unwrap();
    assert!(approx(after.size.width, before.size.width * 2.0));
    assert!((engine.config().font_size - 32.0).abs() < f32::EPSILON);
}

#[test]
fn test_config_deserializes_with_defaults() {
    let config: LayoutConfig = serde_json::from_str(r#"{"font_size": 12.0}"#).unwrap();
    assert!((config.font_size - 12.0).abs() < f32::EPSILON);
    assert!((config.line_height_ratio - 1.2).abs() < f32::EPSILON);
}

#[test]
fn test_custom_font_metrics() {
    let engine = LayoutEngine::with_font_metrics(LayoutConfig::default(), Arc::new(FixedMetrics));
    let result = engine
        .compute_layout("<div>abc</div>", Constraints::UNBOUNDED)
        .unwrap();
    assert!(approx(result.size.width, 30.0));
    assert!(approx(result.size.height, 20.0));
}

#[test]
fn test_textarea_sized_by_cols_and_rows() {
    let engine = LayoutEngine::with_font_metrics(LayoutConfig::default(), Arc::new(FixedMetrics));
    let result = engine
        .compute_layout(r#"<textarea cols="4" rows="3"></textarea>"#, Constraints::UNBOUNDED)
        .unwrap();
    assert!(approx(result.size.width, 40.0));
    assert!(approx(result.size.height, 60.0));
}

#[test]
fn test_huge_textarea_cols_are_capped() {
    let engine = LayoutEngine::with_font_metrics(LayoutConfig::default(), Arc::new(FixedMetrics));
    let result = engine
        .compute_layout(r#"<textarea cols="1e30"></textarea>"#, Constraints::UNBOUNDED)
        .unwrap();
    assert!(approx(result.size.width, 100_000.0));
    assert!(approx(result.size.height, 40.0));

    let bounded = LayoutEngine::default()
        .compute_layout(
            r#"<textarea cols="1e30" rows="1e30"></textarea>"#,
            Constraints::width(320.0),
        )
        .unwrap();
    assert!(bounded.size.width <= 320.0);
    assert!(bounded.size.height.is_finite());
}

// ========== properties ==========

#[quickcheck]
fn prop_layout_is_deterministic(markup: String, width: u16) -> bool {
    let engine = LayoutEngine::default();
    let constraints = Constraints::width(f32::from(width));
    engine.compute_layout(&markup, constraints) == engine.compute_layout(&markup, constraints)
}

#[quickcheck]
fn prop_size_is_clamped(words: Vec<u8>, width: u16, height: u16) -> TestResult {
    if words.is_empty() {
        return TestResult::discard();
    }
    let body: String = words
        .iter()
        .map(|&n| match n % 4 {
            0 => "<p>lorem ipsum</p>".to_string(),
            1 => "<br>".to_string(),
            2 => format!("<img width={n} height={n}>"),
            _ => "x".repeat(usize::from(n % 16) + 1) + " ",
        })
        .collect();
    let (width, height) = (f32::from(width), f32::from(height));
    let result = LayoutEngine::default()
        .compute_layout(
            &body,
            Constraints::new(Dimension::Bounded(width), Dimension::Bounded(height)),
        )
        .expect("generated markup is well-formed");
    TestResult::from_bool(
        result.size.width <= width
            && result.size.height <= height
            && result.size.width >= 0.0
            && result.size.height >= 0.0,
    )
}
