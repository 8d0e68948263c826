//! Block and inline flow.
//!
//! [§ 9.4 Normal flow](https://www.w3.org/TR/CSS2/visuren.html#normal-flow)
//!
//! "Boxes in the normal flow belong to a formatting context, which may be
//! block or inline, but not both simultaneously."
//!
//! Inline content that sits next to block siblings is wrapped in an
//! anonymous block (§ 9.2.1.1), which here just means the pending inline
//! items are flushed into line boxes before the next block starts.

use blink_common::warning::warn_once;
use blink_dom::{DomTree, ElementData, NodeId, NodeType};

use crate::config::LayoutConfig;
use crate::display::{
    DisplayKind, block_margin_em, default_display_for_element, font_scale, has_start_indent,
    is_preformatted,
};
use crate::font::FontMetrics;

/// Upper bound on `<textarea>` `cols` and `rows`.
const MAX_TEXTAREA_CELLS: f32 = 10_000.0;

/// Totals for one pass over a tree.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlowOutcome {
    /// Natural content width (widest line or block).
    pub width: f32,
    /// Natural content height.
    pub height: f32,
    /// Line boxes produced.
    pub line_count: usize,
    /// Times a line was broken because the next item did not fit.
    pub reflow_count: usize,
    /// Block and atomic inline boxes produced.
    pub box_count: usize,
}

/// Lay out the children of `root` in a containing block `available_width`
/// wide. `f32::INFINITY` disables wrapping.
pub fn layout_tree(
    dom: &DomTree,
    root: NodeId,
    available_width: f32,
    config: &LayoutConfig,
    fonts: &dyn FontMetrics,
) -> FlowOutcome {
    let mut flow = Flow {
        dom,
        config,
        fonts,
        line_count: 0,
        reflow_count: 0,
        box_count: 0,
    };
    let style = InheritedStyle {
        font_size: config.font_size,
        preformatted: false,
    };
    let (width, height) = flow.layout_block_children(root, available_width, style);
    FlowOutcome {
        width,
        height,
        line_count: flow.line_count,
        reflow_count: flow.reflow_count,
        box_count: flow.box_count,
    }
}

/// The inherited properties this model cares about.
#[derive(Debug, Clone, Copy)]
struct InheritedStyle {
    font_size: f32,
    preformatted: bool,
}

/// One unit of inline content, already measured.
#[derive(Debug, Clone, Copy)]
enum InlineItem {
    Word { width: f32, height: f32 },
    /// Collapsible white space between words.
    Space { width: f32 },
    Atomic { width: f32, height: f32 },
    /// Forced break (`<br>`, newline in preformatted text). Ends the line
    /// even if it is empty.
    Break { height: f32 },
    /// Ends the current line only if it has content.
    EndLine,
}

#[derive(Debug, Clone, Copy, Default)]
struct LineState {
    width: f32,
    height: f32,
    pending_space: f32,
    has_content: bool,
}

struct Flow<'a> {
    dom: &'a DomTree,
    config: &'a LayoutConfig,
    fonts: &'a dyn FontMetrics,
    line_count: usize,
    reflow_count: usize,
    box_count: usize,
}

impl Flow<'_> {
    /// [§ 9.4.1 Block formatting contexts](https://www.w3.org/TR/CSS2/visuren.html#block-formatting)
    ///
    /// "In a block formatting context, boxes are laid out one after the
    /// other, vertically, beginning at the top of a containing block."
    ///
    /// Returns the natural (width, height) of the children.
    fn layout_block_children(
        &mut self,
        parent: NodeId,
        available: f32,
        style: InheritedStyle,
    ) -> (f32, f32) {
        let dom = self.dom;
        let mut inline = Vec::new();
        let mut cursor_y = 0.0_f32;
        let mut content_width = 0.0_f32;
        // Bottom margin of the previous block, not yet placed so it can
        // collapse with the next top margin.
        let mut prev_margin = 0.0_f32;

        for &child in dom.children(parent) {
            let Some(data) = dom.as_element(child) else {
                self.collect_inline(child, style, &mut inline);
                continue;
            };
            let tag = data.tag_name.as_str();
            match default_display_for_element(tag) {
                DisplayKind::Hidden => {}
                DisplayKind::Block => {
                    let (w, h) = self.layout_inline(&inline, available);
                    inline.clear();
                    if h > 0.0 {
                        cursor_y += prev_margin + h;
                        prev_margin = 0.0;
                    }
                    content_width = content_width.max(w);

                    let child_style = child_style(tag, style);
                    let margin =
                        block_margin_em(tag) * child_style.font_size * self.config.margin_scale;
                    // [§ 8.3.1 Collapsing margins](https://www.w3.org/TR/CSS2/box.html#collapsing-margins)
                    // "the resulting margin width is the maximum of the
                    // collapsing margins' widths"
                    cursor_y += prev_margin.max(margin);

                    let indent = if has_start_indent(tag) {
                        self.config.list_indent
                    } else {
                        0.0
                    };
                    let (w, h) = if tag == "hr" {
                        (0.0, 2.0)
                    } else {
                        self.layout_block_children(
                            child,
                            (available - indent).max(0.0),
                            child_style,
                        )
                    };
                    self.box_count += 1;
                    cursor_y += h;
                    content_width = content_width.max(w + indent);
                    prev_margin = margin;
                }
                _ => self.collect_inline(child, style, &mut inline),
            }
        }

        let (w, h) = self.layout_inline(&inline, available);
        if h > 0.0 {
            cursor_y += prev_margin + h;
            prev_margin = 0.0;
        }
        content_width = content_width.max(w);
        (content_width, cursor_y + prev_margin)
    }

    /// Flatten inline content under `id` into measured items.
    fn collect_inline(&mut self, id: NodeId, style: InheritedStyle, items: &mut Vec<InlineItem>) {
        let dom = self.dom;
        let Some(node) = dom.get(id) else {
            return;
        };
        match &node.node_type {
            NodeType::Text(text) => self.push_text(text, style, items),
            NodeType::Element(data) => match default_display_for_element(&data.tag_name) {
                DisplayKind::Hidden => {}
                DisplayKind::LineBreak => items.push(InlineItem::Break {
                    height: self.fonts.line_height(style.font_size),
                }),
                DisplayKind::Atomic => {
                    let (width, height) = self.atomic_size(id, data, style);
                    self.box_count += 1;
                    items.push(InlineItem::Atomic { width, height });
                }
                DisplayKind::Inline => {
                    let child_style = child_style(&data.tag_name, style);
                    for &child in dom.children(id) {
                        self.collect_inline(child, child_style, items);
                    }
                }
                DisplayKind::Block => {
                    // A block inside an inline splits the inline around it.
                    let child_style = child_style(&data.tag_name, style);
                    self.box_count += 1;
                    items.push(InlineItem::EndLine);
                    for &child in dom.children(id) {
                        self.collect_inline(child, child_style, items);
                    }
                    items.push(InlineItem::EndLine);
                }
            },
            NodeType::Document | NodeType::Comment(_) => {}
        }
    }

    /// [§ 16.6.1 The 'white-space' processing model](https://www.w3.org/TR/CSS2/text.html#white-space-model)
    fn push_text(&self, text: &str, style: InheritedStyle, items: &mut Vec<InlineItem>) {
        let height = self.fonts.line_height(style.font_size);

        if style.preformatted {
            for (i, segment) in text.split('\n').enumerate() {
                if i > 0 {
                    items.push(InlineItem::Break { height });
                }
                if !segment.is_empty() {
                    items.push(InlineItem::Word {
                        width: self.fonts.text_width(segment, style.font_size),
                        height,
                    });
                }
            }
            return;
        }

        // "any space immediately following another collapsible space ... is
        // collapsed to have zero advance width"
        let space = InlineItem::Space {
            width: self.fonts.text_width(" ", style.font_size),
        };
        if text.starts_with(char::is_whitespace) {
            items.push(space);
        }
        let mut first = true;
        for word in text.split_whitespace() {
            if !first {
                items.push(space);
            }
            items.push(InlineItem::Word {
                width: self.fonts.text_width(word, style.font_size),
                height,
            });
            first = false;
        }
        if !first && text.ends_with(char::is_whitespace) {
            items.push(space);
        }
    }

    /// [§ 10.3.2 Inline, replaced elements](https://www.w3.org/TR/CSS2/visudet.html#inline-replaced-width)
    fn atomic_size(&self, id: NodeId, data: &ElementData, style: InheritedStyle) -> (f32, f32) {
        let line_height = self.fonts.line_height(style.font_size);
        let char_width = self.fonts.text_width("0", style.font_size);
        let (default_width, default_height) = match data.tag_name.as_str() {
            "img" => (
                self.config.default_image_size,
                self.config.default_image_size,
            ),
            // "the default object size is a width of 300 CSS pixels and a
            // height of 150 CSS pixels"
            "canvas" | "video" | "iframe" | "svg" => {
                let _ = warn_once(
                    "Layout",
                    &format!("<{}> is laid out as an empty box", data.tag_name),
                );
                (300.0, 150.0)
            }
            "textarea" => {
                let cols = data
                    .attr_px("cols")
                    .map_or(20.0, |c| c.clamp(1.0, MAX_TEXTAREA_CELLS).trunc());
                let rows = data
                    .attr_px("rows")
                    .map_or(2.0, |r| r.clamp(1.0, MAX_TEXTAREA_CELLS).trunc());
                (char_width * cols, line_height * rows)
            }
            "button" => (
                self.fonts
                    .text_width(self.dom.text_content(id).trim(), style.font_size)
                    + 12.0,
                line_height + 4.0,
            ),
            _ => (char_width * 20.0, line_height + 4.0),
        };
        (
            data.attr_px("width").unwrap_or(default_width),
            data.attr_px("height").unwrap_or(default_height),
        )
    }

    /// [§ 9.4.2 Inline formatting contexts](https://www.w3.org/TR/CSS2/visuren.html#inline-formatting)
    ///
    /// "When an inline box exceeds the width of a line box, it is split
    /// into several boxes and these boxes are distributed across several
    /// line boxes."
    ///
    /// Greedy line breaking; a single item wider than the line still takes
    /// a line of its own and overflows.
    fn layout_inline(&mut self, items: &[InlineItem], available: f32) -> (f32, f32) {
        let mut line = LineState::default();
        let mut max_width = 0.0_f32;
        let mut total_height = 0.0_f32;

        for item in items {
            match *item {
                InlineItem::Space { width } => {
                    if line.has_content {
                        line.pending_space = line.pending_space.max(width);
                    }
                }
                InlineItem::Word { width, height } | InlineItem::Atomic { width, height } => {
                    if line.has_content && line.width + line.pending_space + width > available {
                        self.reflow_count += 1;
                        self.finish_line(&mut line, &mut max_width, &mut total_height);
                    }
                    line.width += line.pending_space + width;
                    line.pending_space = 0.0;
                    line.height = line.height.max(height);
                    line.has_content = true;
                }
                InlineItem::Break { height } => {
                    line.height = line.height.max(height);
                    self.finish_line(&mut line, &mut max_width, &mut total_height);
                }
                InlineItem::EndLine => {
                    if line.has_content {
                        self.finish_line(&mut line, &mut max_width, &mut total_height);
                    }
                }
            }
        }
        if line.has_content {
            self.finish_line(&mut line, &mut max_width, &mut total_height);
        }
        (max_width, total_height)
    }

    fn finish_line(&mut self, line: &mut LineState, max_width: &mut f32, total_height: &mut f32) {
        *max_width = max_width.max(line.width);
        *total_height += line.height;
        self.line_count += 1;
        *line = LineState::default();
    }
}

fn child_style(tag_name: &str, parent: InheritedStyle) -> InheritedStyle {
    InheritedStyle {
        font_size: parent.font_size * font_scale(tag_name),
        preformatted: parent.preformatted || is_preformatted(tag_name),
    }
}
