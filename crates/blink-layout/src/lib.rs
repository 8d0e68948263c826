//! Layout engine for the Blink engine layer.
//!
//! Computes the content size and a metrics snapshot for markup under
//! width/height constraints. A pass is a pure function of the markup, the
//! constraints and the engine [`LayoutConfig`]; the only state the engine
//! keeps between passes is the last metrics snapshot and a pass counter.
//!
//! # Scope
//!
//! - Block boxes stacked vertically with collapsed vertical margins
//! - Inline content broken greedily into line boxes
//! - `display: none` for the user-agent hidden elements
//! - Atomic inline boxes for replaced elements and form controls
//!
//! # Not Yet Implemented
//!
//! - Author style sheets and the `style` attribute
//! - Floats, positioning, tables and flex/grid

/// Layout configuration.
pub mod config;
/// User-agent display defaults.
pub mod display;
/// Block and inline flow.
pub mod flow;
/// Text measurement.
pub mod font;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use blink_common::Metrics;
use blink_dom::{DomTree, NodeId, NodeType};
use blink_html::{ParseError, ParsedDocument};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use config::LayoutConfig;
pub use display::{DisplayKind, default_display_for_element};
pub use font::{ApproximateFontMetrics, FontMetrics};

/// Errors from a layout pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// The markup could not be parsed.
    #[error("markup could not be parsed: {reason}")]
    Parse {
        /// Parser diagnostic.
        reason: String,
        /// 1-based line of the failure.
        line: usize,
        /// 1-based column of the failure.
        column: usize,
    },
    /// A bound was negative or not finite.
    #[error("invalid layout constraints: {reason}")]
    InvalidConstraints {
        /// Which bound was rejected and why.
        reason: String,
    },
}

impl From<ParseError> for LayoutError {
    fn from(err: ParseError) -> Self {
        Self::Parse {
            reason: err.to_string(),
            line: err.line,
            column: err.column,
        }
    }
}

/// One axis of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// At most this many pixels.
    Bounded(f32),
    /// No limit; content takes its natural extent.
    Unbounded,
}

impl Dimension {
    /// Space available for content on this axis.
    #[must_use]
    pub const fn available(self) -> f32 {
        match self {
            Self::Bounded(max) => max,
            Self::Unbounded => f32::INFINITY,
        }
    }

    /// Clamp a natural extent to this bound.
    #[must_use]
    pub fn clamp(self, natural: f32) -> f32 {
        match self {
            Self::Bounded(max) => natural.min(max),
            Self::Unbounded => natural,
        }
    }

    fn validate(self, axis: &str) -> Result<(), LayoutError> {
        match self {
            Self::Bounded(max) if !max.is_finite() => Err(LayoutError::InvalidConstraints {
                reason: format!("{axis} bound {max} is not finite"),
            }),
            Self::Bounded(max) if max < 0.0 => Err(LayoutError::InvalidConstraints {
                reason: format!("{axis} bound {max} is negative"),
            }),
            _ => Ok(()),
        }
    }
}

/// Bounds for a layout pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    /// Maximum content width.
    pub max_width: Dimension,
    /// Maximum content height.
    pub max_height: Dimension,
}

impl Constraints {
    /// No bound on either axis.
    pub const UNBOUNDED: Self = Self {
        max_width: Dimension::Unbounded,
        max_height: Dimension::Unbounded,
    };

    /// Constraints from two dimensions.
    #[must_use]
    pub const fn new(max_width: Dimension, max_height: Dimension) -> Self {
        Self {
            max_width,
            max_height,
        }
    }

    /// Bounded width, unbounded height (content scrolls vertically).
    #[must_use]
    pub const fn width(max_width: f32) -> Self {
        Self::new(Dimension::Bounded(max_width), Dimension::Unbounded)
    }

    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidConstraints`] for a negative or
    /// non-finite bound.
    pub fn validate(&self) -> Result<(), LayoutError> {
        self.max_width.validate("width")?;
        self.max_height.validate("height")
    }
}

/// A computed size, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

/// The outcome of one layout pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    /// Natural content size clamped to the constraints.
    pub size: Size,
    /// Per-pass metrics; deterministic for the same inputs.
    pub metrics: Metrics,
}

/// Computes layout for markup; safe to share between threads.
pub struct LayoutEngine {
    config: RwLock<LayoutConfig>,
    font_metrics: Option<Arc<dyn FontMetrics>>,
    last_metrics: RwLock<Metrics>,
    passes: AtomicU64,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl LayoutEngine {
    /// Engine measuring text with [`ApproximateFontMetrics`].
    #[must_use]
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config: RwLock::new(config),
            font_metrics: None,
            last_metrics: RwLock::new(Metrics::new()),
            passes: AtomicU64::new(0),
        }
    }

    /// Engine measuring text with an embedder-supplied implementation.
    #[must_use]
    pub fn with_font_metrics(config: LayoutConfig, font_metrics: Arc<dyn FontMetrics>) -> Self {
        Self {
            font_metrics: Some(font_metrics),
            ..Self::new(config)
        }
    }

    /// Replace the configuration used by later passes.
    pub fn configure(&self, config: LayoutConfig) {
        tracing::debug!(?config, "layout engine reconfigured");
        *self.config.write() = config;
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> LayoutConfig {
        self.config.read().clone()
    }

    /// Parse `markup` and lay it out under `constraints`.
    ///
    /// # Errors
    ///
    /// [`LayoutError::InvalidConstraints`] for a bad bound,
    /// [`LayoutError::Parse`] when the markup cannot be parsed. Neither
    /// touches [`last_metrics`](Self::last_metrics).
    pub fn compute_layout(
        &self,
        markup: &str,
        constraints: Constraints,
    ) -> Result<LayoutResult, LayoutError> {
        constraints.validate()?;
        let parsed = blink_html::parse_document(markup).inspect_err(|err| {
            tracing::debug!(%err, "layout input rejected by parser");
        })?;
        Ok(self.run_pass(&parsed.dom, parsed.issues.len(), constraints))
    }

    /// Lay out an already-parsed document. Gives the same result as
    /// [`compute_layout`](Self::compute_layout) on the markup it came from.
    ///
    /// # Errors
    ///
    /// [`LayoutError::InvalidConstraints`] for a bad bound.
    pub fn compute_layout_for_document(
        &self,
        document: &ParsedDocument,
        constraints: Constraints,
    ) -> Result<LayoutResult, LayoutError> {
        constraints.validate()?;
        Ok(self.run_pass(&document.dom, document.issues.len(), constraints))
    }

    /// Metrics of the most recent successful pass, or empty.
    #[must_use]
    pub fn last_metrics(&self) -> Metrics {
        self.last_metrics.read().clone()
    }

    /// Successful passes since construction.
    #[must_use]
    pub fn pass_count(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    fn run_pass(
        &self,
        dom: &DomTree,
        issue_count: usize,
        constraints: Constraints,
    ) -> LayoutResult {
        let config = self.config();
        let approximate = ApproximateFontMetrics::from_config(&config);
        let fonts: &dyn FontMetrics = match &self.font_metrics {
            Some(custom) => custom.as_ref(),
            None => &approximate,
        };

        let flow = flow::layout_tree(
            dom,
            NodeId::ROOT,
            constraints.max_width.available(),
            &config,
            fonts,
        );
        let size = Size {
            width: constraints.max_width.clamp(flow.width),
            height: constraints.max_height.clamp(flow.height),
        };
        let metrics = collect_metrics(dom, &flow, size, issue_count);

        tracing::debug!(
            node_count = dom.len().saturating_sub(1),
            width = size.width,
            height = size.height,
            lines = flow.line_count,
            "layout pass complete"
        );

        *self.last_metrics.write() = metrics.clone();
        let _ = self.passes.fetch_add(1, Ordering::Relaxed);
        LayoutResult { size, metrics }
    }
}

fn collect_metrics(
    dom: &DomTree,
    flow: &flow::FlowOutcome,
    size: Size,
    issue_count: usize,
) -> Metrics {
    let mut element_count = 0_usize;
    let mut text_node_count = 0_usize;
    let mut comment_count = 0_usize;
    let mut max_depth = 0_usize;
    for id in dom.iter_all() {
        match dom.get(id).map(|n| &n.node_type) {
            Some(NodeType::Element(_)) => element_count += 1,
            Some(NodeType::Text(_)) => text_node_count += 1,
            Some(NodeType::Comment(_)) => comment_count += 1,
            _ => continue,
        }
        max_depth = max_depth.max(dom.depth(id));
    }

    let mut metrics = Metrics::new();
    metrics.insert("node_count", element_count + text_node_count + comment_count);
    metrics.insert("element_count", element_count);
    metrics.insert("text_node_count", text_node_count);
    metrics.insert("comment_count", comment_count);
    metrics.insert("max_depth", max_depth);
    metrics.insert("box_count", flow.box_count);
    metrics.insert("line_count", flow.line_count);
    metrics.insert("reflow_count", flow.reflow_count);
    metrics.insert("parse_issue_count", issue_count);
    metrics.insert("content_width", flow.width);
    metrics.insert("content_height", flow.height);
    metrics.insert("overflow_x", flow.width > size.width);
    metrics.insert("overflow_y", flow.height > size.height);
    if let Some(title) = dom.title() {
        metrics.insert("title", title);
    }
    metrics
}
