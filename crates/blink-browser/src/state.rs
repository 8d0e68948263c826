//! What a completed load leaves behind.

use std::time::Duration;

use blink_common::Metrics;
use blink_js::ScriptError;
use blink_layout::LayoutResult;
use blink_render::RenderFrame;
use serde::Serialize;

/// Where loaded content came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentSource {
    /// A request URL.
    Url {
        /// The requested URL.
        url: String,
    },
    /// Markup handed to the host directly.
    Markup {
        /// The markup.
        source: String,
        /// Base URI supplied with it.
        base: Option<String>,
    },
}

impl ContentSource {
    /// The URL, or the base URI of raw markup, or the markup itself when it
    /// came without one.
    #[must_use]
    pub fn identifier(&self) -> &str {
        match self {
            Self::Url { url } => url,
            Self::Markup { source, base } => base.as_deref().unwrap_or(source),
        }
    }

    /// `document.URL` for content from this source.
    #[must_use]
    pub fn document_url(&self) -> &str {
        match self {
            Self::Url { url } => url,
            Self::Markup { base, .. } => base.as_deref().unwrap_or("about:blank"),
        }
    }
}

/// Wall-clock time spent in each phase of one load, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PhaseTimings {
    /// Fetching the request. Zero for raw markup.
    pub fetch_ms: f64,
    /// Parsing the markup.
    pub parse_ms: f64,
    /// First layout pass.
    pub layout_ms: f64,
    /// Running embedded scripts.
    pub script_ms: f64,
    /// Re-parse and re-layout after script mutation.
    pub relayout_ms: f64,
    /// Rendering the frame.
    pub render_ms: f64,
    /// The whole load, including the above.
    pub total_ms: f64,
}

pub(crate) fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

impl PhaseTimings {
    /// Timings as metrics, keyed by phase.
    #[must_use]
    pub fn to_metrics(&self) -> Metrics {
        let mut metrics = Metrics::new();
        metrics.insert("fetch_ms", self.fetch_ms);
        metrics.insert("parse_ms", self.parse_ms);
        metrics.insert("layout_ms", self.layout_ms);
        metrics.insert("script_ms", self.script_ms);
        metrics.insert("relayout_ms", self.relayout_ms);
        metrics.insert("render_ms", self.render_ms);
        metrics.insert("total_ms", self.total_ms);
        metrics
    }
}

/// The state of a host after a completed load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentState {
    /// Load generation that produced this state.
    pub generation: u64,
    /// Where the content came from.
    pub source: ContentSource,
    /// Document title after scripts ran.
    pub title: Option<String>,
    /// Final layout.
    pub layout: LayoutResult,
    /// The rendered frame; `None` when the render pass failed.
    pub frame: Option<RenderFrame>,
    /// Why the render pass failed. The layout stands regardless.
    pub render_error: Option<String>,
    /// Inline scripts run.
    pub script_count: usize,
    /// Scripts that failed. The layout stands regardless.
    pub script_errors: Vec<ScriptError>,
    /// Whether scripts changed the document and it was laid out again.
    pub relayout: bool,
    /// Recoverable parse issues in the final markup.
    pub parse_issues: usize,
    /// Per-phase timings.
    pub timings: PhaseTimings,
}
