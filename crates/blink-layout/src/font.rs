//! Text measurement.
//!
//! [§ 10.8 Line height calculations](https://www.w3.org/TR/CSS2/visudet.html#line-height)
//!
//! "CSS assumes that every font has font metrics that specify a
//! characteristic height above the baseline and a depth below it."

use crate::config::LayoutConfig;

/// Measures text for line breaking.
///
/// Embedders with real font data plug in their own implementation; the
/// engine falls back to [`ApproximateFontMetrics`].
pub trait FontMetrics: Send + Sync {
    /// Advance width of `text` at `font_size`.
    fn text_width(&self, text: &str, font_size: f32) -> f32;

    /// Used line height at `font_size`.
    fn line_height(&self, font_size: f32) -> f32;
}

/// Fixed-advance metrics: every character is `char_width_ratio` em wide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApproximateFontMetrics {
    /// Advance per character, in em.
    pub char_width_ratio: f32,
    /// Line height, in em.
    pub line_height_ratio: f32,
}

impl ApproximateFontMetrics {
    /// Metrics matching a layout configuration.
    #[must_use]
    pub const fn from_config(config: &LayoutConfig) -> Self {
        Self {
            char_width_ratio: config.char_width_ratio,
            line_height_ratio: config.line_height_ratio,
        }
    }
}

impl FontMetrics for ApproximateFontMetrics {
    #[allow(clippy::cast_precision_loss)]
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        text.chars().filter(|ch| !ch.is_control()).count() as f32
            * font_size
            * self.char_width_ratio
    }

    fn line_height(&self, font_size: f32) -> f32 {
        font_size * self.line_height_ratio
    }
}
