//! Layout engine configuration.

use serde::{Deserialize, Serialize};

/// Tunables that affect every layout pass.
///
/// Changing any field is the only thing allowed to change the result of a
/// pass for the same markup and constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Root font size in pixels.
    ///
    /// [§ 3.5 font-size](https://www.w3.org/TR/css-fonts-4/#font-size-prop)
    /// "medium" is 16px in every major engine.
    pub font_size: f32,
    /// Average advance of one character, as a fraction of the font size.
    pub char_width_ratio: f32,
    /// [§ 10.8.1 Leading and half-leading](https://www.w3.org/TR/CSS2/visudet.html#leading)
    ///
    /// "We recommend a used value for 'normal' between 1.0 and 1.2."
    pub line_height_ratio: f32,
    /// Multiplier for the user-agent vertical margins of paragraphs,
    /// headings and lists.
    pub margin_scale: f32,
    /// Start padding of `ul`, `ol` and `blockquote`, in pixels.
    pub list_indent: f32,
    /// Size used for `<img>` without `width`/`height` attributes.
    pub default_image_size: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            font_size: 16.0,
            char_width_ratio: 0.6,
            line_height_ratio: 1.2,
            margin_scale: 1.0,
            list_indent: 40.0,
            default_image_size: 0.0,
        }
    }
}
