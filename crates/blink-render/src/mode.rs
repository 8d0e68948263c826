use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

/// Named configuration for turning a layout into a frame.
///
/// Any mode may follow any other; there is no terminal mode.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    EnumCount,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Device scale, antialiased.
    #[default]
    Normal,
    /// Scale capped at 1x, no antialiasing.
    Performance,
    /// 1x scale, antialiased, sizes snapped to whole pixels.
    Compatibility,
}

impl RenderMode {
    /// Index into per-mode counter tables.
    pub(crate) const fn index(self) -> usize {
        self as usize
    }

    /// Whether frames in this mode are antialiased.
    #[must_use]
    pub const fn antialiasing(self) -> bool {
        !matches!(self, Self::Performance)
    }

    /// Scale used for a frame given the device scale factor.
    #[must_use]
    pub fn scale(self, device_scale: f32) -> f32 {
        match self {
            Self::Normal => device_scale,
            Self::Performance => device_scale.min(1.0),
            Self::Compatibility => 1.0,
        }
    }
}
