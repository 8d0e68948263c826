//! Host and engine configuration.
//!
//! Every struct deserializes from partial JSON; missing fields take their
//! defaults.

use std::time::Duration;

use blink_js::RuntimeConfig;
use blink_layout::LayoutConfig;
use blink_render::RenderConfig;
use serde::{Deserialize, Serialize};

use crate::BLINK_FRAMEWORK_VERSION_STRING;

/// Per-host session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Run embedded scripts and allow `evaluate_javascript`.
    pub enable_javascript: bool,
    /// Bind `localStorage` for page scripts.
    pub enable_dom_storage: bool,
    /// Value of `navigator.userAgent`.
    pub user_agent: String,
    /// Fail a load that has not completed after this many milliseconds.
    pub load_timeout_ms: Option<u64>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            enable_javascript: true,
            enable_dom_storage: true,
            user_agent: default_user_agent(),
            load_timeout_ms: None,
        }
    }
}

impl HostConfig {
    /// The load timeout as a duration.
    #[must_use]
    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_ms.map(Duration::from_millis)
    }
}

/// User agent reported when none is configured.
#[must_use]
pub fn default_user_agent() -> String {
    format!("Mozilla/5.0 (compatible) BlinkFramework/{BLINK_FRAMEWORK_VERSION_STRING}")
}

/// Configuration for a full engine bundle plus the default host settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default settings for hosts.
    pub host: HostConfig,
    /// Layout engine.
    pub layout: LayoutConfig,
    /// Script runtime limits.
    pub runtime: RuntimeConfig,
    /// Render controller.
    pub render: RenderConfig,
}
