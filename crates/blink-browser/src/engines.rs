//! The engine bundle shared by content hosts.

use std::sync::{Arc, OnceLock};

use blink_js::{RuntimeError, ScriptRuntime};
use blink_layout::LayoutEngine;
use blink_render::RenderController;

use crate::config::EngineConfig;

static SHARED: OnceLock<Engines> = OnceLock::new();

/// Handles to one script runtime, layout engine and render controller.
///
/// Cloning shares the engines. Hosts built from the same bundle share
/// script globals, last layout metrics and render statistics.
#[derive(Clone)]
pub struct Engines {
    /// Script runtime.
    pub script: Arc<ScriptRuntime>,
    /// Layout engine.
    pub layout: Arc<LayoutEngine>,
    /// Render controller.
    pub render: Arc<RenderController>,
}

impl Engines {
    /// Create a fresh bundle.
    ///
    /// # Errors
    ///
    /// Fails if the script worker cannot be started.
    pub fn initialize(config: &EngineConfig) -> Result<Self, RuntimeError> {
        let engines = Self {
            script: Arc::new(ScriptRuntime::new(config.runtime.clone())?),
            layout: Arc::new(LayoutEngine::new(config.layout.clone())),
            render: Arc::new(RenderController::new(config.render.clone())),
        };
        tracing::debug!("engines initialized");
        Ok(engines)
    }

    /// The process-wide bundle with default configuration, created on
    /// first use.
    ///
    /// # Errors
    ///
    /// Fails if the bundle does not exist yet and cannot be created.
    pub fn shared() -> Result<Self, RuntimeError> {
        if let Some(engines) = SHARED.get() {
            return Ok(engines.clone());
        }
        let engines = Self::initialize(&EngineConfig::default())?;
        // A racing initializer may have won; its bundle is the shared one.
        Ok(SHARED.get_or_init(|| engines).clone())
    }
}
