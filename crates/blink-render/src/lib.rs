//! Render controller for the Blink engine layer.
//!
//! Holds the current [`RenderMode`] and cumulative render-pass counters.
//! A render pass turns a [`LayoutResult`] into a [`RenderFrame`]
//! description; pixel compositing belongs to the embedder.
//!
//! Counters are monotonic until [`RenderController::reset_stats`]. Every
//! increment happens under the shared side of a gate lock and the reset
//! takes the exclusive side, so a reset never lands in the middle of a
//! pass's bookkeeping.

mod mode;

use std::sync::atomic::{AtomicU64, Ordering};

use blink_common::Metrics;
use blink_layout::LayoutResult;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use strum::{EnumCount, IntoEnumIterator};
use thiserror::Error;

pub use mode::RenderMode;

/// Errors from the render controller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// A mode name that is not one of [`RenderMode`].
    #[error("invalid argument: unknown render mode '{0}'")]
    InvalidArgument(String),
    /// The frame would exceed the configured surface limit.
    #[error("surface {width}x{height} exceeds the maximum area of {max_area} pixels")]
    SurfaceTooLarge {
        /// Device width.
        width: f32,
        /// Device height.
        height: f32,
        /// Configured limit.
        max_area: f64,
    },
    /// The layout size was negative or not finite.
    #[error("cannot render a {width}x{height} layout")]
    InvalidSize {
        /// Layout width.
        width: f32,
        /// Layout height.
        height: f32,
    },
}

/// Render controller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Mode at construction.
    pub initial_mode: RenderMode,
    /// Device pixels per layout pixel.
    pub device_scale_factor: f32,
    /// Largest surface (device width x height) a pass may produce.
    pub max_surface_area: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            initial_mode: RenderMode::Normal,
            device_scale_factor: 1.0,
            // 16384 x 16384, the common GPU texture limit.
            max_surface_area: 268_435_456.0,
        }
    }
}

/// Description of one rendered frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderFrame {
    /// Mode snapshotted at the start of the pass.
    pub mode: RenderMode,
    /// Device width.
    pub width: f32,
    /// Device height.
    pub height: f32,
    /// Device pixels per layout pixel.
    pub scale: f32,
    /// Whether edges are antialiased.
    pub antialiasing: bool,
    /// Sequence number of this pass since construction. Not reset by
    /// [`RenderController::reset_stats`].
    pub pass: u64,
}

#[derive(Debug, Default)]
struct Counters {
    frames_rendered: AtomicU64,
    mode_switches: AtomicU64,
    errors: AtomicU64,
    frames_by_mode: [AtomicU64; RenderMode::COUNT],
}

impl Counters {
    fn all(&self) -> impl Iterator<Item = &AtomicU64> {
        [&self.frames_rendered, &self.mode_switches, &self.errors]
            .into_iter()
            .chain(self.frames_by_mode.iter())
    }
}

/// Render-mode state machine plus counters; shareable between threads.
#[derive(Debug)]
pub struct RenderController {
    config: RenderConfig,
    mode: RwLock<RenderMode>,
    counters: Counters,
    /// Shared by increments, exclusive for reset.
    gate: RwLock<()>,
    passes: AtomicU64,
}

impl Default for RenderController {
    fn default() -> Self {
        Self::new(RenderConfig::default())
    }
}

impl RenderController {
    /// Controller starting in `config.initial_mode` with zeroed counters.
    #[must_use]
    pub fn new(config: RenderConfig) -> Self {
        Self {
            mode: RwLock::new(config.initial_mode),
            config,
            counters: Counters::default(),
            gate: RwLock::new(()),
            passes: AtomicU64::new(0),
        }
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> RenderMode {
        *self.mode.read()
    }

    /// Switch modes; the next pass uses `mode`. Setting the current mode
    /// again is not counted as a switch.
    pub fn set_mode(&self, mode: RenderMode) {
        let previous = std::mem::replace(&mut *self.mode.write(), mode);
        if previous != mode {
            self.increment(&self.counters.mode_switches);
            tracing::info!(from = %previous, to = %mode, "render mode changed");
        }
    }

    /// Switch modes by name (`normal`, `performance`, `compatibility`,
    /// ASCII case-insensitive).
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidArgument`] for an unknown name; the current
    /// mode is left unchanged.
    pub fn set_mode_named(&self, name: &str) -> Result<(), RenderError> {
        let mode = name
            .trim()
            .parse::<RenderMode>()
            .map_err(|_| RenderError::InvalidArgument(name.to_string()))?;
        self.set_mode(mode);
        Ok(())
    }

    /// Run one render pass over a layout.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidSize`] for a negative or non-finite layout
    /// size, [`RenderError::SurfaceTooLarge`] past the configured area.
    /// Either failure counts towards `errors` instead of `frames_rendered`.
    pub fn render(&self, layout: &LayoutResult) -> Result<RenderFrame, RenderError> {
        let mode = self.mode();
        let pass = self.passes.fetch_add(1, Ordering::Relaxed) + 1;

        let frame = self.build_frame(mode, layout, pass).inspect_err(|err| {
            self.increment(&self.counters.errors);
            tracing::warn!(%mode, pass, %err, "render pass failed");
        })?;

        {
            let _gate = self.gate.read();
            let _ = self.counters.frames_rendered.fetch_add(1, Ordering::Relaxed);
            let _ = self.counters.frames_by_mode[mode.index()].fetch_add(1, Ordering::Relaxed);
        }
        tracing::trace!(%mode, pass, width = frame.width, height = frame.height, "frame rendered");
        Ok(frame)
    }

    /// Counter snapshot: `frames_rendered`, `mode_switches`, `errors` and
    /// `frames.<mode>` for every mode.
    #[must_use]
    pub fn stats(&self) -> Metrics {
        let _gate = self.gate.read();
        let mut stats = Metrics::new();
        stats.insert("frames_rendered", self.counters.frames_rendered.load(Ordering::Relaxed));
        stats.insert("mode_switches", self.counters.mode_switches.load(Ordering::Relaxed));
        stats.insert("errors", self.counters.errors.load(Ordering::Relaxed));
        for mode in RenderMode::iter() {
            stats.insert(
                format!("frames.{mode}"),
                self.counters.frames_by_mode[mode.index()].load(Ordering::Relaxed),
            );
        }
        stats
    }

    /// Zero every counter. The mode is kept.
    pub fn reset_stats(&self) {
        let _gate = self.gate.write();
        for counter in self.counters.all() {
            counter.store(0, Ordering::Relaxed);
        }
        tracing::debug!("render stats reset");
    }

    /// Configuration the controller was built with.
    #[must_use]
    pub const fn config(&self) -> &RenderConfig {
        &self.config
    }

    fn increment(&self, counter: &AtomicU64) {
        let _gate = self.gate.read();
        let _ = counter.fetch_add(1, Ordering::Relaxed);
    }

    fn build_frame(
        &self,
        mode: RenderMode,
        layout: &LayoutResult,
        pass: u64,
    ) -> Result<RenderFrame, RenderError> {
        let size = layout.size;
        let valid = |v: f32| v.is_finite() && v >= 0.0;
        if !valid(size.width) || !valid(size.height) {
            return Err(RenderError::InvalidSize {
                width: size.width,
                height: size.height,
            });
        }

        let scale = mode.scale(self.config.device_scale_factor);
        let (mut width, mut height) = (size.width * scale, size.height * scale);
        if mode == RenderMode::Compatibility {
            width = width.ceil();
            height = height.ceil();
        }

        let max_area = self.config.max_surface_area;
        if f64::from(width) * f64::from(height) > max_area {
            return Err(RenderError::SurfaceTooLarge {
                width,
                height,
                max_area,
            });
        }

        Ok(RenderFrame {
            mode,
            width,
            height,
            scale,
            antialiasing: mode.antialiasing(),
            pass,
        })
    }
}
