//! The content host view.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use blink_common::{Metrics, RequestDescriptor};
use blink_js::{ScriptError, ScriptResult};
use blink_render::RenderMode;
use serde::{Deserialize, Serialize};

use crate::bindings::StorageObject;
use crate::config::HostConfig;
use crate::engines::Engines;
use crate::error::{HostError, LoadError};
use crate::handle::{LoadHandle, LoadOutcome, Slot};
use crate::loader::{LocalLoader, RequestLoader};
use crate::pipeline::{self, LoadInput, LoadJob, LoadSettings};
use crate::state::{ContentSource, ContentState, PhaseTimings};

/// Position and size of the host view. Width bounds layout; content
/// scrolls vertically.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl Frame {
    /// A frame at `(x, y)` of the given size.
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// # Errors
    ///
    /// [`HostError::InvalidArgument`] for a negative or non-finite size or
    /// a non-finite origin.
    pub fn validate(&self) -> Result<(), HostError> {
        let size_ok = [self.width, self.height]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0);
        if size_ok && self.x.is_finite() && self.y.is_finite() {
            Ok(())
        } else {
            Err(HostError::InvalidArgument(format!(
                "invalid frame {}x{} at ({}, {})",
                self.width, self.height, self.x, self.y
            )))
        }
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new(0.0, 0.0, 800.0, 600.0)
    }
}

/// Identifies an observer registered with [`ContentHost::add_observer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

enum Event {
    LoadFinished {
        generation: u64,
        result: Result<ContentState, LoadError>,
    },
    ScriptFinished {
        id: u64,
        result: ScriptResult,
    },
}

struct PendingLoad {
    generation: u64,
    cancel: Arc<AtomicBool>,
    slot: Arc<Slot>,
    deadline: Option<Instant>,
}

#[derive(Debug, Default)]
struct SessionCounters {
    loads_started: u64,
    loads_completed: u64,
    loads_cancelled: u64,
    loads_failed: u64,
    loads_timed_out: u64,
    script_evaluations: u64,
    script_errors: u64,
}

type Observer = Box<dyn FnMut(&ContentState)>;
type ScriptCallback = Box<dyn FnOnce(ScriptResult)>;

/// One content session: loads, script evaluation, metrics and render mode
/// behind a single view.
///
/// A host lives on its control thread. Loads run on worker threads and
/// script work on the runtime's worker; their results are delivered back
/// to the control thread only by [`pump`](Self::pump),
/// [`run_until_idle`](Self::run_until_idle) and
/// [`run_until_idle_timeout`](Self::run_until_idle_timeout).
pub struct ContentHost {
    frame: Frame,
    config: HostConfig,
    engines: Engines,
    loader: Arc<dyn RequestLoader>,
    storage: Arc<StorageObject>,

    generation: u64,
    pending: Option<PendingLoad>,
    content_identifier: Option<String>,
    content_state: Option<ContentState>,

    observers: Vec<(ObserverId, Observer)>,
    next_observer: u64,
    callbacks: HashMap<u64, ScriptCallback>,
    next_callback: u64,

    events_tx: Sender<Event>,
    events_rx: Receiver<Event>,

    counters: SessionCounters,
    features_enabled: bool,
    last_timings: Option<PhaseTimings>,
}

impl ContentHost {
    /// A host over `engines`.
    ///
    /// # Errors
    ///
    /// [`HostError::InvalidArgument`] for an invalid frame.
    pub fn new(frame: Frame, config: HostConfig, engines: Engines) -> Result<Self, HostError> {
        frame.validate()?;
        let (events_tx, events_rx) = mpsc::channel();
        tracing::debug!(?frame, javascript = config.enable_javascript, "content host created");
        Ok(Self {
            frame,
            config,
            engines,
            loader: Arc::new(LocalLoader),
            storage: Arc::new(StorageObject::new()),
            generation: 0,
            pending: None,
            content_identifier: None,
            content_state: None,
            observers: Vec::new(),
            next_observer: 0,
            callbacks: HashMap::new(),
            next_callback: 0,
            events_tx,
            events_rx,
            counters: SessionCounters::default(),
            features_enabled: false,
            last_timings: None,
        })
    }

    /// A host over the process-wide engine bundle.
    ///
    /// # Errors
    ///
    /// [`HostError::InvalidArgument`] for an invalid frame,
    /// [`HostError::Engine`] if the shared engines cannot be started.
    pub fn with_shared_engines(frame: Frame, config: HostConfig) -> Result<Self, HostError> {
        let engines = Engines::shared().map_err(|err| HostError::Engine(err.to_string()))?;
        Self::new(frame, config, engines)
    }

    /// Replace the loader used by [`load_request`](Self::load_request).
    #[must_use]
    pub fn with_loader(mut self, loader: Arc<dyn RequestLoader>) -> Self {
        self.loader = loader;
        self
    }

    // ========== loads ==========

    /// Load `markup`, resolving relative references against `base`.
    pub fn load_markup(&mut self, markup: &str, base: Option<&str>) -> LoadHandle {
        let source = ContentSource::Markup {
            source: markup.to_string(),
            base: base.map(str::to_string),
        };
        self.start_load(
            LoadInput::Markup {
                markup: markup.to_string(),
                base: base.map(str::to_string),
            },
            &source,
        )
    }

    /// Fetch `request` with the host's loader and load the response.
    pub fn load_request(&mut self, request: RequestDescriptor) -> LoadHandle {
        let source = ContentSource::Url {
            url: request.url.clone(),
        };
        self.start_load(LoadInput::Request(request), &source)
    }

    fn start_load(&mut self, input: LoadInput, source: &ContentSource) -> LoadHandle {
        self.cancel_pending();
        self.generation += 1;
        let generation = self.generation;
        self.counters.loads_started += 1;
        self.content_identifier = Some(source.identifier().to_string());
        // Unsupported-feature warnings repeat once per page.
        blink_common::warning::clear_warnings();

        let slot = Arc::new(Slot::default());
        let handle = LoadHandle::new(generation, Arc::clone(&slot));
        let cancel = Arc::new(AtomicBool::new(false));
        let job = LoadJob {
            generation,
            input,
            settings: LoadSettings {
                enable_javascript: self.config.enable_javascript,
                enable_dom_storage: self.config.enable_dom_storage,
                user_agent: self.config.user_agent.clone(),
                width: self.frame.width,
            },
            engines: self.engines.clone(),
            loader: Arc::clone(&self.loader),
            storage: Arc::clone(&self.storage),
            cancel: Arc::clone(&cancel),
        };

        let events = self.events_tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("blink-load-{generation}"))
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| pipeline::run(&job)))
                    .unwrap_or_else(|payload| {
                        let reason = panic_message(payload.as_ref());
                        tracing::error!(generation, %reason, "load pipeline panicked");
                        Err(LoadError::Internal(format!("load pipeline panicked: {reason}")))
                    });
                let _ = events.send(Event::LoadFinished { generation, result });
            });
        match spawned {
            Ok(_) => {
                tracing::debug!(generation, "load started");
                self.pending = Some(PendingLoad {
                    generation,
                    cancel,
                    slot,
                    deadline: self.config.load_timeout().map(|t| Instant::now() + t),
                });
            }
            Err(err) => {
                tracing::warn!(generation, %err, "failed to start load worker");
                self.counters.loads_failed += 1;
                let _ = slot.resolve(LoadOutcome::Failed(LoadError::Internal(format!(
                    "failed to start load worker: {err}"
                ))));
            }
        }
        handle
    }

    /// Cancel the in-flight load, if any; its handle resolves `Cancelled`.
    pub fn stop_loading(&mut self) {
        self.cancel_pending();
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel.store(true, Ordering::Release);
            self.counters.loads_cancelled += 1;
            let _ = pending.slot.resolve(LoadOutcome::Cancelled);
            tracing::debug!(generation = pending.generation, "load cancelled");
        }
    }

    /// Whether a load is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    // ========== script ==========

    /// Evaluate `script` in the shared script context. `callback` gets the
    /// result exactly once, on a later [`pump`](Self::pump), and never if
    /// the host is dropped first. With JavaScript disabled the result is a
    /// [`ScriptErrorKind::Disabled`](blink_js::ScriptErrorKind::Disabled)
    /// error.
    pub fn evaluate_javascript<F>(&mut self, script: &str, callback: F)
    where
        F: FnOnce(ScriptResult) + 'static,
    {
        self.next_callback += 1;
        let id = self.next_callback;
        let _ = self.callbacks.insert(id, Box::new(callback));

        if !self.config.enable_javascript {
            let _ = self.events_tx.send(Event::ScriptFinished {
                id,
                result: Err(ScriptError::disabled()),
            });
            return;
        }
        self.counters.script_evaluations += 1;
        let events = self.events_tx.clone();
        self.engines.script.evaluate_with(script, move |result| {
            let _ = events.send(Event::ScriptFinished { id, result });
        });
    }

    // ========== delivery ==========

    /// Deliver every completion that has arrived and enforce the load
    /// timeout. Returns the number of events delivered.
    pub fn pump(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            delivered += usize::from(self.dispatch(event));
        }
        self.enforce_deadline();
        delivered
    }

    /// Whether no load or script callback is outstanding.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending.is_none() && self.callbacks.is_empty()
    }

    /// Deliver completions until no load or script callback is
    /// outstanding.
    pub fn run_until_idle(&mut self) {
        let _ = self.run_until(None);
    }

    /// Like [`run_until_idle`](Self::run_until_idle), but give up after
    /// `timeout`. Returns whether the host became idle.
    pub fn run_until_idle_timeout(&mut self, timeout: Duration) -> bool {
        self.run_until(Some(Instant::now() + timeout))
    }

    fn run_until(&mut self, give_up: Option<Instant>) -> bool {
        loop {
            let _ = self.pump();
            if self.is_idle() {
                return true;
            }
            let now = Instant::now();
            let load_deadline = self.pending.as_ref().and_then(|p| p.deadline);
            let wake = [give_up, load_deadline].into_iter().flatten().min();
            if give_up.is_some_and(|g| now >= g) {
                return false;
            }
            let received = match wake {
                Some(at) => self
                    .events_rx
                    .recv_timeout(at.saturating_duration_since(now)),
                None => self
                    .events_rx
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(event) => {
                    let _ = self.dispatch(event);
                }
                Err(RecvTimeoutError::Timeout) => {}
                // The host holds a sender, so this cannot happen while it
                // is alive.
                Err(RecvTimeoutError::Disconnected) => return self.is_idle(),
            }
        }
    }

    /// Returns whether the event reached a live load or callback.
    fn dispatch(&mut self, event: Event) -> bool {
        match event {
            Event::LoadFinished { generation, result } => {
                let Some(pending) = self.pending.take_if(|p| p.generation == generation) else {
                    tracing::debug!(
                        generation,
                        current = self.generation,
                        "stale load completion discarded"
                    );
                    return false;
                };
                self.finish_load(&pending, result);
                true
            }
            Event::ScriptFinished { id, result } => {
                let Some(callback) = self.callbacks.remove(&id) else {
                    return false;
                };
                if result.is_err() {
                    self.counters.script_errors += 1;
                }
                callback(result);
                true
            }
        }
    }

    fn finish_load(&mut self, pending: &PendingLoad, result: Result<ContentState, LoadError>) {
        let outcome = match result {
            Ok(state) => {
                self.counters.loads_completed += 1;
                self.counters.script_evaluations += state.script_count as u64;
                self.counters.script_errors += state.script_errors.len() as u64;
                self.last_timings = Some(state.timings);
                tracing::info!(
                    generation = pending.generation,
                    width = state.layout.size.width,
                    height = state.layout.size.height,
                    script_errors = state.script_errors.len(),
                    "load completed"
                );
                for (_, observer) in &mut self.observers {
                    observer(&state);
                }
                self.content_state = Some(state.clone());
                LoadOutcome::Completed(state)
            }
            Err(LoadError::Cancelled) => {
                self.counters.loads_cancelled += 1;
                LoadOutcome::Cancelled
            }
            Err(err) => {
                tracing::warn!(generation = pending.generation, %err, "load failed");
                self.counters.loads_failed += 1;
                LoadOutcome::Failed(err)
            }
        };
        let _ = pending.slot.resolve(outcome);
    }

    fn enforce_deadline(&mut self) {
        let now = Instant::now();
        let Some(pending) = self
            .pending
            .take_if(|p| p.deadline.is_some_and(|deadline| now >= deadline))
        else {
            return;
        };
        pending.cancel.store(true, Ordering::Release);
        self.counters.loads_timed_out += 1;
        self.counters.loads_failed += 1;
        let timeout_ms = self.config.load_timeout_ms.unwrap_or_default();
        tracing::warn!(generation = pending.generation, timeout_ms, "load timed out");
        let _ = pending
            .slot
            .resolve(LoadOutcome::Failed(LoadError::Timeout(timeout_ms)));
    }

    // ========== observers ==========

    /// Call `observer` on the control thread after each completed load
    /// that was not superseded.
    pub fn add_observer<F>(&mut self, observer: F) -> ObserverId
    where
        F: FnMut(&ContentState) + 'static,
    {
        self.next_observer += 1;
        let id = ObserverId(self.next_observer);
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer. Returns whether it was registered.
    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer, _)| *observer != id);
        self.observers.len() != before
    }

    // ========== features and metrics ==========

    /// Turn on extended instrumentation: `features.*` and `timing.*`
    /// metrics. Calling it again has no effect.
    pub fn enable_blink_features(&mut self) {
        if self.features_enabled {
            return;
        }
        self.features_enabled = true;
        tracing::info!("extended instrumentation enabled");
    }

    /// Whether [`enable_blink_features`](Self::enable_blink_features) has
    /// been called.
    #[must_use]
    pub const fn blink_features_enabled(&self) -> bool {
        self.features_enabled
    }

    /// Set the render mode used from the next render pass.
    pub fn set_blink_rendering_mode(&self, mode: RenderMode) {
        self.engines.render.set_mode(mode);
    }

    /// Set the render mode by name.
    ///
    /// # Errors
    ///
    /// [`HostError::InvalidArgument`] for an unknown name; the mode is
    /// unchanged.
    pub fn set_blink_rendering_mode_named(&self, name: &str) -> Result<(), HostError> {
        self.engines
            .render
            .set_mode_named(name)
            .map_err(|err| HostError::InvalidArgument(err.to_string()))
    }

    /// Current render mode.
    #[must_use]
    pub fn blink_rendering_mode(&self) -> RenderMode {
        self.engines.render.mode()
    }

    /// Merged metrics: `layout.*`, `render.*`, `script.*`, `session.*`,
    /// plus `features.*` and `timing.*` once extended instrumentation is
    /// on.
    #[must_use]
    pub fn get_blink_performance_metrics(&self) -> Metrics {
        let mut metrics = Metrics::new();
        metrics.merge_namespaced("layout", &self.engines.layout.last_metrics());

        let mut render = self.engines.render.stats();
        render.insert("mode", self.engines.render.mode().to_string());
        metrics.merge_namespaced("render", &render);

        metrics.merge_namespaced("script", &self.engines.script.stats());
        metrics.merge_namespaced("session", &self.session_metrics());

        if self.features_enabled {
            let mut features = Metrics::new();
            features.insert("enabled", true);
            features.insert("javascript", self.config.enable_javascript);
            features.insert("dom_storage", self.config.enable_dom_storage);
            features.insert("layout_passes", self.engines.layout.pass_count());
            features.insert("storage_items", self.storage.len());
            features.insert("observers", self.observers.len());
            metrics.merge_namespaced("features", &features);
            if let Some(timings) = &self.last_timings {
                metrics.merge_namespaced("timing", &timings.to_metrics());
            }
        }
        metrics
    }

    fn session_metrics(&self) -> Metrics {
        let c = &self.counters;
        let mut session = Metrics::new();
        session.insert("generation", self.generation);
        session.insert("loads_started", c.loads_started);
        session.insert("loads_completed", c.loads_completed);
        session.insert("loads_cancelled", c.loads_cancelled);
        session.insert("loads_failed", c.loads_failed);
        session.insert("loads_timed_out", c.loads_timed_out);
        session.insert("script_evaluations", c.script_evaluations);
        session.insert("script_errors", c.script_errors);
        session
    }

    // ========== properties ==========

    /// `navigator.userAgent` for later loads.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.config.user_agent
    }

    /// Set the user agent reported by later loads.
    pub fn set_user_agent(&mut self, user_agent: impl Into<String>) {
        self.config.user_agent = user_agent.into();
    }

    /// Whether later loads run scripts.
    #[must_use]
    pub const fn enable_javascript(&self) -> bool {
        self.config.enable_javascript
    }

    /// Enable or disable scripts. Applies from the next load; a load in
    /// flight keeps the setting it started with.
    pub fn set_enable_javascript(&mut self, enabled: bool) {
        self.config.enable_javascript = enabled;
    }

    /// Whether later loads bind `localStorage`.
    #[must_use]
    pub const fn enable_dom_storage(&self) -> bool {
        self.config.enable_dom_storage
    }

    /// Enable or disable DOM storage from the next load.
    pub fn set_enable_dom_storage(&mut self, enabled: bool) {
        self.config.enable_dom_storage = enabled;
    }

    /// The session's `localStorage`.
    #[must_use]
    pub const fn storage(&self) -> &Arc<StorageObject> {
        &self.storage
    }

    /// The view frame.
    #[must_use]
    pub const fn frame(&self) -> Frame {
        self.frame
    }

    /// Move or resize the view. The new width applies from the next load.
    ///
    /// # Errors
    ///
    /// [`HostError::InvalidArgument`] for an invalid frame; the frame is
    /// unchanged.
    pub fn set_frame(&mut self, frame: Frame) -> Result<(), HostError> {
        frame.validate()?;
        self.frame = frame;
        Ok(())
    }

    /// URL, base URI, or raw markup of the most recently started load.
    #[must_use]
    pub fn content_identifier(&self) -> Option<&str> {
        self.content_identifier.as_deref()
    }

    /// State left by the most recent completed load.
    #[must_use]
    pub const fn content_state(&self) -> Option<&ContentState> {
        self.content_state.as_ref()
    }

    /// Generation of the most recently started load; 0 before any load.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Current session settings.
    #[must_use]
    pub const fn config(&self) -> &HostConfig {
        &self.config
    }

    /// The engines this host drives.
    #[must_use]
    pub const fn engines(&self) -> &Engines {
        &self.engines
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

impl Drop for ContentHost {
    fn drop(&mut self) {
        self.cancel_pending();
        // Pending script callbacks are dropped without being called.
        self.callbacks.clear();
    }
}

impl std::fmt::Debug for ContentHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentHost")
            .field("frame", &self.frame)
            .field("generation", &self.generation)
            .field("loading", &self.pending.is_some())
            .field("content_identifier", &self.content_identifier)
            .finish_non_exhaustive()
    }
}
