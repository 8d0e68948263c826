//! The load pipeline, run on a load worker thread:
//!
//! fetch → parse → layout → scripts → re-layout → render
//!
//! The cancel flag is checked between phases and handed to the script
//! batch, so a superseded or timed-out load stops at the next phase
//! boundary. A script that is already running finishes first; runtime
//! limits bound how long that takes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use blink_common::RequestDescriptor;
use blink_html::ParsedDocument;
use blink_js::{Binding, HostObject, ScriptError, ScriptErrorKind};
use blink_layout::{Constraints, LayoutResult};

use crate::bindings::{DocumentObject, NavigatorObject, StorageObject};
use crate::engines::Engines;
use crate::error::LoadError;
use crate::loader::RequestLoader;
use crate::state::{ContentSource, ContentState, PhaseTimings, millis};

/// What to load.
pub(crate) enum LoadInput {
    Markup { markup: String, base: Option<String> },
    Request(RequestDescriptor),
}

/// Session settings snapshotted when the load starts.
pub(crate) struct LoadSettings {
    pub enable_javascript: bool,
    pub enable_dom_storage: bool,
    pub user_agent: String,
    pub width: f32,
}

pub(crate) struct LoadJob {
    pub generation: u64,
    pub input: LoadInput,
    pub settings: LoadSettings,
    pub engines: Engines,
    pub loader: Arc<dyn RequestLoader>,
    pub storage: Arc<StorageObject>,
    pub cancel: Arc<AtomicBool>,
}

impl LoadJob {
    fn check_cancelled(&self) -> Result<(), LoadError> {
        if self.cancel.load(Ordering::Acquire) {
            Err(LoadError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn bindings(&self, document: &Arc<DocumentObject>) -> Vec<Binding> {
        let navigator: Arc<dyn HostObject> = Arc::new(NavigatorObject::new(
            self.settings.user_agent.clone(),
            self.settings.enable_dom_storage,
        ));
        let document: Arc<dyn HostObject> = Arc::clone(document) as Arc<dyn HostObject>;
        let mut bindings: Vec<Binding> = vec![
            ("document".to_string(), document),
            ("navigator".to_string(), navigator),
        ];
        if self.settings.enable_dom_storage {
            bindings.push((
                "localStorage".to_string(),
                Arc::clone(&self.storage) as Arc<dyn HostObject>,
            ));
        }
        bindings
    }
}

/// Run `job` to completion or to the first fatal error.
pub(crate) fn run(job: &LoadJob) -> Result<ContentState, LoadError> {
    let started = Instant::now();
    let mut timings = PhaseTimings::default();
    job.check_cancelled()?;

    // STEP 1: Fetch.
    let (markup, source) = match &job.input {
        LoadInput::Markup { markup, base } => (
            markup.clone(),
            ContentSource::Markup {
                source: markup.clone(),
                base: base.clone(),
            },
        ),
        LoadInput::Request(request) => {
            let content = job.loader.load(request)?;
            (
                content.markup,
                ContentSource::Url {
                    url: request.url.clone(),
                },
            )
        }
    };
    timings.fetch_ms = millis(started.elapsed());
    job.check_cancelled()?;

    // STEP 2: Parse and lay out.
    let phase = Instant::now();
    let parsed = blink_html::parse_document(&markup)?;
    timings.parse_ms = millis(phase.elapsed());

    let constraints = Constraints::width(job.settings.width);
    let phase = Instant::now();
    let mut layout = job
        .engines
        .layout
        .compute_layout_for_document(&parsed, constraints)?;
    timings.layout_ms = millis(phase.elapsed());
    let mut title = parsed.dom.title();
    let mut parse_issues = parsed.issues.len();
    job.check_cancelled()?;

    // STEP 3: Run embedded scripts as one batch.
    let scripts = if job.settings.enable_javascript {
        blink_html::extract_inline_scripts(&parsed.dom)
    } else {
        Vec::new()
    };
    let script_count = scripts.len();
    let document = Arc::new(DocumentObject::new(markup, source.document_url()));
    let mut script_errors = Vec::new();
    if !scripts.is_empty() {
        let phase = Instant::now();
        // Globals outlive loads; storage bound by an earlier load must not
        // leak into one that has it turned off.
        if !job.settings.enable_dom_storage {
            let _ = job.engines.script.unregister_host_object("localStorage");
        }
        match job.engines.script.evaluate_batch_cancellable(
            job.bindings(&document),
            scripts,
            Arc::clone(&job.cancel),
        ) {
            Ok(results) => script_errors.extend(results.into_iter().filter_map(Result::err)),
            Err(err) => {
                script_errors.push(ScriptError::new(ScriptErrorKind::Internal, err.to_string()));
            }
        }
        timings.script_ms = millis(phase.elapsed());
    }
    job.check_cancelled()?;

    // STEP 4: Lay out again if a script rewrote the document.
    let mut relayout = false;
    if let Some(rewritten) = document.take_rewritten() {
        let phase = Instant::now();
        let outcome = relayout_rewritten(job, &rewritten, constraints, &mut script_errors)?;
        if let Some((reparsed, result)) = outcome {
            layout = result;
            title = reparsed.dom.title();
            parse_issues = reparsed.issues.len();
            relayout = true;
        }
        timings.relayout_ms = millis(phase.elapsed());
    }

    job.check_cancelled()?;

    // STEP 5: Render. A failed pass leaves the layout in place.
    let phase = Instant::now();
    let (frame, render_error) = match job.engines.render.render(&layout) {
        Ok(frame) => (Some(frame), None),
        Err(err) => {
            tracing::warn!(generation = job.generation, %err, "render pass failed");
            (None, Some(err.to_string()))
        }
    };
    timings.render_ms = millis(phase.elapsed());
    timings.total_ms = millis(started.elapsed());

    tracing::debug!(
        generation = job.generation,
        script_count,
        script_errors = script_errors.len(),
        relayout,
        rendered = frame.is_some(),
        "load pipeline finished"
    );
    Ok(ContentState {
        generation: job.generation,
        source,
        title,
        layout,
        frame,
        render_error,
        script_count,
        script_errors,
        relayout,
        parse_issues,
        timings,
    })
}

/// Parse and lay out markup rewritten by scripts. Markup that no longer
/// parses is a script error; the first layout is kept.
fn relayout_rewritten(
    job: &LoadJob,
    rewritten: &str,
    constraints: Constraints,
    script_errors: &mut Vec<ScriptError>,
) -> Result<Option<(ParsedDocument, LayoutResult)>, LoadError> {
    match blink_html::parse_document(rewritten) {
        Ok(reparsed) => {
            let layout = job
                .engines
                .layout
                .compute_layout_for_document(&reparsed, constraints)?;
            Ok(Some((reparsed, layout)))
        }
        Err(err) => {
            tracing::debug!(generation = job.generation, %err, "rewritten document does not parse");
            script_errors.push(ScriptError::new(
                ScriptErrorKind::Runtime,
                format!("document was rewritten into unparsable markup: {err}"),
            ));
            Ok(None)
        }
    }
}
