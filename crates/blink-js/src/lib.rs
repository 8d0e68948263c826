//! Script runtime for the Blink engine layer.
//!
//! Uses [Boa](https://boajs.dev/) as the JavaScript engine.
//!
//! A [`ScriptRuntime`] owns one script context. Boa contexts cannot leave
//! the thread that created them, so the context lives on a dedicated worker
//! thread and every request (evaluate, bind, batch) is a job on that
//! worker's queue. The queue is the execution lock: two evaluations never
//! overlap, and a batch runs its bindings and scripts without any other job
//! in between.
//!
//! # Example
//!
//! ```ignore
//! use blink_js::{ScriptRuntime, ScriptValue};
//!
//! let runtime = ScriptRuntime::new(Default::default())?;
//! assert_eq!(runtime.evaluate("1 + 1")?, ScriptValue::Number(2.0));
//! ```
//!
//! # Implemented
//!
//! - Evaluation with typed results ([`ScriptValue`]) and typed failures
//!   ([`ScriptError`])
//! - Host objects bound as globals ([`HostObject`])
//! - `console.log/info/debug/warn/error`
//! - Loop, recursion and source-length limits
//!
//! # Not Yet Implemented
//!
//! [§ 8.6 Timers](https://html.spec.whatwg.org/multipage/timers-and-user-prompts.html#timers)
//! - `setTimeout()` / `setInterval()`
//!
//! [§ 4.12.1.1 Processing model](https://html.spec.whatwg.org/multipage/scripting.html#script-processing-model)
//! - External and module scripts

mod error;
mod globals;
mod host;
mod value;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle, ThreadId};

use blink_common::Metrics;
use boa_engine::{Context, Source};
use serde::{Deserialize, Serialize};

pub use error::{RuntimeError, ScriptError, ScriptErrorKind, SourceLocation};
pub use host::{HostCallError, HostObject};
pub use value::{HostRef, ObjectRef, ScriptValue};

/// Result of evaluating one script.
pub type ScriptResult = Result<ScriptValue, ScriptError>;

/// Limits applied to the script context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Iterations any single loop may run before it is aborted.
    pub max_loop_iterations: u64,
    /// Maximum call depth.
    pub max_recursion_depth: usize,
    /// Longest accepted source, in bytes.
    pub max_script_length: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_loop_iterations: 10_000_000,
            max_recursion_depth: 400,
            max_script_length: 1 << 20,
        }
    }
}

/// Counters shared between the handle and the worker.
#[derive(Debug, Default)]
pub(crate) struct RuntimeStats {
    evaluations: AtomicU64,
    failures: AtomicU64,
    pub(crate) host_calls: AtomicU64,
}

type Reply<T> = Box<dyn FnOnce(T) + Send>;

/// A host object to bind before a batch runs.
pub type Binding = (String, Arc<dyn HostObject>);

enum Job {
    Evaluate {
        source: String,
        reply: Reply<ScriptResult>,
    },
    Batch {
        bindings: Vec<Binding>,
        scripts: Vec<String>,
        cancel: Option<Arc<AtomicBool>>,
        reply: Reply<Result<Vec<ScriptResult>, RuntimeError>>,
    },
    Bind {
        name: String,
        object: Arc<dyn HostObject>,
        reply: Reply<Result<HostRef, RuntimeError>>,
    },
    Unbind {
        name: String,
        reply: Reply<bool>,
    },
    BoundNames {
        reply: Reply<Vec<String>>,
    },
    Shutdown,
}

impl Job {
    /// Answer a job the worker will never see.
    fn reject(self) {
        match self {
            Self::Evaluate { reply, .. } => reply(Err(ScriptError::shut_down())),
            Self::Batch { reply, .. } => reply(Err(RuntimeError::ShutDown)),
            Self::Bind { reply, .. } => reply(Err(RuntimeError::ShutDown)),
            Self::Unbind { reply, .. } => reply(false),
            Self::BoundNames { reply } => reply(Vec::new()),
            Self::Shutdown => {}
        }
    }
}

/// One script context on its own worker thread.
///
/// [§ 8.1.6 JavaScript execution context](https://html.spec.whatwg.org/multipage/webappapis.html)
///
/// Cheap to share behind an `Arc`; every method may be called from any
/// thread.
pub struct ScriptRuntime {
    jobs: mpsc::Sender<Job>,
    worker: Option<JoinHandle<()>>,
    worker_id: ThreadId,
    stats: Arc<RuntimeStats>,
    config: RuntimeConfig,
}

impl ScriptRuntime {
    /// Start a worker with a fresh context and the built-in globals.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Spawn`] if the worker thread cannot be started.
    pub fn new(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let (jobs, queue) = mpsc::channel();
        let stats = Arc::new(RuntimeStats::default());
        let worker = {
            let config = config.clone();
            let stats = Arc::clone(&stats);
            thread::Builder::new()
                .name("blink-script".to_string())
                .spawn(move || Worker::new(config, stats).run(&queue))
                .map_err(|err| RuntimeError::Spawn(err.to_string()))?
        };
        Ok(Self {
            jobs,
            worker_id: worker.thread().id(),
            worker: Some(worker),
            stats,
            config,
        })
    }

    /// Evaluate `source` and wait for the result.
    ///
    /// # Errors
    ///
    /// A [`ScriptError`] for syntax errors, uncaught exceptions, exceeded
    /// limits, or a stopped runtime.
    pub fn evaluate(&self, source: &str) -> ScriptResult {
        let source = source.to_string();
        self.request(|reply| Job::Evaluate { source, reply })
            .unwrap_or_else(|| Err(ScriptError::shut_down()))
    }

    /// Queue `source` and hand the result to `callback` on the worker
    /// thread. The callback runs exactly once, with an `Internal` error if
    /// the runtime has stopped.
    pub fn evaluate_with<F>(&self, source: &str, callback: F)
    where
        F: FnOnce(ScriptResult) + Send + 'static,
    {
        self.submit(Job::Evaluate {
            source: source.to_string(),
            reply: Box::new(callback),
        });
    }

    /// Bind `object` as the global `name`, replacing any earlier binding.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::InvalidArgument`] if `name` is empty, reserved or not
    /// a JavaScript identifier.
    pub fn register_host_object(
        &self,
        name: &str,
        object: Arc<dyn HostObject>,
    ) -> Result<HostRef, RuntimeError> {
        validate_binding_name(name)?;
        let name = name.to_string();
        self.request(|reply| Job::Bind {
            name,
            object,
            reply,
        })
        .unwrap_or(Err(RuntimeError::ShutDown))
    }

    /// Remove the global `name`. Returns whether it was bound.
    #[must_use]
    pub fn unregister_host_object(&self, name: &str) -> bool {
        let name = name.to_string();
        self.request(|reply| Job::Unbind { name, reply })
            .unwrap_or(false)
    }

    /// Names of all bound host objects, sorted.
    #[must_use]
    pub fn bound_names(&self) -> Vec<String> {
        self.request(|reply| Job::BoundNames { reply })
            .unwrap_or_default()
    }

    /// Bind every object in `bindings`, then run `scripts` in order, as one
    /// job. Per-script results line up with `scripts`; a failing script
    /// does not stop the ones after it.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::InvalidArgument`] for a bad binding name (nothing is
    /// run), or [`RuntimeError::ShutDown`].
    pub fn evaluate_batch(
        &self,
        bindings: Vec<Binding>,
        scripts: Vec<String>,
    ) -> Result<Vec<ScriptResult>, RuntimeError> {
        for (name, _) in &bindings {
            validate_binding_name(name)?;
        }
        self.request(|reply| Job::Batch {
            bindings,
            scripts,
            cancel: None,
            reply,
        })
        .unwrap_or(Err(RuntimeError::ShutDown))
    }

    /// Like [`evaluate_batch`](Self::evaluate_batch), but scripts not yet
    /// started when `cancel` is set fail with
    /// [`ScriptErrorKind::Cancelled`] instead of running.
    ///
    /// # Errors
    ///
    /// See [`evaluate_batch`](Self::evaluate_batch).
    pub fn evaluate_batch_cancellable(
        &self,
        bindings: Vec<Binding>,
        scripts: Vec<String>,
        cancel: Arc<AtomicBool>,
    ) -> Result<Vec<ScriptResult>, RuntimeError> {
        for (name, _) in &bindings {
            validate_binding_name(name)?;
        }
        self.request(|reply| Job::Batch {
            bindings,
            scripts,
            cancel: Some(cancel),
            reply,
        })
        .unwrap_or(Err(RuntimeError::ShutDown))
    }

    /// `evaluations`, `failures` and `host_calls` since construction.
    #[must_use]
    pub fn stats(&self) -> Metrics {
        let mut stats = Metrics::new();
        stats.insert("evaluations", self.stats.evaluations.load(Ordering::Relaxed));
        stats.insert("failures", self.stats.failures.load(Ordering::Relaxed));
        stats.insert("host_calls", self.stats.host_calls.load(Ordering::Relaxed));
        stats
    }

    /// Limits the context was created with.
    #[must_use]
    pub const fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    fn submit(&self, job: Job) {
        if let Err(mpsc::SendError(job)) = self.jobs.send(job) {
            job.reject();
        }
    }

    /// Send a job and block for its reply. `None` if the worker is gone.
    fn request<T, F>(&self, make: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(Reply<T>) -> Job,
    {
        let (tx, rx) = mpsc::channel();
        let job = make(Box::new(move |value| {
            let _ = tx.send(value);
        }));
        self.jobs.send(job).ok()?;
        rx.recv().ok()
    }
}

impl Drop for ScriptRuntime {
    fn drop(&mut self) {
        let _ = self.jobs.send(Job::Shutdown);
        // The last handle can be dropped by a reply callback running on the
        // worker itself; joining there would wait forever.
        let on_worker = thread::current().id() == self.worker_id;
        match self.worker.take() {
            Some(worker) if !on_worker => {
                let _ = worker.join();
            }
            _ => {}
        }
    }
}

/// [§ 13.1.1 Static Semantics: Early Errors](https://tc39.es/ecma262/#sec-identifier-names)
///
/// Binding names must be plain identifiers so they can be spliced into
/// generated script and read back as `name.method()`.
fn validate_binding_name(name: &str) -> Result<(), RuntimeError> {
    const RESERVED: &[&str] = &[
        "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete",
        "do", "else", "export", "extends", "false", "finally", "for", "function", "if", "import",
        "in", "instanceof", "new", "null", "return", "super", "switch", "this", "throw", "true",
        "try", "typeof", "var", "void", "while", "with", "let", "static", "yield", "await",
        "undefined", "globalThis", "console",
    ];
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !RESERVED.contains(&name)
        && !name.starts_with("__blink")
        && name != "__hostHandle";
    if valid {
        Ok(())
    } else {
        Err(RuntimeError::InvalidArgument(name.to_string()))
    }
}

/// State owned by the worker thread.
struct Worker {
    context: Context,
    config: RuntimeConfig,
    stats: Arc<RuntimeStats>,
    /// Set if the context failed to initialize; every job then fails.
    broken: Option<String>,
}

impl Worker {
    fn new(config: RuntimeConfig, stats: Arc<RuntimeStats>) -> Self {
        let mut context = Context::default();
        let limits = context.runtime_limits_mut();
        limits.set_loop_iteration_limit(config.max_loop_iterations);
        limits.set_recursion_limit(config.max_recursion_depth);

        let broken = globals::register_globals(&mut context)
            .and_then(|()| host::install(&mut context, Arc::clone(&stats)))
            .err()
            .map(|err| {
                tracing::error!(%err, "script context failed to initialize");
                err.to_string()
            });

        Self {
            context,
            config,
            stats,
            broken,
        }
    }

    fn run(mut self, queue: &mpsc::Receiver<Job>) {
        tracing::debug!("script worker started");
        while let Ok(job) = queue.recv() {
            match job {
                Job::Evaluate { source, reply } => reply(self.evaluate(&source)),
                Job::Batch {
                    bindings,
                    scripts,
                    cancel,
                    reply,
                } => reply(self.batch(bindings, &scripts, cancel.as_deref())),
                Job::Bind {
                    name,
                    object,
                    reply,
                } => reply(self.bind(&name, object)),
                Job::Unbind { name, reply } => {
                    reply(host::unbind(&mut self.context, &name).unwrap_or(false));
                }
                Job::BoundNames { reply } => reply(host::bound_names()),
                Job::Shutdown => break,
            }
        }
        host::clear();
        tracing::debug!("script worker stopped");
    }

    fn evaluate(&mut self, source: &str) -> ScriptResult {
        let _ = self.stats.evaluations.fetch_add(1, Ordering::Relaxed);
        let result = self.evaluate_inner(source);
        if let Err(err) = &result {
            let _ = self.stats.failures.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(kind = %err.kind, message = %err.message, "script failed");
        }
        result
    }

    fn evaluate_inner(&mut self, source: &str) -> ScriptResult {
        if let Some(reason) = &self.broken {
            return Err(ScriptError::new(ScriptErrorKind::Internal, reason.clone()));
        }
        if source.len() > self.config.max_script_length {
            return Err(ScriptError::new(
                ScriptErrorKind::Limit,
                format!(
                    "script of {} bytes exceeds the {} byte limit",
                    source.len(),
                    self.config.max_script_length
                ),
            ));
        }

        let outcome = self.context.eval(Source::from_bytes(source));
        // Settle promise reactions queued by the script.
        let _ = self.context.run_jobs();
        match outcome {
            Ok(value) => Ok(value::from_js(&value, &mut self.context)),
            Err(err) => Err(ScriptError::from_js(&err, &mut self.context)),
        }
    }

    fn bind(&mut self, name: &str, object: Arc<dyn HostObject>) -> Result<HostRef, RuntimeError> {
        host::bind(&mut self.context, name, object).map_err(|err| {
            tracing::warn!(name, %err, "host binding failed");
            RuntimeError::InvalidArgument(name.to_string())
        })
    }

    fn batch(
        &mut self,
        bindings: Vec<Binding>,
        scripts: &[String],
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<ScriptResult>, RuntimeError> {
        for (name, object) in bindings {
            let _ = self.bind(&name, object)?;
        }
        let results = scripts
            .iter()
            .map(|source| {
                if cancel.is_some_and(|flag| flag.load(Ordering::Acquire)) {
                    Err(ScriptError::new(
                        ScriptErrorKind::Cancelled,
                        "batch cancelled before this script ran",
                    ))
                } else {
                    self.evaluate(source)
                }
            })
            .collect();
        Ok(results)
    }
}
