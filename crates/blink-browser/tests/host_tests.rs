//! Integration tests for the content host.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use blink_browser::common::{MetricValue, Method, RequestDescriptor};
use blink_browser::js::{ScriptErrorKind, ScriptResult, ScriptValue};
use blink_browser::render::{RenderConfig, RenderMode};
use blink_browser::{
    BLINK_FRAMEWORK_VERSION_NUMBER, BLINK_FRAMEWORK_VERSION_STRING, ContentHost, ContentState,
    EngineConfig, Engines, Frame, HostConfig, HostError, LoadError, LoadOutcome, LoadedContent,
    RequestLoader,
};

/// Helper: fresh engines, so counters are not shared between tests.
fn engines() -> Engines {
    Engines::initialize(&EngineConfig::default()).expect("engines should start")
}

/// Helper: a host with default settings and a 320px wide frame.
fn host() -> ContentHost {
    host_with(HostConfig::default())
}

fn host_with(config: HostConfig) -> ContentHost {
    ContentHost::new(Frame::new(0.0, 0.0, 320.0, 480.0), config, engines()).unwrap()
}

/// Helper: load markup and drive the host until the load ends.
fn load(host: &mut ContentHost, markup: &str) -> LoadOutcome {
    let handle = host.load_markup(markup, None);
    host.run_until_idle();
    handle.try_outcome().expect("load should have ended")
}

fn completed(outcome: LoadOutcome) -> ContentState {
    match outcome {
        LoadOutcome::Completed(state) => state,
        other => panic!("expected a completed load, got {other:?}"),
    }
}

/// Helper: evaluate through the host and return the delivered result.
fn eval(host: &mut ContentHost, script: &str) -> ScriptResult {
    let slot = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&slot);
    host.evaluate_javascript(script, move |result| {
        *sink.borrow_mut() = Some(result);
    });
    host.run_until_idle();
    slot.borrow_mut().take().expect("callback should have fired")
}

/// A loader that takes its time.
struct SlowLoader(Duration);

impl RequestLoader for SlowLoader {
    fn load(&self, request: &RequestDescriptor) -> Result<LoadedContent, LoadError> {
        thread::sleep(self.0);
        Ok(LoadedContent {
            markup: "<p>slow</p>".to_string(),
            base_url: request.url.clone(),
            mime_type: "text/html".to_string(),
        })
    }
}

/// A loader that panics mid-fetch.
struct PanickingLoader;

impl RequestLoader for PanickingLoader {
    fn load(&self, _request: &RequestDescriptor) -> Result<LoadedContent, LoadError> {
        panic!("loader exploded");
    }
}

// ========== loads ==========

#[test]
fn test_load_markup_completes() {
    let mut host = host();
    let state = completed(load(&mut host, "<div>hi</div>"));
    assert_eq!(state.generation, 1);
    assert!(state.layout.size.width <= 320.0);
    assert!(state.layout.size.height >= 0.0);
    assert!(state.layout.metrics.get_int("node_count").unwrap() >= 1);
    assert_eq!(state.script_count, 0);
    assert!(state.script_errors.is_empty());
    assert!(!state.relayout);
    assert_eq!(host.content_state(), Some(&state));
    assert_eq!(host.content_identifier(), Some("<div>hi</div>"));
    assert!(host.is_idle());
}

#[test]
fn test_base_uri_is_the_content_identifier() {
    let mut host = host();
    let _ = host.load_markup("<p>x</p>", Some("https://example.com/page"));
    assert_eq!(host.content_identifier(), Some("https://example.com/page"));
    host.run_until_idle();
}

#[test]
fn test_title_is_reported() {
    let mut host = host();
    let state = completed(load(&mut host, "<title> My   Page </title><p>x</p>"));
    assert_eq!(state.title.as_deref(), Some("My Page"));
}

#[test]
fn test_parse_failure_fails_the_load() {
    let mut host = host();
    match load(&mut host, "<div") {
        LoadOutcome::Failed(LoadError::Parse(_)) => {}
        other => panic!("expected a parse failure, got {other:?}"),
    }
    assert!(host.content_state().is_none());
    let metrics = host.get_blink_performance_metrics();
    assert_eq!(metrics.get_int("session.loads_failed"), Some(1));
}

#[test]
fn test_second_load_supersedes_first() {
    let mut host = host();
    let notified = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&notified);
    let _ = host.add_observer(move |state| seen.borrow_mut().push(state.generation));

    let a = host.load_markup("<p>A</p>", None);
    let b = host.load_markup("<p>B</p>", None);
    assert_eq!(a.try_outcome(), Some(LoadOutcome::Cancelled));

    host.run_until_idle();
    // Let A's worker finish too; its completion must still be ignored.
    thread::sleep(Duration::from_millis(50));
    let _ = host.pump();

    assert_eq!(a.try_outcome(), Some(LoadOutcome::Cancelled));
    let state = completed(b.try_outcome().unwrap());
    assert_eq!(state.generation, 2);
    assert_eq!(*notified.borrow(), vec![2]);

    let metrics = host.get_blink_performance_metrics();
    assert_eq!(metrics.get_int("session.loads_started"), Some(2));
    assert_eq!(metrics.get_int("session.loads_cancelled"), Some(1));
    assert_eq!(metrics.get_int("session.loads_completed"), Some(1));
}

#[test]
fn test_stop_loading_cancels() {
    let mut host = host().with_loader(Arc::new(SlowLoader(Duration::from_millis(100))));
    let handle = host.load_request(RequestDescriptor::get("slow:page"));
    assert!(host.is_loading());
    host.stop_loading();
    assert!(!host.is_loading());
    assert!(handle.try_outcome().unwrap().is_cancelled());
}

#[test]
fn test_wait_from_another_thread() {
    let mut host = host();
    let handle = host.load_markup("<p>x</p>", None);
    let waiter = {
        let handle = handle.clone();
        thread::spawn(move || handle.wait())
    };
    host.run_until_idle();
    assert!(waiter.join().unwrap().state().is_some());
    assert!(
        handle
            .wait_timeout(Duration::from_millis(1))
            .unwrap()
            .state()
            .is_some()
    );
}

#[test]
fn test_load_timeout() {
    let mut host = host_with(HostConfig {
        load_timeout_ms: Some(20),
        ..HostConfig::default()
    })
    .with_loader(Arc::new(SlowLoader(Duration::from_millis(300))));
    let handle = host.load_request(RequestDescriptor::get("slow:page"));
    host.run_until_idle();

    assert_eq!(
        handle.try_outcome(),
        Some(LoadOutcome::Failed(LoadError::Timeout(20)))
    );
    let metrics = host.get_blink_performance_metrics();
    assert_eq!(metrics.get_int("session.loads_timed_out"), Some(1));
    assert!(host.content_state().is_none());
}

#[test]
fn test_run_until_idle_timeout_gives_up() {
    let mut host = host().with_loader(Arc::new(SlowLoader(Duration::from_millis(200))));
    let handle = host.load_request(RequestDescriptor::get("slow:page"));
    assert!(!host.run_until_idle_timeout(Duration::from_millis(10)));
    assert!(handle.try_outcome().is_none());
    assert!(host.run_until_idle_timeout(Duration::from_secs(10)));
    assert!(handle.try_outcome().unwrap().state().is_some());
}

#[test]
fn test_dropping_host_cancels_load() {
    let mut host = host().with_loader(Arc::new(SlowLoader(Duration::from_millis(50))));
    let handle = host.load_request(RequestDescriptor::get("slow:page"));
    drop(host);
    assert_eq!(handle.wait(), LoadOutcome::Cancelled);
}

#[test]
fn test_oversized_textarea_load_completes() {
    let mut host = host();
    let handle = host.load_markup(r#"<textarea cols="1e30" rows="1e30"></textarea>"#, None);
    assert!(host.run_until_idle_timeout(Duration::from_secs(10)));
    let state = completed(handle.try_outcome().expect("load should have ended"));
    assert!(state.layout.size.width <= 320.0);
}

#[test]
fn test_panicking_pipeline_fails_the_load() {
    let mut host = host().with_loader(Arc::new(PanickingLoader));
    let handle = host.load_request(RequestDescriptor::get("about:blank"));
    assert!(host.run_until_idle_timeout(Duration::from_secs(10)));
    match handle.try_outcome() {
        Some(LoadOutcome::Failed(LoadError::Internal(reason))) => {
            assert!(reason.contains("loader exploded"), "{reason}");
        }
        other => panic!("expected an internal failure, got {other:?}"),
    }
    assert!(!host.is_loading());
    let metrics = host.get_blink_performance_metrics();
    assert_eq!(metrics.get_int("session.loads_failed"), Some(1));

    // The session is still usable afterwards.
    let mut host = host.with_loader(Arc::new(SlowLoader(Duration::ZERO)));
    let state = completed({
        let handle = host.load_request(RequestDescriptor::get("about:blank"));
        host.run_until_idle();
        handle.try_outcome().expect("load should have ended")
    });
    assert_eq!(state.generation, 2);
}

#[test]
fn test_render_failure_keeps_layout() {
    let config = EngineConfig {
        render: RenderConfig {
            max_surface_area: 1.0,
            ..RenderConfig::default()
        },
        ..EngineConfig::default()
    };
    let engines = Engines::initialize(&config).unwrap();
    let mut host = ContentHost::new(Frame::default(), HostConfig::default(), engines).unwrap();
    let state = completed(load(
        &mut host,
        "<p>first</p><p>second</p><script>document.title = 'ran'</script>",
    ));
    assert!(state.frame.is_none());
    let reason = state.render_error.as_deref().expect("render error should be reported");
    assert!(reason.contains("exceeds"), "{reason}");
    assert!(state.layout.size.height > 0.0);
    assert_eq!(state.title.as_deref(), Some("ran"));
    assert_eq!(host.content_state(), Some(&state));

    let metrics = host.get_blink_performance_metrics();
    assert_eq!(metrics.get_int("render.errors"), Some(1));
    assert_eq!(metrics.get_int("render.frames_rendered"), Some(0));
    assert_eq!(metrics.get_int("session.loads_completed"), Some(1));
}

#[test]
fn test_superseded_load_renders_nothing() {
    let mut host = host().with_loader(Arc::new(SlowLoader(Duration::from_millis(200))));
    let first = host.load_request(RequestDescriptor::get("about:blank"));
    let second = host.load_markup("<p>b</p>", None);
    host.run_until_idle();
    // Let the superseded worker run to its end.
    thread::sleep(Duration::from_millis(400));
    let _ = host.pump();
    assert!(first.try_outcome().unwrap().is_cancelled());
    let _ = completed(second.try_outcome().unwrap());
    let metrics = host.get_blink_performance_metrics();
    assert_eq!(metrics.get_int("render.frames_rendered"), Some(1));
}

// ========== requests ==========

#[test]
fn test_data_url_request() {
    let mut host = host();
    let url = "data:text/html;base64,PHA+aGk8L3A+";
    let handle = host.load_request(RequestDescriptor::get(url));
    host.run_until_idle();
    let state = completed(handle.try_outcome().unwrap());
    assert_eq!(state.source.identifier(), url);
    assert_eq!(state.layout.metrics.get_int("element_count"), Some(1));
    assert_eq!(host.content_identifier(), Some(url));
}

#[test]
fn test_about_blank_request() {
    let mut host = host();
    let handle = host.load_request(RequestDescriptor::get("about:blank"));
    host.run_until_idle();
    let state = completed(handle.try_outcome().unwrap());
    assert!(state.layout.size.height.abs() < f32::EPSILON);
}

#[test]
fn test_unsupported_scheme_is_network_error() {
    let mut host = host();
    let handle = host.load_request(RequestDescriptor::get("https://example.com/"));
    host.run_until_idle();
    assert!(matches!(
        handle.try_outcome(),
        Some(LoadOutcome::Failed(LoadError::Network(_)))
    ));
}

#[test]
fn test_invalid_requests() {
    let mut host = host();
    for request in [
        RequestDescriptor::get(""),
        RequestDescriptor::get("relative/path.html"),
        RequestDescriptor::get("data:text/html,x").with_method(Method::Post),
    ] {
        let handle = host.load_request(request);
        host.run_until_idle();
        assert!(
            matches!(
                handle.try_outcome(),
                Some(LoadOutcome::Failed(LoadError::InvalidRequest(_)))
            ),
            "{:?}",
            handle.try_outcome()
        );
    }
}

// ========== scripts during loads ==========

#[test]
fn test_script_error_keeps_layout() {
    let mut host = host();
    let state = completed(load(
        &mut host,
        "<div>hello world</div><script>missingFunction()</script><script>var ok = 1;</script>",
    ));
    assert_eq!(state.script_count, 2);
    assert_eq!(state.script_errors.len(), 1);
    assert_eq!(state.script_errors[0].kind, ScriptErrorKind::Runtime);
    assert!(state.layout.size.height > 0.0);
    assert_eq!(eval(&mut host, "ok"), Ok(ScriptValue::Number(1.0)));

    let metrics = host.get_blink_performance_metrics();
    assert_eq!(metrics.get_int("session.script_errors"), Some(1));
}

#[test]
fn test_document_write_triggers_relayout() {
    let mut plain = host();
    let before = completed(load(&mut plain, "<p>a</p>"));

    let mut host = host();
    let after = completed(load(
        &mut host,
        "<p>a</p><script>document.write('<p>more text</p>')</script>",
    ));
    assert!(after.relayout);
    assert!(after.layout.size.height > before.layout.size.height);
    assert_eq!(after.layout.metrics.get_int("element_count"), Some(3));
}

#[test]
fn test_script_sets_title() {
    let mut host = host();
    let state = completed(load(
        &mut host,
        "<title>Old</title><script>document.title = 'New'</script>",
    ));
    assert_eq!(state.title.as_deref(), Some("New"));
    assert!(state.relayout);
}

#[test]
fn test_document_queries() {
    let mut host = host();
    let state = completed(load(
        &mut host,
        concat!(
            "<ul><li>1</li><li>2</li></ul><span id='s'>found</span>",
            "<script>document.title = document.getElementCount('LI') + ':' + ",
            "document.getTextById('s') + ':' + document.URL</script>",
        ),
    ));
    assert_eq!(state.title.as_deref(), Some("2:found:about:blank"));
}

#[test]
fn test_unparsable_rewrite_is_a_script_error() {
    let mut host = host();
    let state = completed(load(
        &mut host,
        "<p>a</p><script>document.setContent('<div')</script>",
    ));
    assert!(!state.relayout);
    assert_eq!(state.script_errors.len(), 1);
    assert_eq!(state.layout.metrics.get_int("element_count"), Some(2));
}

#[test]
fn test_navigator_user_agent() {
    let mut host = host();
    host.set_user_agent("TestAgent/2.0");
    assert_eq!(host.user_agent(), "TestAgent/2.0");
    let state = completed(load(
        &mut host,
        "<script>document.title = navigator.userAgent</script>",
    ));
    assert_eq!(state.title.as_deref(), Some("TestAgent/2.0"));
}

#[test]
fn test_local_storage_persists_across_loads() {
    let mut host = host();
    let _ = completed(load(
        &mut host,
        "<script>localStorage.setItem('k', 'v')</script>",
    ));
    assert_eq!(host.storage().item("k").as_deref(), Some("v"));

    let state = completed(load(
        &mut host,
        "<script>document.title = localStorage.getItem('k') + localStorage.length</script>",
    ));
    assert_eq!(state.title.as_deref(), Some("v1"));
}

#[test]
fn test_dom_storage_disabled() {
    let mut host = host_with(HostConfig {
        enable_dom_storage: false,
        ..HostConfig::default()
    });
    let state = completed(load(
        &mut host,
        "<script>document.title = typeof localStorage</script>",
    ));
    assert_eq!(state.title.as_deref(), Some("undefined"));
    assert!(!host.enable_dom_storage());
}

#[test]
fn test_javascript_disabled() {
    let mut host = host_with(HostConfig {
        enable_javascript: false,
        ..HostConfig::default()
    });
    let state = completed(load(
        &mut host,
        "<title>Kept</title><script>document.title = 'Changed'</script>",
    ));
    assert_eq!(state.script_count, 0);
    assert_eq!(state.title.as_deref(), Some("Kept"));

    let err = eval(&mut host, "1+1").unwrap_err();
    assert_eq!(err.kind, ScriptErrorKind::Disabled);

    host.set_enable_javascript(true);
    assert_eq!(eval(&mut host, "1+1"), Ok(ScriptValue::Number(2.0)));
}

// ========== evaluate_javascript ==========

#[test]
fn test_evaluate_javascript() {
    let mut host = host();
    assert_eq!(eval(&mut host, "1+1"), Ok(ScriptValue::Number(2.0)));
    assert_eq!(
        eval(&mut host, "{{{").unwrap_err().kind,
        ScriptErrorKind::Syntax
    );
}

#[test]
fn test_callback_runs_on_pump_only() {
    let mut host = host();
    let fired = Rc::new(RefCell::new(0));
    let count = Rc::clone(&fired);
    host.evaluate_javascript("1", move |_| *count.borrow_mut() += 1);
    // Give the worker time to finish; nothing is delivered until pumped.
    thread::sleep(Duration::from_millis(50));
    assert_eq!(*fired.borrow(), 0);
    host.run_until_idle();
    assert_eq!(*fired.borrow(), 1);
    let _ = host.pump();
    assert_eq!(*fired.borrow(), 1);
}

#[test]
fn test_callback_never_fires_after_drop() {
    let mut host = host();
    let fired = Rc::new(RefCell::new(false));
    let flag = Rc::clone(&fired);
    host.evaluate_javascript("1+1", move |_| *flag.borrow_mut() = true);
    drop(host);
    thread::sleep(Duration::from_millis(50));
    assert!(!*fired.borrow());
}

#[test]
fn test_hosts_share_script_context() {
    let shared = engines();
    let mut first =
        ContentHost::new(Frame::default(), HostConfig::default(), shared.clone()).unwrap();
    let mut second = ContentHost::new(Frame::default(), HostConfig::default(), shared).unwrap();
    let _ = eval(&mut first, "var sharedValue = 7;");
    assert_eq!(eval(&mut second, "sharedValue"), Ok(ScriptValue::Number(7.0)));
}

// ========== observers ==========

#[test]
fn test_observers_can_be_removed() {
    let mut host = host();
    let calls = Rc::new(RefCell::new(0));
    let count = Rc::clone(&calls);
    let id = host.add_observer(move |_| *count.borrow_mut() += 1);

    let _ = load(&mut host, "<p>1</p>");
    assert!(host.remove_observer(id));
    assert!(!host.remove_observer(id));
    let _ = load(&mut host, "<p>2</p>");
    assert_eq!(*calls.borrow(), 1);
}

#[test]
fn test_observers_skip_failed_loads() {
    let mut host = host();
    let calls = Rc::new(RefCell::new(0));
    let count = Rc::clone(&calls);
    let _ = host.add_observer(move |_| *count.borrow_mut() += 1);
    let _ = load(&mut host, "<div");
    assert_eq!(*calls.borrow(), 0);
}

// ========== metrics and features ==========

#[test]
fn test_performance_metrics_are_namespaced() {
    let mut host = host();
    let _ = load(&mut host, "<div>hi</div><script>1</script>");
    let metrics = host.get_blink_performance_metrics();

    assert!(metrics.get_int("layout.node_count").unwrap() >= 1);
    assert_eq!(metrics.get_int("render.frames_rendered"), Some(1));
    assert_eq!(
        metrics.get("render.mode").and_then(MetricValue::as_text),
        Some("normal")
    );
    assert_eq!(metrics.get_int("script.evaluations"), Some(1));
    assert_eq!(metrics.get_int("session.loads_completed"), Some(1));
    assert_eq!(metrics.get_int("session.script_evaluations"), Some(1));
    assert_eq!(metrics.get_int("session.generation"), Some(1));
    assert!(!metrics.contains_key("features.enabled"));
    assert!(!metrics.contains_key("timing.total_ms"));
    assert!(metrics.iter().all(|(key, _)| key.contains('.')));
}

#[test]
fn test_enable_blink_features_is_idempotent() {
    let mut host = host();
    let _ = load(&mut host, "<p>x</p>");
    host.enable_blink_features();
    let once = host.get_blink_performance_metrics();
    host.enable_blink_features();
    let twice = host.get_blink_performance_metrics();

    assert!(host.blink_features_enabled());
    assert_eq!(once, twice);
    assert_eq!(once.get_int("features.enabled"), Some(1));
    assert_eq!(once.get_int("features.javascript"), Some(1));
    assert!(once.get_float("timing.total_ms").unwrap() >= 0.0);
    assert!(once.contains_key("timing.layout_ms"));
}

#[test]
fn test_metrics_serialize() {
    let mut host = host();
    let _ = load(&mut host, "<p>x</p>");
    let json = serde_json::to_value(host.get_blink_performance_metrics()).unwrap();
    assert_eq!(json["render.frames_rendered"], 1);
    let state = serde_json::to_value(host.content_state().unwrap()).unwrap();
    assert_eq!(state["source"]["type"], "markup");
    assert_eq!(state["frame"]["mode"], "normal");
}

// ========== rendering mode ==========

#[test]
fn test_rendering_mode_applies_to_next_load() {
    let mut host = host();
    host.set_blink_rendering_mode(RenderMode::Performance);
    assert_eq!(host.blink_rendering_mode(), RenderMode::Performance);
    let state = completed(load(&mut host, "<p>x</p>"));
    let frame = state.frame.expect("frame should be rendered");
    assert_eq!(frame.mode, RenderMode::Performance);
    assert!(!frame.antialiasing);

    host.set_blink_rendering_mode_named("compatibility").unwrap();
    assert_eq!(host.blink_rendering_mode(), RenderMode::Compatibility);
}

#[test]
fn test_unknown_rendering_mode_is_rejected() {
    let host = host();
    host.set_blink_rendering_mode(RenderMode::Compatibility);
    assert!(matches!(
        host.set_blink_rendering_mode_named("turbo"),
        Err(HostError::InvalidArgument(_))
    ));
    assert_eq!(host.blink_rendering_mode(), RenderMode::Compatibility);
}

// ========== properties ==========

#[test]
fn test_frame_validation() {
    let err = ContentHost::new(
        Frame::new(0.0, 0.0, -1.0, 10.0),
        HostConfig::default(),
        engines(),
    )
    .unwrap_err();
    assert!(matches!(err, HostError::InvalidArgument(_)));

    let mut host = host();
    assert!(host.set_frame(Frame::new(0.0, 0.0, f32::NAN, 1.0)).is_err());
    assert!((host.frame().width - 320.0).abs() < f32::EPSILON);

    host.set_frame(Frame::new(10.0, 10.0, 100.0, 100.0)).unwrap();
    let state = completed(load(&mut host, &"word ".repeat(100)));
    assert!(state.layout.size.width <= 100.0);
}

#[test]
fn test_default_settings() {
    let host = host();
    assert!(host.enable_javascript());
    assert!(host.enable_dom_storage());
    assert!(host.user_agent().contains(BLINK_FRAMEWORK_VERSION_STRING));
    assert_eq!(host.generation(), 0);
    assert!(host.content_identifier().is_none());
}

#[test]
fn test_version_constants() {
    assert!(BLINK_FRAMEWORK_VERSION_NUMBER >= 1.0);
    assert_eq!(
        BLINK_FRAMEWORK_VERSION_STRING.parse::<f64>().unwrap(),
        BLINK_FRAMEWORK_VERSION_NUMBER
    );
}

#[test]
fn test_shared_engines_are_shared() {
    let a = Engines::shared().unwrap();
    let b = Engines::shared().unwrap();
    assert!(Arc::ptr_eq(&a.script, &b.script));
    assert!(Arc::ptr_eq(&a.render, &b.render));
    let host = ContentHost::with_shared_engines(Frame::default(), HostConfig::default()).unwrap();
    assert!(Arc::ptr_eq(&host.engines().layout, &a.layout));
}

#[test]
fn test_config_from_partial_json() {
    let config: EngineConfig = serde_json::from_str(
        r#"{ "host": { "enable_javascript": false, "load_timeout_ms": 500 } }"#,
    )
    .unwrap();
    assert!(!config.host.enable_javascript);
    assert!(config.host.enable_dom_storage);
    assert_eq!(config.host.load_timeout(), Some(Duration::from_millis(500)));
    assert_eq!(config.layout, EngineConfig::default().layout);
}
