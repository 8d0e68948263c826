//! Blink CLI
//!
//! Loads one document into a headless content host, runs any extra
//! scripts, and prints the resulting content state and merged metrics.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use blink_browser::js::ScriptResult;
use blink_browser::{
    ContentHost, ContentState, EngineConfig, Engines, Frame, LoadOutcome, LocalLoader,
    RequestLoader,
};
use blink_common::{Metrics, RequestDescriptor, scheme_of};
use clap::Parser;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

/// Blink: headless content host diagnostics
#[derive(Parser, Debug)]
#[command(name = "blink")]
#[command(author, version, about, long_about = None)]
#[command(after_help = r#"EXAMPLES:
    # Load a file and print its layout and metrics
    blink ./index.html

    # Inline markup, one extra script, JSON output
    blink --html '<h1>Test</h1>' --eval 'document.title' --json

    # Performance mode, narrow viewport, no scripts
    blink --mode performance --width 320 --no-js ./index.html
"#)]
struct Cli {
    /// Path to an HTML file, or an about:, data: or file: URL
    #[arg(value_name = "FILE|URL", required_unless_present = "html")]
    path: Option<String>,

    /// Load this markup instead of a file
    #[arg(long, value_name = "HTML", conflicts_with = "path")]
    html: Option<String>,

    /// Evaluate a script after the load (repeatable)
    #[arg(long = "eval", value_name = "SCRIPT")]
    scripts: Vec<String>,

    /// Render mode: normal, performance or compatibility
    #[arg(long, value_name = "MODE")]
    mode: Option<String>,

    /// Viewport width
    #[arg(long, default_value = "800")]
    width: f32,

    /// Viewport height
    #[arg(long, default_value = "600")]
    height: f32,

    /// Do not run scripts
    #[arg(long)]
    no_js: bool,

    /// Do not bind localStorage
    #[arg(long)]
    no_storage: bool,

    /// Fail the load after this many milliseconds
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Print machine-readable JSON instead of text
    #[arg(long)]
    json: bool,

    /// Read engine configuration from a JSON file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the parsed DOM tree
    #[arg(long)]
    dom: bool,

    /// Turn on extended instrumentation (features.* and timing.* metrics)
    #[arg(long)]
    features: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = engine_config(&cli)?;
    let (markup, base) = read_input(&cli)?;

    let engines = Engines::initialize(&config).context("failed to start engines")?;
    let frame = Frame::new(0.0, 0.0, cli.width, cli.height);
    let mut host = ContentHost::new(frame, config.host, engines)?;
    if let Some(mode) = &cli.mode {
        host.set_blink_rendering_mode_named(mode)?;
    }
    if cli.features {
        host.enable_blink_features();
    }

    let handle = host.load_markup(&markup, base.as_deref());
    host.run_until_idle();
    let outcome = handle.try_outcome().context("load did not finish")?;

    let results = Rc::new(RefCell::new(Vec::new()));
    for script in &cli.scripts {
        let sink = Rc::clone(&results);
        let source = script.clone();
        host.evaluate_javascript(script, move |result| {
            sink.borrow_mut().push((source, result));
        });
    }
    host.run_until_idle();
    let results = results.take();
    let metrics = host.get_blink_performance_metrics();

    if cli.json {
        print_json(&outcome, &results, &metrics)?;
    } else {
        if cli.dom {
            print_dom(&markup);
        }
        print_outcome(&outcome);
        print_scripts(&results);
        print_metrics(&metrics);
    }

    if let LoadOutcome::Failed(err) = outcome {
        bail!("load failed: {err}");
    }
    Ok(())
}

/// Engine configuration from `--config`, with flags applied on top.
fn engine_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read '{}'", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("invalid configuration in '{}'", path.display()))?
        }
        None => EngineConfig::default(),
    };
    if cli.no_js {
        config.host.enable_javascript = false;
    }
    if cli.no_storage {
        config.host.enable_dom_storage = false;
    }
    if cli.timeout_ms.is_some() {
        config.host.load_timeout_ms = cli.timeout_ms;
    }
    Ok(config)
}

/// Markup to load and the base URI it came from.
fn read_input(cli: &Cli) -> Result<(String, Option<String>)> {
    if let Some(html) = &cli.html {
        return Ok((html.clone(), None));
    }
    let Some(path) = &cli.path else {
        bail!("a file path, URL, or --html is required");
    };
    if scheme_of(path).is_some() {
        let content = LocalLoader.load(&RequestDescriptor::get(path.as_str()))?;
        return Ok((content.markup, Some(content.base_url)));
    }
    let markup =
        fs::read_to_string(path).with_context(|| format!("failed to read '{path}'"))?;
    Ok((markup, Some(file_url(Path::new(path)))))
}

fn file_url(path: &Path) -> String {
    let absolute = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", absolute.display())
}

fn print_json(
    outcome: &LoadOutcome,
    results: &[(String, ScriptResult)],
    metrics: &Metrics,
) -> Result<()> {
    let outcome = match outcome {
        LoadOutcome::Completed(state) => serde_json::json!({
            "status": "completed",
            "state": state,
        }),
        LoadOutcome::Failed(err) => serde_json::json!({
            "status": "failed",
            "error": err,
        }),
        LoadOutcome::Cancelled => serde_json::json!({ "status": "cancelled" }),
    };
    let scripts: Vec<_> = results
        .iter()
        .map(|(source, result)| match result {
            Ok(value) => serde_json::json!({ "script": source, "value": value.to_json() }),
            Err(err) => serde_json::json!({ "script": source, "error": err }),
        })
        .collect();
    let report = serde_json::json!({
        "load": outcome,
        "scripts": scripts,
        "metrics": metrics,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_dom(markup: &str) {
    println!("{}", "=== DOM Tree ===".bold());
    match blink_html::parse_document(markup) {
        Ok(parsed) => print!("{}", blink_html::dump_tree(&parsed.dom, parsed.dom.root())),
        Err(err) => println!("{}", format!("unparsable: {err}").red()),
    }
    println!();
}

fn print_outcome(outcome: &LoadOutcome) {
    println!("{}", "=== Load ===".bold());
    match outcome {
        LoadOutcome::Completed(state) => print_state(state),
        LoadOutcome::Failed(err) => println!("{} {err}", "failed:".red()),
        LoadOutcome::Cancelled => println!("{}", "cancelled".yellow()),
    }
}

fn print_state(state: &ContentState) {
    println!("{} generation {}", "completed:".green(), state.generation);
    if let Some(title) = &state.title {
        println!("  title:        {title}");
    }
    println!(
        "  size:         {}x{}",
        state.layout.size.width, state.layout.size.height
    );
    match (&state.frame, &state.render_error) {
        (Some(frame), _) => println!(
            "  frame:        {}x{} @{} ({}, pass {})",
            frame.width, frame.height, frame.scale, frame.mode, frame.pass
        ),
        (None, Some(err)) => println!("  {} {err}", "render error:".red()),
        (None, None) => {}
    }
    println!("  scripts:      {}", state.script_count);
    println!("  relayout:     {}", state.relayout);
    println!("  parse issues: {}", state.parse_issues);
    for err in &state.script_errors {
        println!("  {} {err}", "script error:".red());
    }
}

fn print_scripts(results: &[(String, ScriptResult)]) {
    if results.is_empty() {
        return;
    }
    println!("\n{}", "=== Scripts ===".bold());
    for (source, result) in results {
        match result {
            Ok(value) => println!("  {} {} {value}", source.dimmed(), "=>".green()),
            Err(err) => println!("  {} {} {err}", source.dimmed(), "!!".red()),
        }
    }
}

fn print_metrics(metrics: &Metrics) {
    println!("\n{}", "=== Metrics ===".bold());
    for (key, value) in metrics {
        println!("  {key:<32} {value}");
    }
}
