//! [Console Standard](https://console.spec.whatwg.org/)
//!
//! Every logging method funnels into one [`logger`], which forwards to
//! `tracing` under the `blink::console` target. The embedder's subscriber
//! decides where script output ends up.

use boa_engine::{
    Context, JsResult, JsString, JsValue, NativeFunction, js_string, object::ObjectInitializer,
    property::Attribute,
};

/// "logLevel" of [§ 2.1 Logger](https://console.spec.whatwg.org/#logger).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogLevel {
    Log,
    Info,
    Debug,
    Trace,
    Warn,
    Error,
    Assert,
}

/// Method name and the level it logs at.
const METHODS: [(&str, LogLevel); 6] = [
    ("log", LogLevel::Log),
    ("info", LogLevel::Info),
    ("debug", LogLevel::Debug),
    ("trace", LogLevel::Trace),
    ("warn", LogLevel::Warn),
    ("error", LogLevel::Error),
];

/// Register `console` on the context.
///
/// [§ 1.1 Logging](https://console.spec.whatwg.org/#logging)
///
/// # Not Yet Implemented
///
/// Counting, grouping and timing (§ 1.2 - § 1.4).
pub fn register_console(context: &mut Context) -> JsResult<()> {
    let console = {
        let mut console = ObjectInitializer::new(context);
        for (name, level) in METHODS {
            let _ = console.function(
                NativeFunction::from_copy_closure(move |_this, args, context| {
                    logger(level, args, context)
                }),
                JsString::from(name),
                0,
            );
        }
        let _ = console.function(
            NativeFunction::from_copy_closure(console_assert),
            js_string!("assert"),
            2,
        );
        console.build()
    };

    context.register_global_property(js_string!("console"), console, Attribute::all())
}

/// [§ 1.1.1 assert(condition, ...data)](https://console.spec.whatwg.org/#assert)
///
/// "If condition is true, return." Otherwise the message "Assertion
/// failed" is prepended to data.
fn console_assert(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    if args.first().is_some_and(JsValue::to_boolean) {
        return Ok(JsValue::undefined());
    }
    let mut data = vec![JsValue::from(js_string!("Assertion failed:"))];
    data.extend(args.iter().skip(1).cloned());
    logger(LogLevel::Assert, &data, context)
}

/// [§ 2.1 Logger(logLevel, args)](https://console.spec.whatwg.org/#logger)
fn logger(level: LogLevel, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    // "If args is empty, return."
    if args.is_empty() {
        return Ok(JsValue::undefined());
    }
    let output = format_args(args, context)?;
    match level {
        LogLevel::Debug | LogLevel::Trace => {
            tracing::debug!(target: "blink::console", level = ?level, "{output}");
        }
        LogLevel::Log | LogLevel::Info => tracing::info!(target: "blink::console", "{output}"),
        LogLevel::Warn => tracing::warn!(target: "blink::console", "{output}"),
        LogLevel::Error | LogLevel::Assert => {
            tracing::error!(target: "blink::console", level = ?level, "{output}");
        }
    }
    Ok(JsValue::undefined())
}

/// [§ 2.2 Formatter](https://console.spec.whatwg.org/#formatter)
///
/// No format specifiers; arguments are stringified and space-joined.
fn format_args(args: &[JsValue], context: &mut Context) -> JsResult<String> {
    let mut parts = Vec::with_capacity(args.len());
    for arg in args {
        parts.push(arg.to_string(context)?.to_std_string_escaped());
    }
    Ok(parts.join(" "))
}
