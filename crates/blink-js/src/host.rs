//! Host object bindings.
//!
//! A host object is Rust state exposed to script under a global name. The
//! engine only ever sees a frozen wrapper holding a numeric handle; every
//! method call and property access on the wrapper goes back through one of
//! three native functions, which look the handle up in this thread's
//! binding table.
//!
//! The table is thread-local because the Boa context is confined to the
//! runtime's worker thread; one worker means one table.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use boa_engine::{
    Context, JsNativeError, JsResult, JsString, JsValue, NativeFunction, Source, js_string,
};
use thiserror::Error;

use crate::RuntimeStats;
use crate::value::{self, HostRef, ScriptValue};

/// Rust state callable from script.
///
/// Implementations use interior mutability: script calls arrive on the
/// runtime's worker thread while the embedder may hold the same `Arc`.
pub trait HostObject: Send + Sync {
    /// Name reported as the wrapper's `Symbol.toStringTag`.
    fn class_name(&self) -> &str;

    /// Method names exposed on the wrapper.
    fn methods(&self) -> &[&str] {
        &[]
    }

    /// Property names exposed on the wrapper as accessors.
    fn property_names(&self) -> &[&str] {
        &[]
    }

    /// Read a property.
    fn get_property(&self, _name: &str) -> ScriptValue {
        ScriptValue::Null
    }

    /// Write a property.
    ///
    /// # Errors
    ///
    /// The default rejects every write.
    fn set_property(&self, name: &str, _value: ScriptValue) -> Result<(), HostCallError> {
        Err(HostCallError(format!(
            "{}.{name} is read-only",
            self.class_name()
        )))
    }

    /// Call a method.
    ///
    /// # Errors
    ///
    /// Returns a [`HostCallError`], thrown into script as a `TypeError`.
    fn invoke(&self, method: &str, args: &[ScriptValue]) -> Result<ScriptValue, HostCallError>;

    /// Snapshot of every property value.
    fn properties(&self) -> Vec<(String, ScriptValue)> {
        self.property_names()
            .iter()
            .map(|name| ((*name).to_string(), self.get_property(name)))
            .collect()
    }
}

/// Failure reported by a host object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HostCallError(pub String);

impl HostCallError {
    /// The standard error for a method the object does not have.
    #[must_use]
    pub fn unknown_method(class_name: &str, method: &str) -> Self {
        Self(format!("{class_name}.{method} is not a function"))
    }
}

#[derive(Default)]
struct HostTable {
    objects: HashMap<u64, HostRef>,
    names: HashMap<String, u64>,
    next_id: u64,
    stats: Option<Arc<RuntimeStats>>,
}

thread_local! {
    static HOSTS: RefCell<HostTable> = RefCell::new(HostTable::default());
}

/// Wrapper factory, installed once per context.
const BOOTSTRAP: &str = r#"
Object.defineProperty(globalThis, "__blinkMakeHost", {
    value: function (handle, className, methods, props) {
        const call = __blinkHostCall, get = __blinkHostGet, set = __blinkHostSet;
        const target = {};
        Object.defineProperty(target, "__hostHandle", { value: handle });
        Object.defineProperty(target, Symbol.toStringTag, { value: className });
        for (const m of methods) {
            Object.defineProperty(target, m, {
                value: function (...args) { return call(handle, m, ...args); },
            });
        }
        for (const p of props) {
            Object.defineProperty(target, p, {
                get: function () { return get(handle, p); },
                set: function (v) { set(handle, p, v); },
                enumerable: true,
            });
        }
        return Object.freeze(target);
    },
});
"#;

/// Register the native entry points and the wrapper factory.
pub(crate) fn install(context: &mut Context, stats: Arc<RuntimeStats>) -> JsResult<()> {
    HOSTS.with_borrow_mut(|table| table.stats = Some(stats));
    context.register_global_callable(
        js_string!("__blinkHostCall"),
        2,
        NativeFunction::from_copy_closure(host_call),
    )?;
    context.register_global_callable(
        js_string!("__blinkHostGet"),
        2,
        NativeFunction::from_copy_closure(host_get),
    )?;
    context.register_global_callable(
        js_string!("__blinkHostSet"),
        3,
        NativeFunction::from_copy_closure(host_set),
    )?;
    let _ = context.eval(Source::from_bytes(BOOTSTRAP))?;
    Ok(())
}

/// Bind `object` under `name`, replacing any previous binding, and expose
/// its wrapper as a global.
pub(crate) fn bind(
    context: &mut Context,
    name: &str,
    object: Arc<dyn HostObject>,
) -> JsResult<HostRef> {
    let host = HOSTS.with_borrow_mut(|table| {
        table.next_id += 1;
        let host = HostRef {
            name: name.to_string(),
            id: table.next_id,
            object,
        };
        if let Some(previous) = table.names.insert(name.to_string(), host.id) {
            let _ = table.objects.remove(&previous);
        }
        let _ = table.objects.insert(host.id, host.clone());
        host
    });

    let script = format!(
        "globalThis[{name}] = __blinkMakeHost({id}, {class}, {methods}, {props});",
        name = json_literal(name),
        id = host.id,
        class = json_literal(host.object.class_name()),
        methods = json_literal(host.object.methods()),
        props = json_literal(host.object.property_names()),
    );
    let _ = context.eval(Source::from_bytes(&script))?;
    tracing::debug!(name, id = host.id, class = host.object.class_name(), "host object bound");
    Ok(host)
}

/// Remove the binding for `name`. Returns whether one existed.
pub(crate) fn unbind(context: &mut Context, name: &str) -> JsResult<bool> {
    let removed = HOSTS.with_borrow_mut(|table| {
        table
            .names
            .remove(name)
            .and_then(|id| table.objects.remove(&id))
            .is_some()
    });
    if removed {
        let script = format!("delete globalThis[{}];", json_literal(name));
        let _ = context.eval(Source::from_bytes(&script))?;
    }
    Ok(removed)
}

/// Binding by handle.
pub(crate) fn lookup(id: u64) -> Option<HostRef> {
    HOSTS.with_borrow(|table| table.objects.get(&id).cloned())
}

/// Names currently bound, sorted.
pub(crate) fn bound_names() -> Vec<String> {
    let mut names: Vec<String> = HOSTS.with_borrow(|table| table.names.keys().cloned().collect());
    names.sort();
    names
}

/// Drop every binding; called when the worker stops.
pub(crate) fn clear() {
    HOSTS.with_borrow_mut(|table| *table = HostTable::default());
}

/// The live wrapper for a binding, or `null` if it has been replaced.
pub(crate) fn wrapper_for(host: &HostRef, context: &mut Context) -> JsResult<JsValue> {
    let current = HOSTS.with_borrow(|table| table.names.get(&host.name).copied());
    if current == Some(host.id) {
        context
            .global_object()
            .get(JsString::from(host.name.as_str()), context)
    } else {
        Ok(JsValue::null())
    }
}

fn record_host_call() {
    HOSTS.with_borrow(|table| {
        if let Some(stats) = &table.stats {
            let _ = stats.host_calls.fetch_add(1, Ordering::Relaxed);
        }
    });
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn host_from_args(args: &[JsValue]) -> JsResult<HostRef> {
    args.first()
        .and_then(JsValue::as_number)
        .and_then(|id| lookup(id as u64))
        .ok_or_else(|| {
            JsNativeError::reference()
                .with_message("host object is no longer bound")
                .into()
        })
}

fn string_arg(args: &[JsValue], index: usize) -> String {
    args.get(index)
        .and_then(JsValue::as_string)
        .map(JsString::to_std_string_escaped)
        .unwrap_or_default()
}

fn host_call(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let host = host_from_args(args)?;
    let method = string_arg(args, 1);
    let call_args: Vec<ScriptValue> = args
        .iter()
        .skip(2)
        .map(|arg| value::from_js(arg, context))
        .collect();
    record_host_call();
    let result = host
        .object
        .invoke(&method, &call_args)
        .map_err(|err| JsNativeError::typ().with_message(err.0))?;
    value::to_js(&result, context)
}

fn host_get(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let host = host_from_args(args)?;
    record_host_call();
    let result = host.object.get_property(&string_arg(args, 1));
    value::to_js(&result, context)
}

fn host_set(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let host = host_from_args(args)?;
    let new_value = args
        .get(2)
        .map_or(ScriptValue::Null, |v| value::from_js(v, context));
    record_host_call();
    host.object
        .set_property(&string_arg(args, 1), new_value)
        .map_err(|err| JsNativeError::typ().with_message(err.0))?;
    Ok(JsValue::undefined())
}

/// Names and lists spliced into generated script are emitted as JSON
/// literals, which are valid JavaScript expressions.
fn json_literal<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}
