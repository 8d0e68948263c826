use std::fmt;
use std::sync::Arc;

use boa_engine::{Context, JsResult, JsString, JsValue, js_string};

use crate::host::{self, HostObject};

/// A script result or host-call argument.
///
/// `undefined` and `null` both map to [`ScriptValue::Null`].
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    /// `null` or `undefined`.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(f64),
    /// A string.
    String(String),
    /// An object.
    Object(ObjectRef),
}

/// An object reached from script.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectRef {
    /// A registered host object.
    Host(HostRef),
    /// A plain script object, captured as JSON when it left the engine.
    Script(serde_json::Value),
}

/// A host object binding: the global name it was bound under plus a
/// shared reference to the object.
#[derive(Clone)]
pub struct HostRef {
    pub(crate) name: String,
    pub(crate) id: u64,
    pub(crate) object: Arc<dyn HostObject>,
}

impl HostRef {
    /// Global name the object is bound under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Binding id; unique per registration within a runtime.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// The object itself.
    #[must_use]
    pub fn object(&self) -> &Arc<dyn HostObject> {
        &self.object
    }
}

impl PartialEq for HostRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for HostRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostRef")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("class", &self.object.class_name())
            .finish()
    }
}

impl ScriptValue {
    /// The number, if this is one.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The boolean, if this is one.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The string, if this is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The host binding, if this is a host object.
    #[must_use]
    pub const fn as_host(&self) -> Option<&HostRef> {
        match self {
            Self::Object(ObjectRef::Host(host)) => Some(host),
            _ => None,
        }
    }

    /// `null` or `undefined`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// JSON form. Host objects become `{"$host": name, "class": class}`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Object(ObjectRef::Script(json)) => json.clone(),
            Self::Object(ObjectRef::Host(host)) => serde_json::json!({
                "$host": host.name,
                "class": host.object.class_name(),
            }),
        }
    }
}

impl fmt::Display for ScriptValue {
    #[allow(clippy::cast_possible_truncation)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            // Integral numbers print without a fraction, like Number#toString.
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
            Self::Object(ObjectRef::Host(host)) => {
                write!(f, "[object {}]", host.object.class_name())
            }
            Self::Object(ObjectRef::Script(json)) => write!(f, "{json}"),
        }
    }
}

impl From<bool> for ScriptValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for ScriptValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<usize> for ScriptValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for ScriptValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl<T: Into<Self>> From<Option<T>> for ScriptValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Convert an engine value. Never fails: values JSON cannot carry
/// (functions, symbols) fall back to their display string.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn from_js(value: &JsValue, context: &mut Context) -> ScriptValue {
    if value.is_null_or_undefined() {
        return ScriptValue::Null;
    }
    if let Some(b) = value.as_boolean() {
        return ScriptValue::Bool(b);
    }
    if let Some(n) = value.as_number() {
        return ScriptValue::Number(n);
    }
    if let Some(s) = value.as_string() {
        return ScriptValue::String(s.to_std_string_escaped());
    }
    if let Some(object) = value.as_object() {
        let handle = object
            .get(js_string!("__hostHandle"), context)
            .ok()
            .and_then(|h| h.as_number());
        if let Some(host) = handle.and_then(|id| host::lookup(id as u64)) {
            return ScriptValue::Object(ObjectRef::Host(host));
        }
        let json = if object.is_callable() {
            None
        } else {
            value.to_json(context).ok()
        };
        if let Some(json) = json {
            return ScriptValue::Object(ObjectRef::Script(json));
        }
    }
    ScriptValue::String(value.display().to_string())
}

/// Convert a value into the engine.
pub(crate) fn to_js(value: &ScriptValue, context: &mut Context) -> JsResult<JsValue> {
    Ok(match value {
        ScriptValue::Null => JsValue::null(),
        ScriptValue::Bool(b) => JsValue::from(*b),
        ScriptValue::Number(n) => JsValue::from(*n),
        ScriptValue::String(s) => JsValue::from(JsString::from(s.as_str())),
        ScriptValue::Object(ObjectRef::Script(json)) => JsValue::from_json(json, context)?,
        ScriptValue::Object(ObjectRef::Host(host)) => host::wrapper_for(host, context)?,
    })
}
