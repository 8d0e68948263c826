use boa_engine::{Context, JsError, JsNativeErrorKind};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;

/// Category of a script failure.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScriptErrorKind {
    /// The source did not parse.
    Syntax,
    /// An exception escaped the script.
    Runtime,
    /// A loop, recursion or source-length limit was hit.
    Limit,
    /// JavaScript is turned off for the session.
    Disabled,
    /// The script was skipped because its batch was cancelled.
    Cancelled,
    /// The runtime itself failed (worker gone, conversion fault).
    Internal,
}

/// Position in script source, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Line.
    pub line: u32,
    /// Column, when the engine reported one.
    pub column: Option<u32>,
}

/// A failed evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind} error: {message}")]
pub struct ScriptError {
    /// Category.
    pub kind: ScriptErrorKind,
    /// Engine message.
    pub message: String,
    /// Where in the source, if known.
    pub location: Option<SourceLocation>,
}

impl ScriptError {
    /// An error with no location.
    #[must_use]
    pub fn new(kind: ScriptErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
        }
    }

    /// JavaScript is disabled for the caller.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(ScriptErrorKind::Disabled, "JavaScript is disabled")
    }

    /// The runtime worker is no longer running.
    #[must_use]
    pub fn shut_down() -> Self {
        Self::new(ScriptErrorKind::Internal, "script runtime has shut down")
    }

    /// Convert an engine error, resolving thrown error objects to their
    /// native kind.
    pub(crate) fn from_js(err: &JsError, context: &mut Context) -> Self {
        let (kind, message) = match err.try_native(context) {
            Ok(native) => {
                let kind = match native.kind {
                    JsNativeErrorKind::Syntax => ScriptErrorKind::Syntax,
                    JsNativeErrorKind::RuntimeLimit => ScriptErrorKind::Limit,
                    _ => ScriptErrorKind::Runtime,
                };
                (kind, native.to_string())
            }
            // A thrown non-Error value, e.g. `throw 5`.
            Err(_) => (ScriptErrorKind::Runtime, format!("Uncaught {err}")),
        };
        let location = parse_location(&message);
        Self {
            kind,
            message,
            location,
        }
    }
}

/// Pull "line N, col M" out of an engine message.
fn parse_location(message: &str) -> Option<SourceLocation> {
    let after = &message[message.rfind("line ")? + "line ".len()..];
    let line = leading_number(after)?;
    let column = after
        .find("col")
        .map(|at| after[at..].trim_start_matches(|c: char| !c.is_ascii_digit()))
        .and_then(leading_number);
    Some(SourceLocation { line, column })
}

fn leading_number(s: &str) -> Option<u32> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s[..end].parse().ok()
}

/// Errors from runtime management calls (binding, shutdown).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// Host binding name is empty, reserved or not an identifier.
    #[error("invalid argument: '{0}' is not a valid binding name")]
    InvalidArgument(String),
    /// The worker thread has stopped.
    #[error("script runtime has shut down")]
    ShutDown,
    /// The worker thread could not be started.
    #[error("failed to start script worker: {0}")]
    Spawn(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_location() {
        assert_eq!(
            parse_location("SyntaxError: abrupt end at line 3, col 14"),
            Some(SourceLocation {
                line: 3,
                column: Some(14)
            })
        );
        assert_eq!(
            parse_location("unexpected token at line 7"),
            Some(SourceLocation {
                line: 7,
                column: None
            })
        );
        assert_eq!(parse_location("ReferenceError: x is not defined"), None);
    }
}
