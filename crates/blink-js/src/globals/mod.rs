//! Script global objects.
//!
//! # Implemented
//!
//! - `console` - [Console Standard](https://console.spec.whatwg.org/)
//!
//! Everything else a page sees (`document`, `navigator`, `localStorage`)
//! is a host object bound by the embedder; see [`crate::HostObject`].

mod console;

use boa_engine::{Context, JsResult};

/// Register all built-in globals on a fresh context.
///
/// [§ 8.1.6.1 Realms and their counterparts](https://html.spec.whatwg.org/multipage/webappapis.html#realms-settings-objects-global-objects)
///
/// "A global object is a JavaScript object that is the global object for
/// a JavaScript realm."
pub fn register_globals(context: &mut Context) -> JsResult<()> {
    console::register_console(context)
}
