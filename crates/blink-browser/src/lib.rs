//! Content host for the Blink engine layer.
//!
//! # Scope
//!
//! This crate provides:
//! - **Content hosting** - [`ContentHost`], one view over a load session
//! - **Engine bundle** - [`Engines`], the script runtime, layout engine and
//!   render controller shared by hosts
//! - **Load pipeline** - fetch, parse, layout, scripts, re-layout, render
//! - **Request loading** - [`RequestLoader`] and the built-in [`LocalLoader`]
//! - **Script bindings** - `document`, `navigator` and `localStorage`
//!
//! # Example
//!
//! ```no_run
//! use blink_browser::{ContentHost, Frame, HostConfig, LoadOutcome};
//!
//! let mut host = ContentHost::with_shared_engines(Frame::default(), HostConfig::default())?;
//! let handle = host.load_markup("<p>Hello</p>", None);
//! host.run_until_idle();
//! if let Some(LoadOutcome::Completed(state)) = handle.try_outcome() {
//!     println!("{}x{}", state.layout.size.width, state.layout.size.height);
//! }
//! # Ok::<(), blink_browser::HostError>(())
//! ```

pub mod bindings;
pub mod config;
pub mod engines;
pub mod error;
pub mod handle;
pub mod host;
pub mod loader;
mod pipeline;
pub mod state;

pub use blink_common as common;
pub use blink_dom as dom;
pub use blink_html as html;
pub use blink_js as js;
pub use blink_layout as layout;
pub use blink_render as render;

pub use bindings::{DocumentObject, NavigatorObject, StorageObject};
pub use config::{EngineConfig, HostConfig, default_user_agent};
pub use engines::Engines;
pub use error::{HostError, LoadError};
pub use handle::{LoadHandle, LoadOutcome};
pub use host::{ContentHost, Frame, ObserverId};
pub use loader::{LoadedContent, LocalLoader, RequestLoader};
pub use state::{ContentSource, ContentState, PhaseTimings};

/// Framework version as a number.
pub const BLINK_FRAMEWORK_VERSION_NUMBER: f64 = 1.0;

/// Framework version as a string.
pub const BLINK_FRAMEWORK_VERSION_STRING: &str = "1.0";
