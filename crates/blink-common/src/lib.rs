//! Common utilities for the Blink engine layer.
//!
//! This crate provides shared infrastructure used by all engine components:
//! - **Metrics** - string-keyed diagnostic maps shared by every engine
//! - **Requests** - the descriptor handed to `load_request`
//! - **URLs** - base-identifier resolution and `data:` URL decoding
//! - **Warning System** - deduplicated warnings for unsupported features

pub mod data_url;
pub mod metrics;
pub mod request;
pub mod url;
pub mod warning;

pub use data_url::{DataUrl, DataUrlError};
pub use metrics::{MetricValue, Metrics};
pub use request::{Method, RequestDescriptor};
pub use url::{resolve_url, scheme_of};
