//! Core abstractions for pingfetch
//!
//! This module holds the error type, the caller-side header model and the
//! capability traits through which the fetch adapter reaches the engine.

pub mod error;
pub mod headers;
pub mod traits;

// Re-export commonly used types
pub use error::{ErrorContext, FetchError, FetchResult};
pub use headers::{ResponseHeaders, X_ORIGINAL_CONTENT_LENGTH};
pub use traits::*;
