//! Unified error handling for pingfetch
//!
//! Every failure a fetch can run into is mapped onto [`FetchError`] so that
//! the completion path has a single type to log and report.

use std::fmt;

/// Error types for the fetch pipeline
#[derive(Debug)]
pub enum FetchError {
    /// Configuration-related errors
    Configuration(String),

    /// The fetch URL could not be parsed or lacks a host
    InvalidUrl(String),

    /// DNS resolution failures
    DnsResolution(String),

    /// A request named a cluster the cluster manager does not know
    ClusterNotFound(String),

    /// The upstream exchange failed after a connection was obtained
    Upstream(String),

    /// Network and I/O errors
    Network(std::io::Error),

    /// Pingora framework errors
    Pingora(Box<pingora_error::Error>),

    /// The fetcher was shut down before the fetch could be scheduled
    ShutDown,

    /// The completion handle was dropped before the fetch was resolved
    Abandoned,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            FetchError::InvalidUrl(msg) => write!(f, "Invalid url: {msg}"),
            FetchError::DnsResolution(msg) => write!(f, "DNS resolution failed: {msg}"),
            FetchError::ClusterNotFound(name) => write!(f, "Cluster not found: {name}"),
            FetchError::Upstream(msg) => write!(f, "Upstream fetch failed: {msg}"),
            FetchError::Network(err) => write!(f, "Network error: {err}"),
            FetchError::Pingora(err) => write!(f, "Pingora error: {err}"),
            FetchError::ShutDown => write!(f, "Fetcher is shut down"),
            FetchError::Abandoned => write!(f, "Fetch abandoned before completion"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Network(err) => Some(err),
            FetchError::Pingora(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::Network(err)
    }
}

impl From<Box<pingora_error::Error>> for FetchError {
    fn from(err: Box<pingora_error::Error>) -> Self {
        FetchError::Pingora(err)
    }
}

impl From<pingora_error::Error> for FetchError {
    fn from(err: pingora_error::Error) -> Self {
        FetchError::Pingora(Box::new(err))
    }
}

/// Result type alias for fetch operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn with_context(self, context: &str) -> FetchResult<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: fmt::Display,
{
    fn with_context(self, context: &str) -> FetchResult<T> {
        self.map_err(|e| FetchError::Upstream(format!("{context}: {e}")))
    }
}
