//! Asynchronous URL fetching on top of a pingora based proxy engine.
//!
//! A fetch resolves its host, registers a single-host static cluster with the
//! engine and issues a GET through it. The response is streamed into the
//! caller's [`core::AsyncFetch`] on the engine's event loop.

pub mod config;
pub mod core;
pub mod engine;
pub mod fetch;
pub mod logging;
pub mod stats;
