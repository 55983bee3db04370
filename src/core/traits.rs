//! Core traits for pingfetch components
//!
//! The fetch adapter never talks to a concrete engine. It consumes the
//! capabilities below, which the engine module implements on top of
//! pingora/tokio/hickory and which tests replace with doubles.

use std::{net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use http::{HeaderMap, StatusCode, Uri};
use pingora_http::RequestHeader;

use crate::config::{bootstrap::Bootstrap, DnsLookupFamily};

use super::{error::FetchResult, headers::ResponseHeaders};

/// A unit of work posted onto a dispatcher.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// How far [`Dispatcher::run`] drives the loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunType {
    /// Run until no posted task and no in-flight future is left.
    Block,
    /// Run the tasks already posted, then return.
    NonBlock,
}

/// Event dispatch facility of the engine
pub trait Dispatcher: Send + Sync {
    /// Enqueue a task. Never runs it inline.
    fn post(&self, task: Task);

    /// Register I/O work that makes progress while the loop runs.
    fn spawn(&self, future: BoxFuture<'static, ()>);

    /// Drive the loop.
    fn run(&self, run_type: RunType);

    /// Stop the loop. Tasks posted afterwards, or still queued, are dropped.
    fn exit(&self);
}

/// Address resolution facility of the engine
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Resolve the host of `uri` to a single socket address.
    ///
    /// The port comes from the uri, or from its scheme when absent.
    async fn resolve(&self, uri: &Uri, family: DnsLookupFamily) -> FetchResult<SocketAddr>;
}

/// Builds cluster managers from declarative bootstrap descriptions
pub trait ClusterManagerFactory: Send + Sync {
    fn cluster_manager_from_bootstrap(
        &self,
        bootstrap: &Bootstrap,
    ) -> FetchResult<Arc<dyn ClusterManager>>;
}

/// The HTTP client side of a cluster manager
#[async_trait]
pub trait ClusterManager: Send + Sync {
    /// Send `request` to a host of `cluster` and read the whole response.
    async fn send(&self, cluster: &str, request: RequestHeader) -> FetchResult<RemoteResponse>;
}

/// A complete response delivered by a cluster manager.
#[derive(Clone, Debug)]
pub struct RemoteResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Diagnostic message sink handed in by the caller of a fetch
pub trait MessageHandler: Send + Sync {
    fn message(&self, level: log::Level, msg: &str);

    fn info(&self, msg: &str) {
        self.message(log::Level::Info, msg);
    }

    fn warning(&self, msg: &str) {
        self.message(log::Level::Warn, msg);
    }

    fn error(&self, msg: &str) {
        self.message(log::Level::Error, msg);
    }
}

/// The caller's side of a fetch: where the response ends up.
///
/// Implementations are driven by exactly one completion: headers are filled
/// in, the body is written, then `done` is called once.
pub trait AsyncFetch: Send {
    /// Headers of the request that triggered this fetch.
    fn request_headers(&self) -> &HeaderMap;

    fn response_headers(&mut self) -> &mut ResponseHeaders;

    /// Secondary header view kept in sync for some callers.
    fn extra_response_headers(&mut self) -> &mut ResponseHeaders;

    /// Append body bytes. Returns `false` if the sink rejected them.
    fn write(&mut self, data: &[u8], handler: &dyn MessageHandler) -> bool;

    fn done(&mut self, success: bool);
}
