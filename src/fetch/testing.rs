//! Test doubles for the engine capabilities and the caller side of a fetch.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use pingora_http::RequestHeader;

use crate::{
    config::{self, bootstrap::Bootstrap, DnsLookupFamily},
    core::{
        AddressResolver, AsyncFetch, ClusterManager, ClusterManagerFactory, FetchError,
        FetchResult, MessageHandler, RemoteResponse, ResponseHeaders,
    },
    engine::{resolver::host_and_port, EventLoop, ProxyEngine},
};

use super::adapter::EngineFetch;

pub fn text_response(body: &'static str) -> RemoteResponse {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    RemoteResponse {
        status: StatusCode::OK,
        headers,
        body: Bytes::from_static(body.as_bytes()),
    }
}

/// What the caller of a fetch observed.
#[derive(Debug, Default)]
pub struct FetchRecord {
    pub response_headers: ResponseHeaders,
    pub extra_response_headers: ResponseHeaders,
    pub body: Vec<u8>,
    pub writes: usize,
    pub done_calls: Vec<bool>,
    pub write_after_done: bool,
}

pub struct RecordingFetch {
    request_headers: HeaderMap,
    response_headers: ResponseHeaders,
    extra_response_headers: ResponseHeaders,
    record: Arc<Mutex<FetchRecord>>,
}

impl RecordingFetch {
    pub fn new(request_headers: HeaderMap) -> (Self, Arc<Mutex<FetchRecord>>) {
        let record = Arc::new(Mutex::new(FetchRecord::default()));
        let fetch = Self {
            request_headers,
            response_headers: ResponseHeaders::new(),
            extra_response_headers: ResponseHeaders::new(),
            record: record.clone(),
        };
        (fetch, record)
    }
}

impl AsyncFetch for RecordingFetch {
    fn request_headers(&self) -> &HeaderMap {
        &self.request_headers
    }

    fn response_headers(&mut self) -> &mut ResponseHeaders {
        &mut self.response_headers
    }

    fn extra_response_headers(&mut self) -> &mut ResponseHeaders {
        &mut self.extra_response_headers
    }

    fn write(&mut self, data: &[u8], _handler: &dyn MessageHandler) -> bool {
        let mut record = self.record.lock().unwrap();
        if !record.done_calls.is_empty() {
            record.write_after_done = true;
        }
        record.body.extend_from_slice(data);
        record.writes += 1;
        true
    }

    fn done(&mut self, success: bool) {
        let mut record = self.record.lock().unwrap();
        record.response_headers = self.response_headers.clone();
        record.extra_response_headers = self.extra_response_headers.clone();
        record.done_calls.push(success);
    }
}

#[derive(Default)]
pub struct RecordingHandler {
    messages: Mutex<Vec<String>>,
}

impl RecordingHandler {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl MessageHandler for RecordingHandler {
    fn message(&self, level: log::Level, msg: &str) {
        self.messages.lock().unwrap().push(format!("{level}: {msg}"));
    }
}

/// Resolves from a fixed host table.
#[derive(Default)]
pub struct StaticResolver {
    entries: Mutex<HashMap<String, SocketAddr>>,
    calls: AtomicUsize,
}

impl StaticResolver {
    pub fn insert(&self, host: &str, addr: SocketAddr) {
        self.entries.lock().unwrap().insert(host.to_string(), addr);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AddressResolver for StaticResolver {
    async fn resolve(&self, uri: &Uri, _family: DnsLookupFamily) -> FetchResult<SocketAddr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (host, _) = host_and_port(uri)?;
        self.entries
            .lock()
            .unwrap()
            .get(&host)
            .copied()
            .ok_or_else(|| FetchError::DnsResolution(format!("no address for {host}")))
    }
}

/// A request as seen by a [`CannedClusterManager`].
#[derive(Clone, Debug)]
pub struct SentRequest {
    pub cluster: String,
    pub method: Method,
    pub path: String,
    pub host: Option<String>,
    pub user_agent: Option<String>,
}

/// Answers every request with the same response or error.
pub struct CannedClusterManager {
    clusters: Vec<String>,
    response: Result<RemoteResponse, String>,
    requests: Arc<Mutex<Vec<SentRequest>>>,
}

impl CannedClusterManager {
    pub fn new(cluster: &str, response: FetchResult<RemoteResponse>) -> Self {
        Self {
            clusters: vec![cluster.to_string()],
            response: response.map_err(|e| e.to_string()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Vec<SentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClusterManager for CannedClusterManager {
    async fn send(&self, cluster: &str, request: RequestHeader) -> FetchResult<RemoteResponse> {
        if !self.clusters.iter().any(|c| c == cluster) {
            return Err(FetchError::ClusterNotFound(cluster.to_string()));
        }

        let header_str = |name: header::HeaderName| {
            request
                .headers
                .get(name)
                .and_then(|v: &HeaderValue| v.to_str().ok())
                .map(|v| v.to_string())
        };
        self.requests.lock().unwrap().push(SentRequest {
            cluster: cluster.to_string(),
            method: request.method.clone(),
            path: request
                .uri
                .path_and_query()
                .map_or("/".to_string(), |pq| pq.to_string()),
            host: header_str(header::HOST),
            user_agent: header_str(header::USER_AGENT),
        });

        self.response.clone().map_err(FetchError::Upstream)
    }
}

/// Builds [`CannedClusterManager`]s and keeps every bootstrap it was given.
#[derive(Default)]
pub struct CannedClusterManagerFactory {
    response: Mutex<Option<Result<RemoteResponse, String>>>,
    bootstraps: Mutex<Vec<Bootstrap>>,
    requests: Arc<Mutex<Vec<SentRequest>>>,
}

impl CannedClusterManagerFactory {
    pub fn set_response(&self, response: FetchResult<RemoteResponse>) {
        *self.response.lock().unwrap() = Some(response.map_err(|e| e.to_string()));
    }

    pub fn bootstraps(&self) -> Vec<Bootstrap> {
        self.bootstraps.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<SentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ClusterManagerFactory for CannedClusterManagerFactory {
    fn cluster_manager_from_bootstrap(
        &self,
        bootstrap: &Bootstrap,
    ) -> FetchResult<Arc<dyn ClusterManager>> {
        self.bootstraps.lock().unwrap().push(bootstrap.clone());
        let response = self
            .response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err("no canned response".to_string()));
        Ok(Arc::new(CannedClusterManager {
            clusters: bootstrap
                .static_resources
                .clusters
                .iter()
                .map(|c| c.name.clone())
                .collect(),
            response,
            requests: self.requests.clone(),
        }))
    }
}

/// An event loop wired to the doubles above.
pub struct TestBed {
    pub event_loop: Arc<EventLoop>,
    pub resolver: Arc<StaticResolver>,
    pub factory: Arc<CannedClusterManagerFactory>,
    pub handler: Arc<RecordingHandler>,
    pub conf: config::Fetcher,
}

impl TestBed {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Self {
            event_loop: Arc::new(EventLoop::new().unwrap()),
            resolver: Arc::new(StaticResolver::default()),
            factory: Arc::new(CannedClusterManagerFactory::default()),
            handler: Arc::new(RecordingHandler::default()),
            conf: config::Fetcher::default(),
        }
    }

    pub fn with_host(self, host: &str, addr: &str) -> Self {
        self.resolver.insert(host, addr.parse().unwrap());
        self
    }

    pub fn with_response(self, response: FetchResult<RemoteResponse>) -> Self {
        self.factory.set_response(response);
        self
    }

    pub fn with_conf(mut self, conf: config::Fetcher) -> Self {
        self.conf = conf;
        self
    }

    pub fn engine(&self) -> ProxyEngine {
        ProxyEngine::new(
            self.event_loop.clone(),
            self.resolver.clone(),
            self.factory.clone(),
        )
    }

    pub fn fetch(&self, url: &str) -> (EngineFetch, Arc<Mutex<FetchRecord>>) {
        self.fetch_with_headers(url, HeaderMap::new())
    }

    pub fn fetch_with_headers(
        &self,
        url: &str,
        request_headers: HeaderMap,
    ) -> (EngineFetch, Arc<Mutex<FetchRecord>>) {
        let (async_fetch, record) = RecordingFetch::new(request_headers);
        let fetch = EngineFetch::new(
            url,
            Box::new(async_fetch),
            self.handler.clone(),
            self.engine(),
            self.conf.clone(),
        );
        (fetch, record)
    }
}
