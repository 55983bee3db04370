use std::sync::Arc;

use http::{header, HeaderValue, Method, Uri};
use log::debug;
use pingora_http::RequestHeader;

use crate::core::{ClusterManager, FetchError, FetchResult, RemoteResponse};

/// Target of a remote data fetch: the full uri and the cluster serving it.
#[derive(Clone, Debug)]
pub struct HttpUri {
    pub uri: Uri,
    pub cluster: String,
}

/// Receives the outcome of a [`RemoteDataFetcher`], exactly once.
pub trait RemoteDataFetcherCallback: Send {
    fn on_success(self: Box<Self>, response: RemoteResponse);

    fn on_failure(self: Box<Self>, reason: FetchError);
}

/// Issues one GET through a cluster manager and reports to a callback.
pub struct RemoteDataFetcher {
    cluster_manager: Arc<dyn ClusterManager>,
    http_uri: HttpUri,
    /// Never verified here; only carried to keep the fetcher interface
    /// shared with callers that do check content hashes.
    content_hash: Option<String>,
    user_agent: Option<HeaderValue>,
    callback: Box<dyn RemoteDataFetcherCallback>,
}

impl RemoteDataFetcher {
    pub fn new(
        cluster_manager: Arc<dyn ClusterManager>,
        http_uri: HttpUri,
        content_hash: Option<String>,
        callback: Box<dyn RemoteDataFetcherCallback>,
    ) -> Self {
        Self {
            cluster_manager,
            http_uri,
            content_hash,
            user_agent: None,
            callback,
        }
    }

    pub fn with_user_agent(mut self, user_agent: Option<HeaderValue>) -> Self {
        self.user_agent = user_agent;
        self
    }

    fn build_request(&self) -> FetchResult<RequestHeader> {
        let uri = &self.http_uri.uri;
        let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
        let mut request = RequestHeader::build(Method::GET, path.as_bytes(), None)?;

        let host = uri
            .host()
            .ok_or_else(|| FetchError::InvalidUrl(format!("missing host in {uri}")))?;
        let host = match uri.port_u16() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        request.insert_header(header::HOST, host)?;

        if let Some(ua) = &self.user_agent {
            request.insert_header(header::USER_AGENT, ua.clone())?;
        }
        Ok(request)
    }

    pub async fn fetch(self) {
        if self.content_hash.is_some() {
            debug!("Ignoring content hash for {}", self.http_uri.uri);
        }

        let request = match self.build_request() {
            Ok(request) => request,
            Err(e) => return self.callback.on_failure(e),
        };

        match self
            .cluster_manager
            .send(&self.http_uri.cluster, request)
            .await
        {
            Ok(response) => {
                debug!(
                    "Fetched {} with status {}, {} body bytes",
                    self.http_uri.uri,
                    response.status,
                    response.body.len()
                );
                self.callback.on_success(response)
            }
            Err(e) => self.callback.on_failure(e),
        }
    }
}
