use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::BytesMut;
use log::debug;
use pingora::upstreams::peer::HttpPeer;
use pingora_core::connectors::http::Connector;
use pingora_http::RequestHeader;
use validator::Validate;

use crate::{
    config::bootstrap::Bootstrap,
    core::{
        ClusterManager, ClusterManagerFactory, ErrorContext, FetchError, FetchResult,
        RemoteResponse,
    },
};

/// Builds [`PingoraClusterManager`]s that share one pingora connector.
///
/// Cluster managers are throwaway, the connector and its connection pool are
/// not, so connections survive the cluster that opened them.
pub struct PingoraClusterManagerFactory {
    connector: Arc<Connector>,
    keepalive: Duration,
}

impl PingoraClusterManagerFactory {
    pub fn new(keepalive: Duration) -> Self {
        Self {
            connector: Arc::new(Connector::new(None)),
            keepalive,
        }
    }

    /// Validate `bootstrap` and turn every static host into an `HttpPeer`.
    pub fn build(&self, bootstrap: &Bootstrap) -> FetchResult<PingoraClusterManager> {
        bootstrap
            .validate()
            .map_err(|e| FetchError::Configuration(format!("invalid bootstrap: {e}")))?;

        let clusters = bootstrap
            .static_resources
            .clusters
            .iter()
            .map(|cluster| {
                let (tls, sni) = match &cluster.tls {
                    Some(tls) => (true, tls.sni.clone()),
                    None => (false, String::new()),
                };
                let peers = cluster
                    .socket_addrs()
                    .map(|addr| {
                        let mut peer = HttpPeer::new(addr.to_string(), tls, sni.clone());
                        peer.options.connection_timeout = Some(cluster.connect_timeout());
                        peer
                    })
                    .collect();
                (cluster.name.clone(), peers)
            })
            .collect();

        Ok(PingoraClusterManager {
            clusters,
            connector: self.connector.clone(),
            keepalive: self.keepalive,
        })
    }
}

impl ClusterManagerFactory for PingoraClusterManagerFactory {
    fn cluster_manager_from_bootstrap(
        &self,
        bootstrap: &Bootstrap,
    ) -> FetchResult<Arc<dyn ClusterManager>> {
        Ok(Arc::new(self.build(bootstrap)?))
    }
}

/// Static clusters served over a pingora HTTP connector.
pub struct PingoraClusterManager {
    clusters: HashMap<String, Vec<HttpPeer>>,
    connector: Arc<Connector>,
    keepalive: Duration,
}

impl PingoraClusterManager {
    pub fn peers(&self, cluster: &str) -> Option<&[HttpPeer]> {
        self.clusters.get(cluster).map(|p| p.as_slice())
    }
}

#[async_trait]
impl ClusterManager for PingoraClusterManager {
    async fn send(&self, cluster: &str, request: RequestHeader) -> FetchResult<RemoteResponse> {
        // load balancing is out of scope, a static cluster here has one host
        let peer = self
            .peers(cluster)
            .and_then(|peers| peers.first())
            .ok_or_else(|| FetchError::ClusterNotFound(cluster.to_string()))?;

        let (mut session, reused) = self.connector.get_http_session(peer).await?;
        debug!(
            "Sending {} {} to cluster {} ({}, reused: {})",
            request.method, request.uri, cluster, peer._address, reused
        );

        session.write_request_header(Box::new(request)).await?;
        session.finish_request_body().await?;
        session
            .read_response_header()
            .await
            .with_context("reading response header")?;

        let (status, headers) = match session.response_header() {
            Some(header) => (header.status, header.headers.clone()),
            None => {
                return Err(FetchError::Upstream(format!(
                    "no response header from {}",
                    peer._address
                )))
            }
        };

        let mut body = BytesMut::new();
        while let Some(chunk) = session
            .read_response_body()
            .await
            .with_context("reading response body")?
        {
            body.extend_from_slice(&chunk);
        }

        self.connector
            .release_http_session(session, peer, Some(self.keepalive))
            .await;

        Ok(RemoteResponse {
            status,
            headers,
            body: body.freeze(),
        })
    }
}
