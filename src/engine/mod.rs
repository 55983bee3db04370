//! The proxy engine the fetch adapter delegates to.
//!
//! [`ProxyEngine`] bundles the three capabilities a fetch needs. The
//! submodules provide the pingora/tokio/hickory implementations of them.

pub mod cluster;
pub mod dispatcher;
pub mod resolver;

use std::sync::Arc;

use crate::{
    config,
    core::{AddressResolver, ClusterManagerFactory, Dispatcher},
};

pub use cluster::{PingoraClusterManager, PingoraClusterManagerFactory};
pub use dispatcher::EventLoop;
pub use resolver::DnsResolver;

/// Externally owned facilities, shared by reference with every fetch.
#[derive(Clone)]
pub struct ProxyEngine {
    pub dispatcher: Arc<dyn Dispatcher>,
    pub resolver: Arc<dyn AddressResolver>,
    pub cluster_manager_factory: Arc<dyn ClusterManagerFactory>,
}

impl ProxyEngine {
    pub fn new(
        dispatcher: Arc<dyn Dispatcher>,
        resolver: Arc<dyn AddressResolver>,
        cluster_manager_factory: Arc<dyn ClusterManagerFactory>,
    ) -> Self {
        Self {
            dispatcher,
            resolver,
            cluster_manager_factory,
        }
    }

    /// System DNS and a pingora connector, driven by `dispatcher`.
    pub fn with_pingora(dispatcher: Arc<dyn Dispatcher>, conf: &config::Fetcher) -> Self {
        Self::new(
            dispatcher,
            Arc::new(DnsResolver::new()),
            Arc::new(PingoraClusterManagerFactory::new(conf.keepalive_timeout())),
        )
    }
}
