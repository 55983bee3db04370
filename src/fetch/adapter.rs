use std::sync::Arc;

use futures::FutureExt;
use http::{HeaderValue, Uri};
use log::{debug, trace};
use uuid::Uuid;

use crate::{
    config::{
        self,
        bootstrap::{Bootstrap, UpstreamTls},
    },
    core::{AsyncFetch, FetchError, FetchResult, MessageHandler, RunType},
    engine::{resolver::host_and_port, ProxyEngine},
    stats,
};

use super::{
    completion::FetchCompletion,
    remote::{HttpUri, RemoteDataFetcher},
    state::{FetchState, Lifecycle},
};

/// One outbound fetch routed through the proxy engine.
///
/// Each fetch registers its own single-host cluster; the engine's connector
/// pool below it is what gets reused.
pub struct EngineFetch {
    id: Uuid,
    url: String,
    async_fetch: Box<dyn AsyncFetch>,
    message_handler: Arc<dyn MessageHandler>,
    engine: ProxyEngine,
    conf: config::Fetcher,
    lifecycle: Arc<Lifecycle>,
}

impl EngineFetch {
    pub fn new(
        url: impl Into<String>,
        async_fetch: Box<dyn AsyncFetch>,
        message_handler: Arc<dyn MessageHandler>,
        engine: ProxyEngine,
        conf: config::Fetcher,
    ) -> Self {
        Self::with_id(
            Uuid::new_v4(),
            url,
            async_fetch,
            message_handler,
            engine,
            conf,
        )
    }

    pub fn with_id(
        id: Uuid,
        url: impl Into<String>,
        async_fetch: Box<dyn AsyncFetch>,
        message_handler: Arc<dyn MessageHandler>,
        engine: ProxyEngine,
        conf: config::Fetcher,
    ) -> Self {
        Self {
            id,
            url: url.into(),
            async_fetch,
            message_handler,
            engine,
            conf,
            lifecycle: Arc::new(Lifecycle::default()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> FetchState {
        self.lifecycle.state()
    }

    /// Observe the lifecycle after the fetch has been started.
    pub fn lifecycle(&self) -> Arc<Lifecycle> {
        self.lifecycle.clone()
    }

    pub fn init(&mut self) -> bool {
        true
    }

    /// Connection setup belongs to the engine.
    pub fn connect(&mut self) -> FetchResult<()> {
        Ok(())
    }

    /// Request setup belongs to the engine.
    pub fn init_request(&mut self) -> FetchResult<()> {
        Ok(())
    }

    /// User agent for the outgoing request, if one is configured.
    pub fn fix_user_agent(&self) -> Option<HeaderValue> {
        self.conf
            .user_agent
            .as_deref()
            .and_then(|ua| HeaderValue::from_str(ua).ok())
    }

    /// Post the fetch onto the engine's dispatcher and return.
    pub fn start(mut self) {
        if !self.lifecycle.begin() {
            // the caller's fetch is still owned here, so it has not been completed
            log::error!("Fetch {} of {} started twice", self.id, self.url);
            self.message_handler.error(&format!(
                "Fetch of {} failed: already started",
                self.url
            ));
            self.async_fetch.done(false);
            return;
        }
        stats::record_started();

        let user_agent = self.fix_user_agent();
        let Self {
            id,
            url,
            async_fetch,
            message_handler,
            engine,
            conf,
            lifecycle,
        } = self;

        debug!("Fetch {id} scheduled: {url}");
        let job = FetchJob {
            id,
            completion: FetchCompletion::new(
                url.clone(),
                async_fetch,
                message_handler.clone(),
                lifecycle,
            ),
            url,
            message_handler,
            engine: engine.clone(),
            conf,
            user_agent,
        };
        engine.dispatcher.post(Box::new(move || job.execute()));
    }
}

/// The posted half of a fetch. Dropping it unrun fails the fetch.
struct FetchJob {
    id: Uuid,
    url: String,
    message_handler: Arc<dyn MessageHandler>,
    engine: ProxyEngine,
    conf: config::Fetcher,
    user_agent: Option<HeaderValue>,
    completion: FetchCompletion,
}

impl FetchJob {
    fn execute(self) {
        let dispatcher = self.engine.dispatcher.clone();
        dispatcher.spawn(self.run().boxed());
        dispatcher.run(RunType::Block);
    }

    async fn run(self) {
        let FetchJob {
            id,
            url,
            message_handler,
            engine,
            conf,
            user_agent,
            completion,
        } = self;

        let uri = match parse_fetch_url(&url) {
            Ok(uri) => uri,
            Err(e) => return completion.fail(&e),
        };

        let addr = match engine.resolver.resolve(&uri, conf.dns_lookup_family).await {
            Ok(addr) => addr,
            Err(e) => {
                stats::record_dns_failure();
                message_handler.warning(&format!("Unable to resolve {url}: {e}"));
                return completion.fail(&e);
            }
        };
        debug!("Fetch {id} resolved {url} to {addr}");

        let tls = match (uri.scheme_str(), host_and_port(&uri)) {
            (Some("https"), Ok((host, _))) => Some(UpstreamTls { sni: host }),
            _ => None,
        };
        let bootstrap =
            Bootstrap::single_static_host(&conf.cluster_name, addr, conf.connect_timeout(), tls);
        trace!("Computed configuration: {}", bootstrap.to_yaml());

        let cluster_manager = match engine
            .cluster_manager_factory
            .cluster_manager_from_bootstrap(&bootstrap)
        {
            Ok(cm) => cm,
            Err(e) => return completion.fail(&e),
        };

        let http_uri = HttpUri {
            uri,
            cluster: conf.cluster_name,
        };
        RemoteDataFetcher::new(cluster_manager, http_uri, None, Box::new(completion))
            .with_user_agent(user_agent)
            .fetch()
            .await;
    }
}

fn parse_fetch_url(url: &str) -> FetchResult<Uri> {
    let uri: Uri = url
        .parse()
        .map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
    host_and_port(&uri)?;
    Ok(uri)
}
