use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use dashmap::DashMap;
use http::HeaderMap;
use log::info;
use uuid::Uuid;

use crate::{
    config,
    core::{AsyncFetch, FetchError, MessageHandler, ResponseHeaders},
    engine::ProxyEngine,
};

use super::adapter::EngineFetch;

/// Entry point for callers: one [`EngineFetch`] per requested url.
pub struct EngineUrlAsyncFetcher {
    engine: ProxyEngine,
    conf: config::Fetcher,
    active: Arc<DashMap<Uuid, String>>,
    shutdown: AtomicBool,
}

impl EngineUrlAsyncFetcher {
    pub fn new(engine: ProxyEngine, conf: config::Fetcher) -> Self {
        Self {
            engine,
            conf,
            active: Arc::new(DashMap::new()),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Schedule a fetch of `url` into `async_fetch`.
    ///
    /// Returns `false` if the fetch was rejected; `async_fetch` has then
    /// already been completed with failure.
    pub fn fetch(
        &self,
        url: &str,
        message_handler: Arc<dyn MessageHandler>,
        mut async_fetch: Box<dyn AsyncFetch>,
    ) -> bool {
        if self.is_shut_down() {
            message_handler.warning(&format!(
                "Rejecting fetch of {url}: {}",
                FetchError::ShutDown
            ));
            async_fetch.done(false);
            return false;
        }

        let id = Uuid::new_v4();
        self.active.insert(id, url.to_string());
        let tracked = TrackedFetch {
            id,
            inner: async_fetch,
            active: self.active.clone(),
        };

        let mut fetch = EngineFetch::with_id(
            id,
            url,
            Box::new(tracked),
            message_handler,
            self.engine.clone(),
            self.conf.clone(),
        );
        fetch.init();
        fetch.start();
        true
    }

    /// Fetches scheduled and not yet completed.
    pub fn active_fetches(&self) -> usize {
        self.active.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Stop accepting fetches and stop the engine's dispatcher.
    ///
    /// Fetches still queued on the dispatcher complete with failure.
    pub fn shut_down(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(
            "Shutting down url fetcher with {} active fetches",
            self.active_fetches()
        );
        self.engine.dispatcher.exit();
    }
}

/// Forwards to the caller's fetch and deregisters itself on completion.
struct TrackedFetch {
    id: Uuid,
    inner: Box<dyn AsyncFetch>,
    active: Arc<DashMap<Uuid, String>>,
}

impl AsyncFetch for TrackedFetch {
    fn request_headers(&self) -> &HeaderMap {
        self.inner.request_headers()
    }

    fn response_headers(&mut self) -> &mut ResponseHeaders {
        self.inner.response_headers()
    }

    fn extra_response_headers(&mut self) -> &mut ResponseHeaders {
        self.inner.extra_response_headers()
    }

    fn write(&mut self, data: &[u8], handler: &dyn MessageHandler) -> bool {
        self.inner.write(data, handler)
    }

    fn done(&mut self, success: bool) {
        self.active.remove(&self.id);
        self.inner.done(success);
    }
}
