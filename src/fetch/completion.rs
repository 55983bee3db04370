use std::sync::Arc;

use crate::{
    core::{
        AsyncFetch, FetchError, MessageHandler, RemoteResponse, ResponseHeaders,
        X_ORIGINAL_CONTENT_LENGTH,
    },
    stats,
};

use super::{
    remote::RemoteDataFetcherCallback,
    state::{FetchState, Lifecycle},
};

/// Single-use handle that resolves a caller's fetch.
///
/// `succeed` and `fail` consume the handle. A handle dropped unresolved
/// completes the fetch with failure, so a caller is never left pending.
pub struct FetchCompletion {
    inner: Option<Pending>,
}

struct Pending {
    url: String,
    async_fetch: Box<dyn AsyncFetch>,
    message_handler: Arc<dyn MessageHandler>,
    lifecycle: Arc<Lifecycle>,
}

impl FetchCompletion {
    pub(crate) fn new(
        url: String,
        async_fetch: Box<dyn AsyncFetch>,
        message_handler: Arc<dyn MessageHandler>,
        lifecycle: Arc<Lifecycle>,
    ) -> Self {
        Self {
            inner: Some(Pending {
                url,
                async_fetch,
                message_handler,
                lifecycle,
            }),
        }
    }

    /// Copy `response` into the caller's fetch and complete it.
    pub fn succeed(mut self, response: RemoteResponse) {
        if let Some(pending) = self.inner.take() {
            pending.deliver(response);
        }
    }

    pub fn fail(mut self, reason: &FetchError) {
        if let Some(pending) = self.inner.take() {
            pending
                .message_handler
                .error(&format!("Fetch of {} failed: {}", pending.url, reason));
            pending.finish(false);
        }
    }
}

impl Pending {
    fn deliver(mut self, response: RemoteResponse) {
        if self.lifecycle.state() == FetchState::Done {
            log::error!("Fetch of {} completed twice, response discarded", self.url);
            return;
        }

        let body_len = response.body.len() as u64;

        let res_headers = self.async_fetch.response_headers();
        res_headers.copy_from(&ResponseHeaders::from_remote(&response));
        res_headers.set_content_length(body_len);
        res_headers.set_original_content_length(body_len);

        if self
            .async_fetch
            .request_headers()
            .contains_key(X_ORIGINAL_CONTENT_LENGTH)
        {
            let extra = self.async_fetch.extra_response_headers();
            extra.set_content_length(body_len);
            extra.set_original_content_length(body_len);
        }

        let written = self
            .async_fetch
            .write(&response.body, self.message_handler.as_ref());
        if !written {
            self.message_handler.warning(&format!(
                "Response sink rejected {body_len} body bytes of {}",
                self.url
            ));
        }

        self.finish(written);
    }

    fn finish(mut self, success: bool) {
        if !self.lifecycle.finish() {
            log::error!("Fetch of {} completed twice", self.url);
            return;
        }
        stats::record_completed(success);
        self.async_fetch.done(success);
    }
}

impl Drop for FetchCompletion {
    fn drop(&mut self) {
        if let Some(pending) = self.inner.take() {
            pending.message_handler.error(&format!(
                "Fetch of {} failed: {}",
                pending.url,
                FetchError::Abandoned
            ));
            pending.finish(false);
        }
    }
}

impl RemoteDataFetcherCallback for FetchCompletion {
    fn on_success(self: Box<Self>, response: RemoteResponse) {
        self.succeed(response);
    }

    fn on_failure(self: Box<Self>, reason: FetchError) {
        self.fail(&reason);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bytes::Bytes;
    use http::{HeaderMap, StatusCode};

    use super::*;
    use crate::fetch::testing::{text_response, RecordingFetch, RecordingHandler};

    /// A sink that refuses every body write.
    struct FullSink {
        response_headers: ResponseHeaders,
        done: Arc<Mutex<Vec<bool>>>,
        request_headers: HeaderMap,
    }

    impl AsyncFetch for FullSink {
        fn request_headers(&self) -> &HeaderMap {
            &self.request_headers
        }

        fn response_headers(&mut self) -> &mut ResponseHeaders {
            &mut self.response_headers
        }

        fn extra_response_headers(&mut self) -> &mut ResponseHeaders {
            &mut self.response_headers
        }

        fn write(&mut self, _data: &[u8], _handler: &dyn MessageHandler) -> bool {
            false
        }

        fn done(&mut self, success: bool) {
            self.done.lock().unwrap().push(success);
        }
    }

    fn in_progress() -> Arc<Lifecycle> {
        let lifecycle = Arc::new(Lifecycle::default());
        assert!(lifecycle.begin());
        lifecycle
    }

    #[test]
    fn test_succeed_keeps_previous_original_length() {
        let (async_fetch, record) = RecordingFetch::new(HeaderMap::new());
        let lifecycle = in_progress();
        let completion = FetchCompletion::new(
            "http://example.test/".to_string(),
            Box::new(async_fetch),
            Arc::new(RecordingHandler::default()),
            lifecycle.clone(),
        );

        let mut response = text_response("hello");
        response
            .headers
            .insert(X_ORIGINAL_CONTENT_LENGTH, "12".parse().unwrap());
        completion.succeed(response);

        let record = record.lock().unwrap();
        assert_eq!(record.done_calls, vec![true]);
        assert_eq!(record.response_headers.content_length(), Some(5));
        assert_eq!(
            record.response_headers.get(&X_ORIGINAL_CONTENT_LENGTH),
            Some("12")
        );
        assert_eq!(lifecycle.state(), FetchState::Done);
    }

    #[test]
    fn test_rejected_write_fails_the_fetch() {
        let done = Arc::new(Mutex::new(Vec::new()));
        let handler = Arc::new(RecordingHandler::default());
        let completion = FetchCompletion::new(
            "http://example.test/".to_string(),
            Box::new(FullSink {
                response_headers: ResponseHeaders::new(),
                done: done.clone(),
                request_headers: HeaderMap::new(),
            }),
            handler.clone(),
            in_progress(),
        );

        completion.succeed(RemoteResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"hello"),
        });

        assert_eq!(*done.lock().unwrap(), vec![false]);
        assert!(handler.messages().iter().any(|m| m.contains("rejected")));
    }

    #[test]
    fn test_drop_completes_with_failure() {
        let (async_fetch, record) = RecordingFetch::new(HeaderMap::new());
        let handler = Arc::new(RecordingHandler::default());
        let completion = FetchCompletion::new(
            "http://example.test/".to_string(),
            Box::new(async_fetch),
            handler.clone(),
            in_progress(),
        );

        drop(completion);

        assert_eq!(record.lock().unwrap().done_calls, vec![false]);
        assert!(handler
            .messages()
            .iter()
            .any(|m| m.contains(&FetchError::Abandoned.to_string())));
    }

    #[test]
    fn test_success_after_done_writes_nothing() {
        let (async_fetch, record) = RecordingFetch::new(HeaderMap::new());
        let lifecycle = in_progress();
        let completion = FetchCompletion::new(
            "http://example.test/".to_string(),
            Box::new(async_fetch),
            Arc::new(RecordingHandler::default()),
            lifecycle.clone(),
        );

        assert!(lifecycle.finish());
        completion.succeed(text_response("hello"));

        let record = record.lock().unwrap();
        assert_eq!(record.writes, 0);
        assert!(record.body.is_empty());
        assert!(record.done_calls.is_empty());
        assert_eq!(lifecycle.state(), FetchState::Done);
    }

    #[test]
    fn test_second_completion_is_ignored() {
        let (async_fetch, record) = RecordingFetch::new(HeaderMap::new());
        let lifecycle = in_progress();
        let completion = FetchCompletion::new(
            "http://example.test/".to_string(),
            Box::new(async_fetch),
            Arc::new(RecordingHandler::default()),
            lifecycle.clone(),
        );

        // someone else already finished this fetch
        assert!(lifecycle.finish());
        completion.fail(&FetchError::Upstream("late".to_string()));

        assert!(record.lock().unwrap().done_calls.is_empty());
    }
}
