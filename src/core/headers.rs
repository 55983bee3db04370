//! Caller-side response header representation.

use http::{
    header::{CONTENT_LENGTH, TRANSFER_ENCODING},
    HeaderMap, HeaderName, HeaderValue, StatusCode,
};

use super::traits::RemoteResponse;

/// Records the size of the body as it was delivered by the origin.
pub const X_ORIGINAL_CONTENT_LENGTH: HeaderName =
    HeaderName::from_static("x-original-content-length");

/// Response status and header fields as seen by the caller of a fetch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResponseHeaders {
    status: Option<StatusCode>,
    headers: HeaderMap,
}

impl ResponseHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field-by-field translation of a delivered response.
    pub fn from_remote(response: &RemoteResponse) -> Self {
        let mut headers = HeaderMap::with_capacity(response.headers.len());
        for (name, value) in response.headers.iter() {
            headers.append(name.clone(), value.clone());
        }
        Self {
            status: Some(response.status),
            headers,
        }
    }

    pub fn status_code(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn set_status_code(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn has(&self, name: &HeaderName) -> bool {
        self.headers.contains_key(name)
    }

    /// First value of `name`, if it is valid visible ASCII.
    pub fn get(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn add(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.append(name, value);
    }

    pub fn replace(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    pub fn remove_all(&mut self, name: &HeaderName) {
        self.headers.remove(name);
    }

    /// Replace everything with the contents of `other`.
    pub fn copy_from(&mut self, other: &ResponseHeaders) {
        self.status = other.status;
        self.headers = other.headers.clone();
    }

    pub fn content_length(&self) -> Option<u64> {
        self.get(&CONTENT_LENGTH).and_then(|v| v.parse().ok())
    }

    /// Set `content-length` for a fully buffered body.
    ///
    /// A buffered body is no longer chunked, so `transfer-encoding` goes.
    pub fn set_content_length(&mut self, len: u64) {
        self.headers.remove(TRANSFER_ENCODING);
        self.headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
    }

    /// Record the original body size unless a previous hop already did.
    pub fn set_original_content_length(&mut self, len: u64) {
        if !self.has(&X_ORIGINAL_CONTENT_LENGTH) {
            self.headers
                .insert(X_ORIGINAL_CONTENT_LENGTH, HeaderValue::from(len));
        }
    }

    pub fn clear(&mut self) {
        self.status = None;
        self.headers.clear();
    }
}
