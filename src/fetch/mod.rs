//! Fetch adapter: turns caller fetch requests into engine work.

pub mod adapter;
pub mod completion;
pub mod fetcher;
pub mod remote;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::EngineFetch;
pub use completion::FetchCompletion;
pub use fetcher::EngineUrlAsyncFetcher;
pub use remote::{HttpUri, RemoteDataFetcher, RemoteDataFetcherCallback};
pub use state::{FetchState, Lifecycle};
