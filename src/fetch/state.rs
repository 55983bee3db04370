use std::sync::atomic::{AtomicU8, Ordering};

/// Where a fetch is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FetchState {
    Start = 0,
    InProgress = 1,
    Done = 2,
}

impl From<u8> for FetchState {
    fn from(v: u8) -> Self {
        match v {
            0 => FetchState::Start,
            1 => FetchState::InProgress,
            _ => FetchState::Done,
        }
    }
}

/// Shared, forward-only view of a [`FetchState`].
#[derive(Debug)]
pub struct Lifecycle(AtomicU8);

impl Default for Lifecycle {
    fn default() -> Self {
        Self(AtomicU8::new(FetchState::Start as u8))
    }
}

impl Lifecycle {
    pub fn state(&self) -> FetchState {
        self.0.load(Ordering::Acquire).into()
    }

    /// Start -> InProgress. Returns `false` if the fetch already left Start.
    pub(crate) fn begin(&self) -> bool {
        self.0
            .compare_exchange(
                FetchState::Start as u8,
                FetchState::InProgress as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Any state -> Done. Returns `false` if it was already Done.
    pub(crate) fn finish(&self) -> bool {
        self.0.swap(FetchState::Done as u8, Ordering::AcqRel) != FetchState::Done as u8
    }
}
