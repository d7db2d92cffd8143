use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag asking a running conversion to stop.
///
/// Clones share the flag, so one clone can be handed to a signal handler
/// or another thread while the conversion polls its own.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Later calls have no further effect.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// True once [`cancel`](Self::cancel) was called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// The underlying flag, for APIs that set an `AtomicBool` directly
    /// such as signal registration.
    pub fn flag(&self) -> &Arc<AtomicBool> {
        &self.flag
    }
}
