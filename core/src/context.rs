//! Caller-supplied cancellation context.
//!
//! A `Context` is checked by drivers before every store call. Cloning a
//! context shares its cancellation flag, so a `CancelHandle` held elsewhere
//! aborts every operation running under any clone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Reasons a context stops accepting work.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation and deadline carrier threaded through every operation.
#[derive(Debug, Clone, Default)]
pub struct Context {
    canceled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never canceled.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a cancelable context and the handle that cancels it.
    pub fn with_cancel(&self) -> (Context, CancelHandle) {
        let ctx = Context {
            canceled: Arc::new(AtomicBool::new(self.is_canceled())),
            deadline: self.deadline,
        };
        let handle = CancelHandle {
            canceled: Arc::clone(&ctx.canceled),
        };
        (ctx, handle)
    }

    /// Derive a context that expires after `timeout`. An earlier parent
    /// deadline is kept.
    pub fn with_timeout(&self, timeout: Duration) -> Context {
        let deadline = Instant::now() + timeout;
        Context {
            canceled: Arc::clone(&self.canceled),
            deadline: Some(self.deadline.map_or(deadline, |d| d.min(deadline))),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Returns the reason this context is done, if any.
    pub fn err(&self) -> Option<ContextError> {
        if self.is_canceled() {
            return Some(ContextError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// `Err` when the context is done.
    pub fn check(&self) -> Result<(), ContextError> {
        self.err().map_or(Ok(()), Err)
    }
}

/// Cancels the context it was created with (and all of its clones).
#[derive(Debug, Clone)]
pub struct CancelHandle {
    canceled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }
}
