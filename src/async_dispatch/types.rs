/*!
 * Async Dispatch Types
 */

use crate::core::types::{DispatchId, EventFd};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// How event and timer callbacks reach the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// A dedicated delivery thread per context runs callbacks
    Thread,
    /// Callbacks run inline on whichever thread raised the event,
    /// interrupting it the way a signal handler would
    Signal,
}

impl DeliveryMode {
    pub fn name(self) -> &'static str {
        match self {
            DeliveryMode::Thread => "thread",
            DeliveryMode::Signal => "signal",
        }
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            DeliveryMode::Thread => 0,
            DeliveryMode::Signal => 1,
        }
    }
}

impl Default for DeliveryMode {
    fn default() -> Self {
        DeliveryMode::Thread
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for DeliveryMode {
    type Err = AsyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "thread" => Ok(DeliveryMode::Thread),
            "signal" => Ok(DeliveryMode::Signal),
            other => Err(AsyncError::InvalidParameter(format!(
                "unknown async delivery mode '{}'",
                other
            ))),
        }
    }
}

/// Event interest mask for event sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventMask(pub u32);

impl EventMask {
    pub const READ: EventMask = EventMask(1 << 0);

    #[inline]
    pub fn contains(self, other: EventMask) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Callback run for a dispatched event or expired timer
pub type AsyncCallback = Arc<dyn Fn(DispatchId) + Send + Sync>;

/// What a registered handler listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Event { fd: EventFd, events: EventMask },
    Timer { interval: Duration },
}

/// A registered event or timer handler
pub struct AsyncHandler {
    id: DispatchId,
    kind: HandlerKind,
    callback: AsyncCallback,
    dispatched: AtomicU64,
    missed: AtomicU64,
}

impl AsyncHandler {
    pub(crate) fn new(id: DispatchId, kind: HandlerKind, callback: AsyncCallback) -> Self {
        Self {
            id,
            kind,
            callback,
            dispatched: AtomicU64::new(0),
            missed: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn id(&self) -> DispatchId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    /// Times the callback has run
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Times a dispatch was deferred because the context was blocked
    pub fn missed(&self) -> u64 {
        self.missed.load(Ordering::Relaxed)
    }

    pub(crate) fn invoke(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        (self.callback)(self.id);
    }

    pub(crate) fn note_missed(&self) {
        self.missed.fetch_add(1, Ordering::Relaxed);
    }
}

impl fmt::Debug for AsyncHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncHandler")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("dispatched", &self.dispatched())
            .field("missed", &self.missed())
            .finish()
    }
}

/// Async dispatch errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AsyncError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("No handler registered with id {0}")]
    NoSuchHandler(DispatchId),

    #[error("Event descriptor {0} already has a handler")]
    AlreadyExists(EventFd),

    #[error("Async context is closed")]
    Closed,

    #[error("Delivery thread failed: {0}")]
    ThreadFailed(String),
}

pub type AsyncResult<T> = Result<T, AsyncError>;
