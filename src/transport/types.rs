/*!
 * Transport Types
 */

use crate::async_dispatch::AsyncContext;
use crate::core::errors::AmResult;
use crate::core::types::EventFd;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

/// Handler may only run inside explicit progress calls
pub const CB_FLAG_SYNC: u32 = 1 << 0;

/// Handler may run from async context (delivery thread or signal)
pub const CB_FLAG_ASYNC: u32 = 1 << 1;

/// Data pointer handed to a receive handler may be retained by it
pub const RECV_FLAG_DESC: u32 = 1 << 0;

/// Interface capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IfaceAttr {
    /// Largest inline send, header included
    pub max_short: usize,
    /// Largest single buffered-copy fragment
    pub max_bcopy: usize,
    /// Largest single zero-copy fragment
    pub max_zcopy: usize,
    /// Size above which zero-copy beats buffered copy on this interface
    pub zcopy_threshold: Option<usize>,
}

/// What the receive handler did with the data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvStatus {
    /// Done with the data; the transport may reuse its buffer
    Consumed,
    /// The handler kept its own reference to the data
    Retained,
}

/// Flags passed to receive handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecvFlags(pub u32);

impl RecvFlags {
    #[inline]
    pub fn is_desc(self) -> bool {
        self.0 & RECV_FLAG_DESC != 0
    }
}

/// Receive handler: payload bytes and receive flags
pub type AmHandler = Arc<dyn Fn(&Bytes, RecvFlags) -> RecvStatus + Send + Sync>;

/// Invoked once when an in-progress zero-copy send finishes
pub type ZcopyCompletion = Box<dyn FnOnce(AmResult<()>) + Send>;

/// Outcome of posting a zero-copy send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZcopyStatus {
    Done,
    InProgress,
}

/// Routes a transport's event source to an async context
#[derive(Clone)]
pub struct EventNotifier {
    ctx: Weak<AsyncContext>,
    fd: EventFd,
}

impl EventNotifier {
    pub fn new(ctx: &Arc<AsyncContext>, fd: EventFd) -> Self {
        Self {
            ctx: Arc::downgrade(ctx),
            fd,
        }
    }

    #[inline]
    pub fn fd(&self) -> EventFd {
        self.fd
    }

    /// Signal the event source; silently ignored once the context is gone
    pub fn notify(&self) {
        if let Some(ctx) = self.ctx.upgrade() {
            ctx.raise_event(self.fd);
        }
    }
}
