/*!
 * Completion Delivery
 *
 * Posted zero-copy sends report back through a lock-free queue that the
 * owning worker drains during progress. Finished requests hand their
 * callback the final status after the request is back in the pool.
 */

use super::pool::RequestPool;
use super::request::Request;
use super::types::RequestHandle;
use crate::core::errors::{status_string, AmResult};
use crate::transport::ZcopyCompletion;
use crossbeam_queue::SegQueue;
use std::sync::Arc;
use tracing::trace;

/// Transport completions waiting for the owner's progress
#[derive(Default)]
pub struct CompletionQueue {
    queue: SegQueue<(RequestHandle, AmResult<()>)>,
}

impl CompletionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, handle: RequestHandle, status: AmResult<()>) {
        self.queue.push((handle, status));
    }

    pub fn pop(&self) -> Option<(RequestHandle, AmResult<()>)> {
        self.queue.pop()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Transport hook for a posted zero-copy send of `handle`
    pub fn hook(self: &Arc<Self>, handle: RequestHandle) -> ZcopyCompletion {
        let queue = Arc::clone(self);
        Box::new(move |status| queue.push(handle, status))
    }
}

/// Retire a completed request and run its callback, if any
///
/// The callback runs after the slot is released, with no pool lock held, so
/// it may issue new sends.
pub fn deliver(pool: &RequestPool, mut req: Box<Request>) {
    let handle = req.handle();
    let status = req.status();
    let callback = req.take_callback();
    pool.release(req);

    match callback {
        Some(callback) => {
            trace!(req = %handle, status = status_string(&status), "Invoking send callback");
            callback(handle, status);
        }
        None => trace!(req = %handle, "Request retired without callback"),
    }
}
