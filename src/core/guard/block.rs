/*!
 * Async Block Guard
 *
 * One nesting level of an async context's blocked region
 */

use super::traits::{Guard, GuardDrop};
use super::{GuardError, GuardMetadata, GuardResult};
use crate::async_dispatch::AsyncContext;
use std::marker::PhantomData;
use tracing::trace;

/// While any `AsyncBlockGuard` for a context is alive, no event or timer
/// callback of that context executes. Nested guards compose by counting.
///
/// The guard is `!Send`: the blocked level belongs to the thread that
/// entered it and must be left on that thread.
pub struct AsyncBlockGuard<'a> {
    ctx: &'a AsyncContext,
    metadata: GuardMetadata,
    active: bool,
    _not_send: PhantomData<*const ()>,
}

impl<'a> AsyncBlockGuard<'a> {
    /// Wrap a level that the caller has already entered
    pub(crate) fn entered(ctx: &'a AsyncContext) -> Self {
        Self {
            ctx,
            metadata: GuardMetadata::new("async_block"),
            active: true,
            _not_send: PhantomData,
        }
    }

    /// The context this guard blocks
    pub fn context(&self) -> &AsyncContext {
        self.ctx
    }
}

impl Guard for AsyncBlockGuard<'_> {
    fn resource_type(&self) -> &'static str {
        "async_block"
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn release(&mut self) -> GuardResult<()> {
        if !self.active {
            return Err(GuardError::AlreadyReleased);
        }
        self.active = false;
        self.ctx.unblock();
        Ok(())
    }
}

impl GuardDrop for AsyncBlockGuard<'_> {
    fn on_drop(&mut self) {
        if self.active {
            self.active = false;
            trace!(held_us = self.metadata.lifetime_micros(), "Async block released");
            self.ctx.unblock();
        }
    }
}

impl Drop for AsyncBlockGuard<'_> {
    fn drop(&mut self) {
        self.on_drop();
    }
}
