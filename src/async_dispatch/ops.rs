/*!
 * Delivery-Mode Operations
 *
 * One operation set per delivery mode, constructed once and never mutated.
 * A context picks its set from its mode tag at creation time.
 */

use super::context::AsyncContext;
use super::thread::{self, ThreadCmd};
use super::types::{AsyncResult, DeliveryMode, EventMask};
use crate::core::types::{EventFd, TimerId};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Operations for a specific async event delivery method
pub trait DeliveryOps: Send + Sync {
    fn mode(&self) -> DeliveryMode;

    /// Process-wide setup, run when the first context of this mode is created
    fn init(&self);

    /// Process-wide teardown, run when the last context of this mode is dropped
    fn cleanup(&self);

    fn context_init(&self, ctx: &Arc<AsyncContext>) -> AsyncResult<()>;

    fn context_cleanup(&self, ctx: &AsyncContext);

    /// Try to enter the context for a dispatch, `false` if it is blocked
    fn context_try_block(&self, ctx: &AsyncContext, from_async: bool) -> bool {
        ctx.try_enter(from_async)
    }

    fn context_unblock(&self, ctx: &AsyncContext) {
        ctx.unblock();
    }

    fn add_event_fd(&self, ctx: &AsyncContext, fd: EventFd, events: EventMask) -> AsyncResult<()>;

    fn remove_event_fd(&self, ctx: &AsyncContext, fd: EventFd) -> AsyncResult<()>;

    fn add_timer(&self, ctx: &AsyncContext, timer_id: TimerId, interval: Duration)
        -> AsyncResult<()>;

    fn remove_timer(&self, ctx: &AsyncContext, timer_id: TimerId) -> AsyncResult<()>;

    /// An event source became ready
    fn notify(&self, ctx: &AsyncContext, fd: EventFd);

    /// The last block level was released while dispatches were waiting
    fn missed_pending(&self, ctx: &AsyncContext);
}

// =============================================================================
// Thread delivery
// =============================================================================

/// Delivery on a dedicated thread per context
pub struct ThreadOps;

impl DeliveryOps for ThreadOps {
    fn mode(&self) -> DeliveryMode {
        DeliveryMode::Thread
    }

    fn init(&self) {
        info!("Async thread delivery initialized");
    }

    fn cleanup(&self) {
        info!("Async thread delivery cleaned up");
    }

    fn context_init(&self, ctx: &Arc<AsyncContext>) -> AsyncResult<()> {
        let (tx, handle) = thread::spawn_delivery_thread(ctx)?;
        ctx.install_thread(tx, handle);
        Ok(())
    }

    fn context_cleanup(&self, ctx: &AsyncContext) {
        ctx.shutdown_thread();
    }

    fn add_event_fd(&self, ctx: &AsyncContext, fd: EventFd, events: EventMask) -> AsyncResult<()> {
        debug!(fd = fd, events = events.0, "Thread delivery watching event source");
        ctx.send_thread(ThreadCmd::Rearm)
    }

    fn remove_event_fd(&self, _ctx: &AsyncContext, fd: EventFd) -> AsyncResult<()> {
        debug!(fd = fd, "Thread delivery released event source");
        Ok(())
    }

    fn add_timer(
        &self,
        ctx: &AsyncContext,
        timer_id: TimerId,
        interval: Duration,
    ) -> AsyncResult<()> {
        debug!(timer_id = timer_id, interval_us = interval.as_micros() as u64, "Timer armed");
        // The delivery thread recomputes its sleep from the timer table
        ctx.send_thread(ThreadCmd::Rearm)
    }

    fn remove_timer(&self, _ctx: &AsyncContext, timer_id: TimerId) -> AsyncResult<()> {
        debug!(timer_id = timer_id, "Timer disarmed");
        Ok(())
    }

    fn notify(&self, ctx: &AsyncContext, fd: EventFd) {
        if let Err(e) = ctx.send_thread(ThreadCmd::Event(fd)) {
            warn!(fd = fd, error = %e, "Dropping event for stopped delivery thread");
        }
    }

    fn missed_pending(&self, ctx: &AsyncContext) {
        let _ = ctx.send_thread(ThreadCmd::CheckMissed);
    }
}

// =============================================================================
// Signal delivery
// =============================================================================

static SIGNAL_HANDLER_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Inline delivery on the raising thread
///
/// Timers have no thread of their own in this mode; they are checked each
/// time an event is raised and whenever the owner polls the context.
pub struct SignalOps;

impl SignalOps {
    /// Whether the process-wide signal dispatch entry is installed
    pub fn is_installed(&self) -> bool {
        SIGNAL_HANDLER_INSTALLED.load(Ordering::Acquire)
    }
}

impl DeliveryOps for SignalOps {
    fn mode(&self) -> DeliveryMode {
        DeliveryMode::Signal
    }

    fn init(&self) {
        SIGNAL_HANDLER_INSTALLED.store(true, Ordering::Release);
        info!("Async signal delivery initialized");
    }

    fn cleanup(&self) {
        SIGNAL_HANDLER_INSTALLED.store(false, Ordering::Release);
        info!("Async signal delivery cleaned up");
    }

    fn context_init(&self, _ctx: &Arc<AsyncContext>) -> AsyncResult<()> {
        Ok(())
    }

    fn context_cleanup(&self, _ctx: &AsyncContext) {}

    fn add_event_fd(&self, _ctx: &AsyncContext, fd: EventFd, events: EventMask) -> AsyncResult<()> {
        debug!(fd = fd, events = events.0, "Signal delivery watching event source");
        Ok(())
    }

    fn remove_event_fd(&self, _ctx: &AsyncContext, fd: EventFd) -> AsyncResult<()> {
        debug!(fd = fd, "Signal delivery released event source");
        Ok(())
    }

    fn add_timer(
        &self,
        _ctx: &AsyncContext,
        timer_id: TimerId,
        interval: Duration,
    ) -> AsyncResult<()> {
        debug!(timer_id = timer_id, interval_us = interval.as_micros() as u64, "Timer armed");
        Ok(())
    }

    fn remove_timer(&self, _ctx: &AsyncContext, timer_id: TimerId) -> AsyncResult<()> {
        debug!(timer_id = timer_id, "Timer disarmed");
        Ok(())
    }

    fn notify(&self, ctx: &AsyncContext, fd: EventFd) {
        ctx.dispatch_event_fd(fd, true);
        ctx.poll_timers(true);
    }

    fn missed_pending(&self, _ctx: &AsyncContext) {
        // Picked up by the owner's next progress call
    }
}

// =============================================================================
// Mode table and lifecycle
// =============================================================================

pub static THREAD_OPS: ThreadOps = ThreadOps;
pub static SIGNAL_OPS: SignalOps = SignalOps;

static ACTIVE_CONTEXTS: [AtomicUsize; 2] = [AtomicUsize::new(0), AtomicUsize::new(0)];

impl DeliveryMode {
    /// Operation set for this mode
    pub fn ops(self) -> &'static dyn DeliveryOps {
        match self {
            DeliveryMode::Thread => &THREAD_OPS,
            DeliveryMode::Signal => &SIGNAL_OPS,
        }
    }

    /// Number of live contexts using this mode
    pub fn active_contexts(self) -> usize {
        ACTIVE_CONTEXTS[self.index()].load(Ordering::Acquire)
    }
}

pub(crate) fn context_created(mode: DeliveryMode) {
    if ACTIVE_CONTEXTS[mode.index()].fetch_add(1, Ordering::AcqRel) == 0 {
        mode.ops().init();
    }
}

pub(crate) fn context_destroyed(mode: DeliveryMode) {
    if ACTIVE_CONTEXTS[mode.index()].fetch_sub(1, Ordering::AcqRel) == 1 {
        mode.ops().cleanup();
    }
}
