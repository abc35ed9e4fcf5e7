/*!
 * Async Context
 *
 * Per-worker registry of event sources and timers, and the blocked region
 * that defers their callbacks while the owner runs non-reentrant code.
 */

use super::ops::{self, DeliveryOps};
use super::thread::ThreadCmd;
use super::types::{
    AsyncCallback, AsyncError, AsyncHandler, AsyncResult, DeliveryMode, EventMask, HandlerKind,
};
use crate::core::guard::AsyncBlockGuard;
use crate::core::id::{DispatchIdGenerator, IdGenerator};
use crate::core::limits::ASYNC_MIN_TIMER_INTERVAL;
use crate::core::types::{DispatchId, EventFd, TimerId};
use ahash::RandomState;
use crossbeam_queue::SegQueue;
use dashmap::DashMap;
use flume::Sender;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Blocked-count and the thread that holds it
#[derive(Debug, Default)]
struct BlockState {
    count: u32,
    owner: Option<ThreadId>,
}

#[derive(Debug, Clone, Copy)]
struct TimerState {
    interval: Duration,
    due: Instant,
}

#[derive(Default)]
struct ThreadDelivery {
    tx: Option<Sender<ThreadCmd>>,
    handle: Option<JoinHandle<()>>,
}

/// Async context
///
/// # Blocking
///
/// `block()` returns a guard; while any guard is alive no callback of this
/// context runs. A running dispatch holds one block level on the
/// dispatching thread, so `block()` from another thread waits for the
/// callback to return. Dispatches that find the context blocked are queued
/// and run by [`AsyncContext::check_missed`].
pub struct AsyncContext {
    mode: DeliveryMode,
    ops: &'static dyn DeliveryOps,
    block: Mutex<BlockState>,
    unblocked: Condvar,
    handlers: DashMap<DispatchId, Arc<AsyncHandler>, RandomState>,
    event_fds: DashMap<EventFd, DispatchId, RandomState>,
    timers: Mutex<HashMap<TimerId, TimerState, RandomState>>,
    missed: SegQueue<DispatchId>,
    ids: DispatchIdGenerator,
    thread: Mutex<ThreadDelivery>,
}

impl AsyncContext {
    /// Create a context and start its delivery mechanism
    pub fn new(mode: DeliveryMode) -> AsyncResult<Arc<Self>> {
        let ctx = Arc::new(Self {
            mode,
            ops: mode.ops(),
            block: Mutex::new(BlockState::default()),
            unblocked: Condvar::new(),
            handlers: DashMap::with_hasher(RandomState::new()),
            event_fds: DashMap::with_hasher(RandomState::new()),
            timers: Mutex::new(HashMap::with_hasher(RandomState::new())),
            missed: SegQueue::new(),
            ids: DispatchIdGenerator::new(1),
            thread: Mutex::new(ThreadDelivery::default()),
        });

        ops::context_created(mode);
        ctx.ops.context_init(&ctx)?;
        info!(mode = %mode, "Async context initialized");
        Ok(ctx)
    }

    #[inline]
    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    // ========================================================================
    // Blocked region
    // ========================================================================

    /// Enter one level of the blocked region
    pub fn block(&self) -> AsyncBlockGuard<'_> {
        let me = std::thread::current().id();
        let mut st = self.block.lock();
        while st.count > 0 && st.owner != Some(me) {
            self.unblocked.wait(&mut st);
        }
        st.count += 1;
        st.owner = Some(me);
        AsyncBlockGuard::entered(self)
    }

    /// Whether any block level is held (including a running dispatch)
    pub fn is_blocked(&self) -> bool {
        self.block.lock().count > 0
    }

    pub fn blocked_count(&self) -> u32 {
        self.block.lock().count
    }

    /// Enter for a dispatch; never waits
    pub(crate) fn try_enter(&self, from_async: bool) -> bool {
        let mut st = self.block.lock();
        if st.count > 0 {
            trace!(from_async = from_async, count = st.count, "Async context busy");
            return false;
        }
        st.count = 1;
        st.owner = Some(std::thread::current().id());
        true
    }

    pub(crate) fn unblock(&self) {
        let (released, missed) = {
            let mut st = self.block.lock();
            debug_assert!(st.count > 0, "unbalanced async unblock");
            st.count = st.count.saturating_sub(1);
            if st.count == 0 {
                st.owner = None;
                // Read under the block lock; pairs with `defer`
                (true, !self.missed.is_empty())
            } else {
                (false, false)
            }
        };

        if released {
            self.unblocked.notify_all();
            if missed {
                self.ops.missed_pending(self);
            }
        }
    }

    /// Queue a dispatch that found the context blocked
    ///
    /// The push happens under the block lock, so either the releasing
    /// `unblock` sees it or this call sees the context already released and
    /// schedules the missed run itself.
    pub(crate) fn defer(&self, id: DispatchId) {
        let released = {
            let st = self.block.lock();
            self.missed.push(id);
            st.count == 0
        };
        if released {
            self.ops.missed_pending(self);
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a callback for an event source
    pub fn set_event_handler<F>(
        &self,
        fd: EventFd,
        events: EventMask,
        callback: F,
    ) -> AsyncResult<DispatchId>
    where
        F: Fn(DispatchId) + Send + Sync + 'static,
    {
        if fd < 0 {
            return Err(AsyncError::InvalidParameter(format!(
                "invalid event descriptor {}",
                fd
            )));
        }

        let _block = self.block();
        if self.event_fds.contains_key(&fd) {
            return Err(AsyncError::AlreadyExists(fd));
        }

        let id = self.ids.next();
        let callback: AsyncCallback = Arc::new(callback);
        self.handlers.insert(
            id,
            Arc::new(AsyncHandler::new(id, HandlerKind::Event { fd, events }, callback)),
        );
        self.event_fds.insert(fd, id);

        if let Err(e) = self.ops.add_event_fd(self, fd, events) {
            self.event_fds.remove(&fd);
            self.handlers.remove(&id);
            self.ids.recycle(id);
            return Err(e);
        }

        debug!(id = id, fd = fd, mode = %self.mode, "Event handler registered");
        Ok(id)
    }

    /// Register a recurring timer
    pub fn add_timer<F>(&self, interval: Duration, callback: F) -> AsyncResult<TimerId>
    where
        F: Fn(DispatchId) + Send + Sync + 'static,
    {
        if interval < ASYNC_MIN_TIMER_INTERVAL {
            return Err(AsyncError::InvalidParameter(format!(
                "timer interval {:?} below minimum",
                interval
            )));
        }

        let _block = self.block();
        let id = self.ids.next();
        let callback: AsyncCallback = Arc::new(callback);
        self.handlers.insert(
            id,
            Arc::new(AsyncHandler::new(id, HandlerKind::Timer { interval }, callback)),
        );
        self.timers.lock().insert(
            id,
            TimerState {
                interval,
                due: Instant::now() + interval,
            },
        );

        if let Err(e) = self.ops.add_timer(self, id, interval) {
            self.timers.lock().remove(&id);
            self.handlers.remove(&id);
            self.ids.recycle(id);
            return Err(e);
        }

        debug!(id = id, interval_us = interval.as_micros() as u64, "Timer registered");
        Ok(id)
    }

    /// Remove an event or timer handler
    ///
    /// Waits for a callback running on another thread to return first.
    pub fn remove_handler(&self, id: DispatchId) -> AsyncResult<()> {
        let _block = self.block();
        let (_, handler) = self
            .handlers
            .remove(&id)
            .ok_or(AsyncError::NoSuchHandler(id))?;

        match handler.kind() {
            HandlerKind::Event { fd, .. } => {
                self.event_fds.remove(&fd);
                self.ops.remove_event_fd(self, fd)?;
            }
            HandlerKind::Timer { .. } => {
                self.timers.lock().remove(&id);
                self.ops.remove_timer(self, id)?;
            }
        }

        self.ids.recycle(id);
        debug!(id = id, "Async handler removed");
        Ok(())
    }

    /// Number of registered handlers (events and timers)
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Run `f` against a registered handler
    pub fn check_handler<F, R>(&self, id: DispatchId, f: F) -> AsyncResult<R>
    where
        F: FnOnce(&AsyncHandler) -> R,
    {
        let handler = self
            .handlers
            .get(&id)
            .map(|h| Arc::clone(h.value()))
            .ok_or(AsyncError::NoSuchHandler(id))?;
        Ok(f(&handler))
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Report that an event source is ready
    ///
    /// Transports call this from whatever thread observed the event.
    pub fn raise_event(&self, fd: EventFd) {
        self.ops.notify(self, fd);
    }

    /// Dispatch a handler, or defer it if the context is blocked
    pub fn dispatch(&self, id: DispatchId, from_async: bool) -> AsyncResult<()> {
        let handler = self
            .handlers
            .get(&id)
            .map(|h| Arc::clone(h.value()))
            .ok_or(AsyncError::NoSuchHandler(id))?;

        if self.ops.context_try_block(self, from_async) {
            trace!(id = id, from_async = from_async, "Dispatching async handler");
            handler.invoke();
            self.ops.context_unblock(self);
        } else {
            handler.note_missed();
            self.defer(id);
            trace!(id = id, "Async context blocked, dispatch deferred");
        }
        Ok(())
    }

    pub(crate) fn dispatch_event_fd(&self, fd: EventFd, from_async: bool) {
        let id = match self.event_fds.get(&fd) {
            Some(id) => *id,
            None => {
                trace!(fd = fd, "Event on unregistered descriptor ignored");
                return;
            }
        };
        if let Err(e) = self.dispatch(id, from_async) {
            debug!(fd = fd, error = %e, "Event handler vanished before dispatch");
        }
    }

    /// Run dispatches deferred while the context was blocked
    ///
    /// Returns the number of callbacks run. Does nothing if the context is
    /// currently blocked, including by the calling thread.
    pub fn check_missed(&self, from_async: bool) -> usize {
        if self.missed.is_empty() {
            return 0;
        }
        if !self.ops.context_try_block(self, from_async) {
            return 0;
        }

        let mut count = 0;
        while let Some(id) = self.missed.pop() {
            // Handler may have been removed since the dispatch was deferred
            if let Some(handler) = self.handlers.get(&id).map(|h| Arc::clone(h.value())) {
                handler.invoke();
                count += 1;
            }
        }

        self.ops.context_unblock(self);
        if count > 0 {
            trace!(count = count, "Ran missed async dispatches");
        }
        count
    }

    /// Number of dispatches waiting for the context to unblock
    pub fn missed_count(&self) -> usize {
        self.missed.len()
    }

    /// Dispatch every expired timer; returns how many fired
    pub fn poll_timers(&self, from_async: bool) -> usize {
        let now = Instant::now();
        let expired: Vec<TimerId> = {
            let mut timers = self.timers.lock();
            timers
                .iter_mut()
                .filter(|(_, t)| t.due <= now)
                .map(|(id, t)| {
                    t.due += t.interval;
                    if t.due <= now {
                        t.due = now + t.interval;
                    }
                    *id
                })
                .collect()
        };

        for id in &expired {
            if let Err(e) = self.dispatch(*id, from_async) {
                debug!(id = id, error = %e, "Timer removed before dispatch");
            }
        }
        expired.len()
    }

    /// Earliest timer expiration, if any timer is armed
    pub fn next_timer_deadline(&self) -> Option<Instant> {
        self.timers.lock().values().map(|t| t.due).min()
    }

    /// Progress hook for the owning thread: missed dispatches, and in
    /// signal mode, expired timers
    pub fn poll(&self) -> usize {
        let mut count = self.check_missed(false);
        if self.mode == DeliveryMode::Signal {
            count += self.poll_timers(false);
        }
        count
    }

    // ========================================================================
    // Thread delivery plumbing
    // ========================================================================

    pub(crate) fn install_thread(&self, tx: Sender<ThreadCmd>, handle: JoinHandle<()>) {
        let mut thread = self.thread.lock();
        thread.tx = Some(tx);
        thread.handle = Some(handle);
    }

    pub(crate) fn send_thread(&self, cmd: ThreadCmd) -> AsyncResult<()> {
        let thread = self.thread.lock();
        match &thread.tx {
            Some(tx) => tx.send(cmd).map_err(|_| AsyncError::Closed),
            None => Err(AsyncError::Closed),
        }
    }

    pub(crate) fn shutdown_thread(&self) {
        let (tx, handle) = {
            let mut thread = self.thread.lock();
            (thread.tx.take(), thread.handle.take())
        };
        if let Some(tx) = tx {
            let _ = tx.send(ThreadCmd::Shutdown);
        }
        if let Some(handle) = handle {
            // The delivery thread may itself drop the last reference
            if handle.thread().id() != std::thread::current().id() && handle.join().is_err() {
                warn!("Async delivery thread panicked");
            }
        }
    }
}

impl Drop for AsyncContext {
    fn drop(&mut self) {
        if !self.handlers.is_empty() {
            warn!(
                count = self.handlers.len(),
                "Releasing async context with registered handlers"
            );
        }
        self.ops.context_cleanup(self);
        ops::context_destroyed(self.mode);
        debug!(mode = %self.mode, "Async context released");
    }
}
