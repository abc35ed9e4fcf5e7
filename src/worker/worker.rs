/*!
 * Worker
 *
 * Owns the transport interfaces, the async context, the request pool and the
 * queues that progress drains. Cloning a `Worker` shares it.
 */

use super::config::WorkerConfig;
use crate::am::{AmHandlerFlags, StatusPtr};
use crate::async_dispatch::{AsyncContext, EventMask};
use crate::core::errors::{status_string, AmError, AmResult};
use crate::core::guard::ConditionalLock;
use crate::core::id::{IdGenerator, WorkerIdGenerator};
use crate::core::limits::AM_ID_MAX;
use crate::core::types::{AmId, DispatchId, WireAmId};
use crate::monitoring::span_operation;
use crate::request::{
    completion, CompletionQueue, Request, RequestHandle, RequestPool, RequestState, SendCallback,
};
use crate::transport::{AmHandler, EventNotifier, RecvFlags, RecvStatus, TransportIface};
use bytes::Bytes;
use crossbeam_queue::SegQueue;
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, OnceLock, Weak};
use tracing::{debug, info, trace, warn};

fn worker_ids() -> &'static WorkerIdGenerator {
    static IDS: OnceLock<WorkerIdGenerator> = OnceLock::new();
    IDS.get_or_init(|| WorkerIdGenerator::new(1))
}

struct WorkerInner {
    id: u64,
    config: WorkerConfig,
    ifaces: RwLock<Vec<Arc<dyn TransportIface>>>,
    iface_events: Mutex<Vec<DispatchId>>,
    /// Installed receive handlers by wire id, replayed onto late interfaces
    am_handlers: Mutex<Vec<Option<(AmHandler, u32)>>>,
    async_ctx: Arc<AsyncContext>,
    mt_lock: ConditionalLock,
    pool: RequestPool,
    pending: SegQueue<RequestHandle>,
    completions: Arc<CompletionQueue>,
}

/// Communication worker
#[derive(Clone)]
pub struct Worker {
    inner: Arc<WorkerInner>,
}

impl Worker {
    pub fn new(config: WorkerConfig) -> AmResult<Self> {
        config.validate()?;
        let async_ctx = AsyncContext::new(config.async_mode)?;
        let id = worker_ids().next();

        info!(
            worker = id,
            async_mode = %config.async_mode,
            thread_mode = %config.thread_mode,
            pool = config.request_pool_size,
            "Worker created"
        );

        Ok(Self {
            inner: Arc::new(WorkerInner {
                id,
                mt_lock: ConditionalLock::new(config.thread_mode.is_multi()),
                pool: RequestPool::new(config.request_pool_size),
                config,
                ifaces: RwLock::new(Vec::new()),
                iface_events: Mutex::new(Vec::new()),
                am_handlers: Mutex::new(vec![None; AM_ID_MAX as usize]),
                async_ctx,
                pending: SegQueue::new(),
                completions: Arc::new(CompletionQueue::new()),
            }),
        })
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.inner.config
    }

    pub fn async_context(&self) -> &Arc<AsyncContext> {
        &self.inner.async_ctx
    }

    pub fn mt_lock(&self) -> &ConditionalLock {
        &self.inner.mt_lock
    }

    pub fn request_pool(&self) -> &RequestPool {
        &self.inner.pool
    }

    pub(crate) fn completions(&self) -> Arc<CompletionQueue> {
        Arc::clone(&self.inner.completions)
    }

    pub fn iface(&self, index: usize) -> Option<Arc<dyn TransportIface>> {
        self.inner.ifaces.read().get(index).cloned()
    }

    pub fn iface_count(&self) -> usize {
        self.inner.ifaces.read().len()
    }

    /// Requests waiting for another send step
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Attach a transport interface
    ///
    /// Its event source, if any, is registered with the async context so
    /// arriving messages reach async-capable handlers without waiting for
    /// `progress`. Handlers installed earlier are installed on it too.
    pub fn add_iface(&self, iface: Arc<dyn TransportIface>) -> AmResult<usize> {
        let span = span_operation("add_iface", self.inner.id);
        let _entered = span.enter();
        let _lock = self.inner.mt_lock.enter();
        let _block = self.inner.async_ctx.block();

        for (wire, entry) in self.inner.am_handlers.lock().iter().enumerate() {
            if let Some((handler, flags)) = entry {
                iface.set_am_handler(WireAmId(wire as u8), Arc::clone(handler), *flags)?;
            }
        }

        if let Some(fd) = iface.event_fd() {
            let weak: Weak<dyn TransportIface> = Arc::downgrade(&iface);
            let id = self
                .inner
                .async_ctx
                .set_event_handler(fd, EventMask::READ, move |_| {
                    if let Some(iface) = weak.upgrade() {
                        iface.progress_async();
                    }
                })?;
            iface.arm(EventNotifier::new(&self.inner.async_ctx, fd));
            self.inner.iface_events.lock().push(id);
        }

        let mut ifaces = self.inner.ifaces.write();
        ifaces.push(Arc::clone(&iface));
        debug!(worker = self.inner.id, iface = iface.name(), "Interface attached");
        Ok(ifaces.len() - 1)
    }

    /// Install a receive handler for `id` on every interface
    ///
    /// Holds the worker lock and an async block for the whole update, so no
    /// async delivery observes a partially installed handler. Every interface
    /// is tried and the handler is recorded for interfaces attached later even
    /// when one of them refuses it; the first refusal is returned.
    pub fn set_am_handler<F>(&self, id: AmId, callback: F, flags: AmHandlerFlags) -> AmResult<()>
    where
        F: Fn(&Bytes, RecvFlags) -> RecvStatus + Send + Sync + 'static,
    {
        let span = span_operation("set_am_handler", self.inner.id);
        let _entered = span.enter();
        let _lock = self.inner.mt_lock.enter();
        let _block = self.inner.async_ctx.block();

        let wire = id.to_wire()?;
        let handler: AmHandler = Arc::new(callback);
        let tl_flags = flags.to_transport();

        let mut status = Ok(());
        for iface in self.inner.ifaces.read().iter() {
            if let Err(e) = iface.set_am_handler(wire, Arc::clone(&handler), tl_flags) {
                warn!(worker = self.inner.id, iface = iface.name(), id = %id, error = %e, "Interface refused active message handler");
                if status.is_ok() {
                    status = Err(e);
                }
            }
        }
        if let Some(slot) = self.inner.am_handlers.lock().get_mut(wire.index()) {
            *slot = Some((handler, tl_flags));
        }

        match &status {
            Ok(()) => debug!(worker = self.inner.id, id = %id, wire = %wire, flags = tl_flags, "Active message handler installed"),
            Err(e) => span.record_error(&e.to_string()),
        }
        status
    }

    /// Launch a started request: run its first step and either collapse it
    /// into a status or hand back its handle
    pub(crate) fn launch(&self, mut req: Box<Request>, callback: Option<SendCallback>) -> StatusPtr {
        req.progress();

        if req.is_completed() {
            let status = req.status();
            trace!(
                req = %req.handle(),
                status = status_string(&status),
                "Releasing send request, returning status"
            );
            self.inner.pool.release(req);
            return StatusPtr::Status(status);
        }

        if let Some(callback) = callback {
            req.set_callback(callback);
        }
        let handle = req.handle();
        let posted = req.is_posted();
        self.inner.pool.checkin(req);
        if !posted {
            self.inner.pending.push(handle);
        }
        trace!(req = %handle, posted = posted, "Returning send request");
        StatusPtr::Request(handle)
    }

    /// Whether a request handed out by a send is still in flight
    ///
    /// Completed requests are retired immediately, so a finished handle
    /// reports `Completed` and its status went to the callback.
    pub fn request_check_status(&self, handle: RequestHandle) -> RequestState {
        if self.inner.pool.is_live(handle) {
            RequestState::Pending
        } else {
            RequestState::Completed
        }
    }

    /// Advance all outstanding work by one step
    ///
    /// Runs missed async dispatches, progresses every interface, retries
    /// pending sends and delivers finished ones. Returns the amount of work
    /// done, zero when idle.
    pub fn progress(&self) -> usize {
        let _lock = self.inner.mt_lock.enter();

        let mut count = self.inner.async_ctx.poll();
        let ifaces: Vec<Arc<dyn TransportIface>> = self.inner.ifaces.read().clone();
        for iface in &ifaces {
            count += iface.progress();
        }
        count += self.progress_pending();
        count += self.drain_completions();
        count
    }

    fn progress_pending(&self) -> usize {
        let mut count = 0;
        for _ in 0..self.inner.pending.len() {
            let handle = match self.inner.pending.pop() {
                Some(handle) => handle,
                None => break,
            };
            let mut req = match self.inner.pool.checkout(handle) {
                Some(req) => req,
                None => continue,
            };

            req.progress();
            if req.is_completed() {
                completion::deliver(&self.inner.pool, req);
                count += 1;
            } else if req.is_posted() {
                self.inner.pool.checkin(req);
                count += 1;
            } else {
                self.inner.pool.checkin(req);
                self.inner.pending.push(handle);
            }
        }
        count
    }

    fn drain_completions(&self) -> usize {
        let mut count = 0;
        for _ in 0..self.inner.completions.len() {
            let (handle, status) = match self.inner.completions.pop() {
                Some(entry) => entry,
                None => break,
            };
            let mut req = match self.inner.pool.checkout(handle) {
                Some(req) => req,
                None if self.inner.pool.is_live(handle) => {
                    // Still being launched on another thread
                    self.inner.completions.push(handle, status);
                    continue;
                }
                None => {
                    warn!(req = %handle, "Completion for retired request dropped");
                    continue;
                }
            };

            match req.send_mut().ok().and_then(|send| send.proto) {
                Some(proto) => proto.zcopy_completion(&mut req, status),
                None => req.complete(status),
            }
            completion::deliver(&self.inner.pool, req);
            count += 1;
        }
        count
    }

    /// Drive progress until `handle` finishes or `max_iters` progress calls
    /// have run; returns whether it finished
    pub fn wait(&self, handle: RequestHandle, max_iters: usize) -> bool {
        for _ in 0..max_iters {
            if self.request_check_status(handle) == RequestState::Completed {
                return true;
            }
            self.progress();
        }
        self.request_check_status(handle) == RequestState::Completed
    }

    pub(crate) fn take_request(&self) -> AmResult<Box<Request>> {
        let handle = self.inner.pool.get()?;
        self.inner.pool.checkout(handle).ok_or_else(|| {
            AmError::Internal(format!("{} vanished after allocation", handle))
        })
    }

    pub(crate) fn release_request(&self, req: Box<Request>) {
        self.inner.pool.release(req);
    }
}

impl Drop for WorkerInner {
    fn drop(&mut self) {
        for id in self.iface_events.lock().drain(..) {
            if let Err(e) = self.async_ctx.remove_handler(id) {
                warn!(worker = self.id, error = %e, "Failed to remove interface event handler");
            }
        }
        let in_use = self.pool.in_use();
        if in_use > 0 {
            warn!(worker = self.id, requests = in_use, "Worker released with requests in flight");
        }
        info!(worker = self.id, "Worker destroyed");
    }
}
