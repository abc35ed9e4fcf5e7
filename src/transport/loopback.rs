/*!
 * Loopback Transport
 *
 * In-process transport connecting interfaces through receive queues. Frames
 * are queued on the peer interface and handed to its handlers when the
 * peer progresses, either from its owner thread or from its async context.
 *
 * Capacity is bounded by the receive queue depth, and `NoResources` can be
 * injected, so every retry path of the send engine is reachable.
 */

use super::traits::{TransportEp, TransportIface};
use super::types::{
    AmHandler, EventNotifier, IfaceAttr, RecvFlags, RecvStatus, ZcopyCompletion, ZcopyStatus,
    CB_FLAG_ASYNC, RECV_FLAG_DESC,
};
use crate::core::errors::{AmError, AmResult};
use crate::core::limits::{
    AM_ID_MAX, AM_SHORT_HEADER_SIZE, LOOPBACK_MAX_BCOPY, LOOPBACK_MAX_SHORT, LOOPBACK_MAX_ZCOPY,
    LOOPBACK_RX_DEPTH,
};
use crate::core::types::{EventFd, WireAmId};
use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

static NEXT_EVENT_FD: AtomicI32 = AtomicI32::new(100);

/// Loopback interface configuration
#[derive(Debug, Clone, Copy)]
pub struct LoopbackConfig {
    pub attr: IfaceAttr,
    /// Frames a receiver queues before senders see `NoResources`
    pub rx_depth: usize,
    /// Complete zero-copy sends on the sender's next progress instead of
    /// immediately
    pub deferred_zcopy: bool,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            attr: IfaceAttr {
                max_short: LOOPBACK_MAX_SHORT,
                max_bcopy: LOOPBACK_MAX_BCOPY,
                max_zcopy: LOOPBACK_MAX_ZCOPY,
                zcopy_threshold: None,
            },
            rx_depth: LOOPBACK_RX_DEPTH,
            deferred_zcopy: true,
        }
    }
}

/// How a frame was put on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Short,
    Bcopy,
    Zcopy,
}

#[derive(Debug, Clone)]
struct Frame {
    id: WireAmId,
    kind: FrameKind,
    data: Bytes,
}

#[derive(Clone)]
struct HandlerEntry {
    handler: AmHandler,
    flags: u32,
}

/// Per-interface counters
#[derive(Debug, Default)]
struct Counters {
    short: AtomicU64,
    bcopy: AtomicU64,
    zcopy: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    no_resource: AtomicU64,
}

/// Snapshot of interface counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopbackStats {
    /// Frames sent from this interface, by kind
    pub short_sent: u64,
    pub bcopy_sent: u64,
    pub zcopy_sent: u64,
    /// Frames handed to a handler on this interface
    pub delivered: u64,
    /// Frames received for an id with no handler
    pub dropped: u64,
    /// Sends from this interface refused with `NoResources`
    pub no_resource: u64,
}

impl LoopbackStats {
    pub fn total_sent(&self) -> u64 {
        self.short_sent + self.bcopy_sent + self.zcopy_sent
    }
}

/// Loopback transport interface
pub struct LoopbackIface {
    name: String,
    config: LoopbackConfig,
    fd: EventFd,
    rx: Mutex<VecDeque<Frame>>,
    handlers: RwLock<Vec<Option<HandlerEntry>>>,
    zcopy_done: Mutex<VecDeque<ZcopyCompletion>>,
    notifier: Mutex<Option<EventNotifier>>,
    fail_next: AtomicUsize,
    last_frame: Mutex<Option<(FrameKind, Bytes)>>,
    counters: Counters,
}

impl LoopbackIface {
    pub fn new(name: impl Into<String>, config: LoopbackConfig) -> Arc<Self> {
        let name = name.into();
        let fd = NEXT_EVENT_FD.fetch_add(1, Ordering::Relaxed);
        debug!(iface = %name, fd = fd, "Loopback interface created");
        Arc::new(Self {
            name,
            config,
            fd,
            rx: Mutex::new(VecDeque::with_capacity(config.rx_depth)),
            handlers: RwLock::new(vec![None; AM_ID_MAX as usize]),
            zcopy_done: Mutex::new(VecDeque::new()),
            notifier: Mutex::new(None),
            fail_next: AtomicUsize::new(0),
            last_frame: Mutex::new(None),
            counters: Counters::default(),
        })
    }

    pub fn with_defaults(name: impl Into<String>) -> Arc<Self> {
        Self::new(name, LoopbackConfig::default())
    }

    /// Connect to `peer`; frames sent on the endpoint land on `peer`
    pub fn connect(self: &Arc<Self>, peer: &Arc<LoopbackIface>) -> Arc<LoopbackEp> {
        Arc::new(LoopbackEp {
            local: Arc::clone(self),
            peer: Arc::clone(peer),
        })
    }

    /// Refuse the next `n` sends from this interface with `NoResources`
    pub fn inject_no_resource(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Frames waiting for a handler
    pub fn rx_pending(&self) -> usize {
        self.rx.lock().len()
    }

    /// Zero-copy sends posted but not yet completed
    pub fn zcopy_pending(&self) -> usize {
        self.zcopy_done.lock().len()
    }

    /// Last frame this interface put on the wire, for framing checks
    pub fn last_sent_frame(&self) -> Option<(FrameKind, Bytes)> {
        self.last_frame.lock().clone()
    }

    pub fn stats(&self) -> LoopbackStats {
        let c = &self.counters;
        LoopbackStats {
            short_sent: c.short.load(Ordering::Relaxed),
            bcopy_sent: c.bcopy.load(Ordering::Relaxed),
            zcopy_sent: c.zcopy.load(Ordering::Relaxed),
            delivered: c.delivered.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            no_resource: c.no_resource.load(Ordering::Relaxed),
        }
    }

    fn take_injected_failure(&self) -> bool {
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Sender-side admission: injected failure or a full peer queue
    fn admit(&self, peer: &LoopbackIface) -> AmResult<()> {
        if self.take_injected_failure() || peer.rx.lock().len() >= peer.config.rx_depth {
            self.counters.no_resource.fetch_add(1, Ordering::Relaxed);
            return Err(AmError::NoResources);
        }
        Ok(())
    }

    fn record_sent(&self, kind: FrameKind, data: &Bytes) {
        let counter = match kind {
            FrameKind::Short => &self.counters.short,
            FrameKind::Bcopy => &self.counters.bcopy,
            FrameKind::Zcopy => &self.counters.zcopy,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        *self.last_frame.lock() = Some((kind, data.clone()));
    }

    fn enqueue(&self, frame: Frame) {
        trace!(iface = %self.name, id = %frame.id, len = frame.data.len(), "Frame queued");
        self.rx.lock().push_back(frame);
        let notifier = self.notifier.lock().clone();
        if let Some(notifier) = notifier {
            notifier.notify();
        }
    }

    /// Hand queued frames to handlers; `async_only` leaves frames for
    /// sync-only handlers in the queue
    fn deliver(&self, async_only: bool) -> usize {
        let ready: Vec<(Frame, Option<HandlerEntry>)> = {
            let handlers = self.handlers.read();
            let mut rx = self.rx.lock();
            let mut ready = Vec::with_capacity(rx.len());
            let mut kept = VecDeque::new();
            while let Some(frame) = rx.pop_front() {
                let entry = handlers.get(frame.id.index()).cloned().flatten();
                let eligible = match &entry {
                    Some(e) => !async_only || e.flags & CB_FLAG_ASYNC != 0,
                    None => true,
                };
                if eligible {
                    ready.push((frame, entry));
                } else {
                    kept.push_back(frame);
                }
            }
            *rx = kept;
            ready
        };

        let mut count = 0;
        for (frame, entry) in ready {
            match entry {
                Some(entry) => {
                    let flags = match frame.kind {
                        FrameKind::Short => RecvFlags::default(),
                        _ => RecvFlags(RECV_FLAG_DESC),
                    };
                    if (entry.handler)(&frame.data, flags) == RecvStatus::Retained {
                        trace!(id = %frame.id, "Receive handler retained data");
                    }
                    self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                    count += 1;
                }
                None => {
                    warn!(iface = %self.name, id = %frame.id, "Active message with no handler dropped");
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        count
    }

    fn complete_zcopy(&self) -> usize {
        let done: Vec<ZcopyCompletion> = self.zcopy_done.lock().drain(..).collect();
        let count = done.len();
        for comp in done {
            comp(Ok(()));
        }
        count
    }
}

impl TransportIface for LoopbackIface {
    fn name(&self) -> &str {
        &self.name
    }

    fn attr(&self) -> IfaceAttr {
        self.config.attr
    }

    fn set_am_handler(&self, id: WireAmId, handler: AmHandler, flags: u32) -> AmResult<()> {
        let mut handlers = self.handlers.write();
        let slot = handlers.get_mut(id.index()).ok_or_else(|| {
            AmError::InvalidParameter(format!("active message id {} out of range", id))
        })?;
        *slot = Some(HandlerEntry { handler, flags });
        debug!(iface = %self.name, id = %id, flags = flags, "Active message handler set");
        Ok(())
    }

    fn progress(&self) -> usize {
        self.complete_zcopy() + self.deliver(false)
    }

    fn progress_async(&self) -> usize {
        self.deliver(true)
    }

    fn event_fd(&self) -> Option<EventFd> {
        Some(self.fd)
    }

    fn arm(&self, notifier: EventNotifier) {
        *self.notifier.lock() = Some(notifier);
    }
}

/// Loopback endpoint: sends from `local` land on `peer`
pub struct LoopbackEp {
    local: Arc<LoopbackIface>,
    peer: Arc<LoopbackIface>,
}

impl LoopbackEp {
    pub fn local(&self) -> &Arc<LoopbackIface> {
        &self.local
    }

    pub fn peer(&self) -> &Arc<LoopbackIface> {
        &self.peer
    }
}

impl TransportEp for LoopbackEp {
    fn am_short(&self, id: WireAmId, header: u64, payload: &[u8]) -> AmResult<()> {
        let total = AM_SHORT_HEADER_SIZE + payload.len();
        if total > self.local.config.attr.max_short {
            return Err(AmError::InvalidParameter(format!(
                "short message of {} bytes exceeds {}",
                total, self.local.config.attr.max_short
            )));
        }
        self.local.admit(&self.peer)?;

        let mut buf = BytesMut::with_capacity(total);
        buf.put_slice(&header.to_ne_bytes());
        buf.put_slice(payload);
        let data = buf.freeze();

        self.local.record_sent(FrameKind::Short, &data);
        self.peer.enqueue(Frame {
            id,
            kind: FrameKind::Short,
            data,
        });
        Ok(())
    }

    fn am_bcopy(
        &self,
        id: WireAmId,
        pack: &mut dyn FnMut(&mut [u8]) -> usize,
    ) -> AmResult<usize> {
        self.local.admit(&self.peer)?;

        let mut staging = vec![0u8; self.local.config.attr.max_bcopy];
        let packed = pack(&mut staging);
        if packed > staging.len() {
            return Err(AmError::Internal(format!(
                "pack reported {} bytes into a {} byte buffer",
                packed,
                staging.len()
            )));
        }
        staging.truncate(packed);
        let data = Bytes::from(staging);

        self.local.record_sent(FrameKind::Bcopy, &data);
        self.peer.enqueue(Frame {
            id,
            kind: FrameKind::Bcopy,
            data,
        });
        Ok(packed)
    }

    fn am_zcopy(
        &self,
        id: WireAmId,
        header: &[u8],
        payload: Bytes,
        comp: ZcopyCompletion,
    ) -> AmResult<ZcopyStatus> {
        let total = header.len() + payload.len();
        if total > self.local.config.attr.max_zcopy {
            return Err(AmError::InvalidParameter(format!(
                "zero-copy message of {} bytes exceeds {}",
                total, self.local.config.attr.max_zcopy
            )));
        }
        self.local.admit(&self.peer)?;

        let data = if header.is_empty() {
            payload
        } else {
            let mut buf = BytesMut::with_capacity(total);
            buf.put_slice(header);
            buf.put_slice(&payload);
            buf.freeze()
        };

        self.local.record_sent(FrameKind::Zcopy, &data);
        self.peer.enqueue(Frame {
            id,
            kind: FrameKind::Zcopy,
            data,
        });

        if self.local.config.deferred_zcopy {
            self.local.zcopy_done.lock().push_back(comp);
            Ok(ZcopyStatus::InProgress)
        } else {
            Ok(ZcopyStatus::Done)
        }
    }

    fn iface_attr(&self) -> IfaceAttr {
        self.local.config.attr
    }
}
