/*!
 * Transport Traits
 *
 * The boundary to hardware transports. Drivers implement these; the engine
 * only ever talks to transports through them.
 */

use super::types::{AmHandler, EventNotifier, IfaceAttr, ZcopyCompletion, ZcopyStatus};
use crate::core::errors::AmResult;
use crate::core::types::{EventFd, WireAmId};
use bytes::Bytes;

/// A connection to one peer over one transport interface
pub trait TransportEp: Send + Sync {
    /// Inline send: `header` followed by `payload`, copied into the descriptor
    ///
    /// `Err(NoResources)` is transient.
    fn am_short(&self, id: WireAmId, header: u64, payload: &[u8]) -> AmResult<()>;

    /// Buffered-copy send: `pack` fills the transport's staging buffer and
    /// returns how many bytes it wrote
    fn am_bcopy(&self, id: WireAmId, pack: &mut dyn FnMut(&mut [u8]) -> usize)
        -> AmResult<usize>;

    /// Zero-copy send of `payload` behind `header`
    ///
    /// `Ok(ZcopyStatus::InProgress)` means `comp` will be invoked once the
    /// transport no longer reads `payload`; `Ok(ZcopyStatus::Done)` means it
    /// never will be.
    fn am_zcopy(
        &self,
        id: WireAmId,
        header: &[u8],
        payload: Bytes,
        comp: ZcopyCompletion,
    ) -> AmResult<ZcopyStatus>;

    /// Capabilities of the interface this endpoint belongs to
    fn iface_attr(&self) -> IfaceAttr;
}

/// A transport interface owned by a worker
pub trait TransportIface: Send + Sync {
    fn name(&self) -> &str;

    fn attr(&self) -> IfaceAttr;

    /// Install the receive handler for `id`; `flags` uses the transport's
    /// `CB_FLAG_*` vocabulary
    fn set_am_handler(&self, id: WireAmId, handler: AmHandler, flags: u32) -> AmResult<()>;

    /// Deliver pending receives and send completions on the owning thread
    fn progress(&self) -> usize;

    /// Deliver receives whose handlers accept async context
    fn progress_async(&self) -> usize;

    /// Event source signaled when work arrives, if the interface has one
    fn event_fd(&self) -> Option<EventFd>;

    /// Route event notifications to an async context
    fn arm(&self, notifier: EventNotifier);
}
