/*!
 * Transport Layer
 *
 * Capability-described interfaces and endpoints the engine sends through,
 * plus an in-process loopback implementation.
 */

pub mod loopback;
mod traits;
mod types;

pub use loopback::{FrameKind, LoopbackConfig, LoopbackEp, LoopbackIface, LoopbackStats};
pub use traits::{TransportEp, TransportIface};
pub use types::{
    AmHandler, EventNotifier, IfaceAttr, RecvFlags, RecvStatus, ZcopyCompletion, ZcopyStatus,
    CB_FLAG_ASYNC, CB_FLAG_SYNC, RECV_FLAG_DESC,
};
