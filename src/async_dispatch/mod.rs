/*!
 * Async Dispatch Core
 *
 * Multiplexes hardware event sources and recurring timers onto callbacks,
 * delivered either by a dedicated thread or inline at the raising site.
 *
 * ## Delivery Modes
 *
 * - **Thread**: one delivery thread per context sleeps until an event is
 *   raised or the earliest timer expires
 * - **Signal**: the thread that raises an event runs the callback
 *   immediately, as if interrupted; timers are checked on each raise and on
 *   each owner poll
 *
 * Both modes honor the same blocked region: while a context is blocked,
 * dispatches are queued and run later by `check_missed`.
 */

mod context;
mod ops;
mod thread;
mod types;

pub use context::AsyncContext;
pub use ops::{DeliveryOps, SignalOps, ThreadOps, SIGNAL_OPS, THREAD_OPS};
pub use types::{
    AsyncCallback, AsyncError, AsyncHandler, AsyncResult, DeliveryMode, EventMask, HandlerKind,
};
