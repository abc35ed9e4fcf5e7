/*!
 * Delivery Thread
 * Event and timer dispatch loop for thread-mode contexts
 */

use super::context::AsyncContext;
use super::types::{AsyncError, AsyncResult};
use crate::core::limits::ASYNC_THREAD_IDLE_TIMEOUT;
use crate::core::types::EventFd;
use flume::{Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::{debug, trace};

/// Commands accepted by the delivery thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ThreadCmd {
    /// An event source became ready
    Event(EventFd),
    /// Timer table changed, recompute the next wakeup
    Rearm,
    /// Deferred dispatches became eligible
    CheckMissed,
    Shutdown,
}

pub(crate) fn spawn_delivery_thread(
    ctx: &Arc<AsyncContext>,
) -> AsyncResult<(Sender<ThreadCmd>, JoinHandle<()>)> {
    let (tx, rx) = flume::unbounded();
    let weak = Arc::downgrade(ctx);
    let handle = std::thread::Builder::new()
        .name("am-async".into())
        .spawn(move || run(weak, rx))
        .map_err(|e| AsyncError::ThreadFailed(e.to_string()))?;
    Ok((tx, handle))
}

fn run(ctx: Weak<AsyncContext>, rx: Receiver<ThreadCmd>) {
    debug!("Async delivery thread started");

    loop {
        let timeout = match ctx.upgrade() {
            Some(c) => c
                .next_timer_deadline()
                .map(|due| due.saturating_duration_since(Instant::now()))
                .unwrap_or(ASYNC_THREAD_IDLE_TIMEOUT),
            None => break,
        };

        let cmd = match rx.recv_timeout(timeout) {
            Ok(cmd) => Some(cmd),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if cmd == Some(ThreadCmd::Shutdown) {
            break;
        }

        let Some(c) = ctx.upgrade() else { break };
        match cmd {
            Some(ThreadCmd::Event(fd)) => {
                trace!(fd = fd, "Delivery thread woke for event");
                c.dispatch_event_fd(fd, true);
            }
            Some(ThreadCmd::CheckMissed) => {
                c.check_missed(true);
            }
            _ => {}
        }
        c.poll_timers(true);
    }

    debug!("Async delivery thread stopped");
}
