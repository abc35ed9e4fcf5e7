/*!
 * RAII Resource Guards
 *
 * Scoped acquisition of the engine's two critical regions, released on every
 * exit path including early returns and `?` propagation.
 *
 * ## Guard Types
 *
 * - **WorkerLockGuard**: the worker's conditional multi-thread lock
 * - **AsyncBlockGuard**: one level of an async context's blocked region
 *
 * ## Example
 *
 * ```ignore
 * let _mt = worker_lock.enter();      // no-op for single-threaded workers
 * let _block = async_ctx.block();     // no event/timer callback runs until drop
 * for iface in ifaces {
 *     iface.set_am_handler(id, handler.clone(), flags)?;
 * }
 * // `_block` drops first, then `_mt`
 * ```
 */

mod block;
mod lock;
mod traits;

pub use block::AsyncBlockGuard;
pub use lock::{ConditionalLock, WorkerLockGuard};
pub use traits::{Guard, GuardDrop};

/// Result type for guard operations
pub type GuardResult<T> = Result<T, GuardError>;

/// Errors that can occur during guard operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum GuardError {
    #[error("Resource already released")]
    AlreadyReleased,
}

/// Guard metadata for observability
#[derive(Debug, Clone)]
pub struct GuardMetadata {
    pub resource_type: &'static str,
    pub creation_time: std::time::Instant,
}

impl GuardMetadata {
    #[inline]
    pub fn new(resource_type: &'static str) -> Self {
        Self {
            resource_type,
            creation_time: std::time::Instant::now(),
        }
    }

    #[inline]
    pub fn lifetime_micros(&self) -> u64 {
        self.creation_time.elapsed().as_micros() as u64
    }
}
