/*!
 * Conditional Worker Lock
 *
 * Multi-threaded workers serialize public entry points on a reentrant lock;
 * single-threaded workers skip it entirely.
 */

use super::traits::{Guard, GuardDrop};
use super::{GuardError, GuardMetadata, GuardResult};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

/// Lock that only exists when the owner is shared between threads
///
/// Reentrant so that a completion or receive callback running inside
/// `progress` may call back into `send` on the same thread.
pub struct ConditionalLock {
    inner: Option<ReentrantMutex<()>>,
}

impl ConditionalLock {
    /// Create the lock, `enabled == false` makes every `enter` a no-op
    pub fn new(enabled: bool) -> Self {
        Self {
            inner: enabled.then(|| ReentrantMutex::new(())),
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Enter the critical section
    #[inline]
    pub fn enter(&self) -> WorkerLockGuard<'_> {
        WorkerLockGuard {
            guard: self.inner.as_ref().map(|m| m.lock()),
            metadata: GuardMetadata::new("worker_lock"),
        }
    }

    /// Enter without waiting, `None` if another thread holds the lock
    pub fn try_enter(&self) -> Option<WorkerLockGuard<'_>> {
        let guard = match &self.inner {
            Some(m) => Some(m.try_lock()?),
            None => None,
        };
        Some(WorkerLockGuard {
            guard,
            metadata: GuardMetadata::new("worker_lock"),
        })
    }
}

/// Scoped hold of a [`ConditionalLock`]
pub struct WorkerLockGuard<'a> {
    guard: Option<ReentrantMutexGuard<'a, ()>>,
    metadata: GuardMetadata,
}

impl WorkerLockGuard<'_> {
    /// Whether a real lock is held (false for single-threaded workers)
    #[inline]
    pub fn is_held(&self) -> bool {
        self.guard.is_some()
    }
}

impl Guard for WorkerLockGuard<'_> {
    fn resource_type(&self) -> &'static str {
        "worker_lock"
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.guard.is_some()
    }

    fn release(&mut self) -> GuardResult<()> {
        if self.guard.take().is_some() {
            Ok(())
        } else {
            Err(GuardError::AlreadyReleased)
        }
    }
}

impl GuardDrop for WorkerLockGuard<'_> {
    fn on_drop(&mut self) {
        self.guard = None;
    }
}

impl Drop for WorkerLockGuard<'_> {
    fn drop(&mut self) {
        self.on_drop();
    }
}
