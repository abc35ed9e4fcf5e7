/*!
 * ID Generation
 * Id allocation for workers, async handlers, and timers
 */

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

// ============================================================================
// ID Generator Trait
// ============================================================================

/// Generic ID generator interface
pub trait IdGenerator<T> {
    /// Generate next ID
    fn next(&self) -> T;

    /// Recycle an ID for reuse
    fn recycle(&self, id: T);
}

// ============================================================================
// Atomic Counter Generator
// ============================================================================

/// Monotonic atomic counter, never reuses ids
///
/// # Performance
/// - Cache-line aligned to prevent false sharing
#[repr(C, align(64))]
pub struct AtomicGenerator {
    counter: Arc<AtomicU64>,
}

impl AtomicGenerator {
    #[inline]
    pub fn new(start: u64) -> Self {
        Self {
            counter: Arc::new(AtomicU64::new(start)),
        }
    }
}

impl Clone for AtomicGenerator {
    fn clone(&self) -> Self {
        Self {
            counter: Arc::clone(&self.counter),
        }
    }
}

impl IdGenerator<u64> for AtomicGenerator {
    #[inline]
    fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst)
    }

    #[inline]
    fn recycle(&self, _id: u64) {}
}

// ============================================================================
// Recycling Generator
// ============================================================================

/// ID generator with recycling support
///
/// Removed handlers and timers hand their ids back so long-running contexts
/// that churn registrations do not exhaust the id space.
pub struct RecyclingGenerator {
    counter: Arc<AtomicU32>,
    free_list: Arc<crossbeam_queue::SegQueue<u32>>,
}

impl RecyclingGenerator {
    #[inline]
    pub fn new(start: u32) -> Self {
        Self {
            counter: Arc::new(AtomicU32::new(start)),
            free_list: Arc::new(crossbeam_queue::SegQueue::new()),
        }
    }
}

impl Clone for RecyclingGenerator {
    fn clone(&self) -> Self {
        Self {
            counter: Arc::clone(&self.counter),
            free_list: Arc::clone(&self.free_list),
        }
    }
}

impl IdGenerator<u32> for RecyclingGenerator {
    #[inline]
    fn next(&self) -> u32 {
        self.free_list
            .pop()
            .unwrap_or_else(|| self.counter.fetch_add(1, Ordering::SeqCst))
    }

    #[inline]
    fn recycle(&self, id: u32) {
        self.free_list.push(id);
    }
}

/// Worker id generator (no recycling, ids only label log output)
pub type WorkerIdGenerator = AtomicGenerator;

/// Async handler / timer id generator
pub type DispatchIdGenerator = RecyclingGenerator;
