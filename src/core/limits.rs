/*!
 * System Limits and Constants
 *
 * Centralized location for the engine's limits, thresholds, and defaults.
 * Organized by domain.
 */

use std::time::Duration;

// =============================================================================
// ACTIVE MESSAGE ID SPACE
// =============================================================================

/// Number of active-message ids a transport interface supports
pub const AM_ID_MAX: u8 = 32;

/// Ids below this value are used by the engine's own protocols
/// Public ids are offset past them before reaching a transport
pub const AM_ID_RESERVED: u8 = 24;

/// Size of the inline header carved from the front of a short payload
pub const AM_SHORT_HEADER_SIZE: usize = std::mem::size_of::<u64>();

// =============================================================================
// REQUEST POOL
// =============================================================================

/// Default number of requests a worker may have in flight
pub const DEFAULT_REQUEST_POOL_CAPACITY: usize = 1024;

// =============================================================================
// PROTOCOL THRESHOLDS
// =============================================================================

/// Default zero-copy threshold when neither config nor transport provides one
/// [PERF] Below this, copying through a staging buffer beats registration cost
pub const DEFAULT_ZCOPY_THRESHOLD: usize = 8 * 1024;

// =============================================================================
// LOOPBACK TRANSPORT DEFAULTS
// =============================================================================

/// Largest inline payload on the loopback transport
pub const LOOPBACK_MAX_SHORT: usize = 64;

/// Largest single buffered-copy fragment on the loopback transport
pub const LOOPBACK_MAX_BCOPY: usize = 8 * 1024;

/// Largest single zero-copy fragment on the loopback transport
pub const LOOPBACK_MAX_ZCOPY: usize = 64 * 1024;

/// Receive queue depth before senders see `NoResources`
pub const LOOPBACK_RX_DEPTH: usize = 256;

// =============================================================================
// ASYNC DELIVERY
// =============================================================================

/// Idle wakeup for the delivery thread when no timer is armed
pub const ASYNC_THREAD_IDLE_TIMEOUT: Duration = Duration::from_millis(100);

/// Smallest accepted timer interval
pub const ASYNC_MIN_TIMER_INTERVAL: Duration = Duration::from_micros(1);
