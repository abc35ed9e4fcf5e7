/*!
 * Request Types
 */

use crate::core::errors::AmResult;
use std::fmt;

/// Handle to a pooled request
///
/// The generation changes every time the slot is retired, so a handle kept
/// after completion never refers to a later request in the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl RequestHandle {
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req#{}.{}", self.index, self.generation)
    }
}

/// Lifecycle of a send request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Taken from the pool, selector not yet run
    Uninitialized,
    /// Waiting for a step to succeed or a posted send to finish
    Pending,
    Completed,
}

/// Request completion flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestFlags(pub u32);

impl RequestFlags {
    pub const COMPLETED: u32 = 1 << 0;
    /// A completion callback is installed
    pub const CALLBACK: u32 = 1 << 1;

    #[inline]
    pub fn contains(self, flag: u32) -> bool {
        self.0 & flag != 0
    }

    #[inline]
    pub fn set(&mut self, flag: u32) {
        self.0 |= flag;
    }
}

/// Result of one send step as reported by a protocol slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// The data is on the wire and the buffer may be reused
    Done,
    /// Posted; completion arrives through the completion queue
    InProgress,
}

/// Send completion callback, invoked once with the final status
pub type SendCallback = Box<dyn FnOnce(RequestHandle, AmResult<()>) + Send>;
