/*!
 * Core Types
 * Common types used across the engine
 */

use super::errors::{AmError, AmResult};
use super::limits::{AM_ID_MAX, AM_ID_RESERVED};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lane index on an endpoint
pub type Lane = usize;

/// Hardware event descriptor (file-descriptor-like)
pub type EventFd = i32;

/// Id of a handler registered with an async context
pub type DispatchId = u32;

/// Id of a recurring timer registered with an async context
pub type TimerId = u32;

/// Active-message id as seen by applications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AmId(pub u8);

/// Active-message id as handed to transports, offset past the reserved range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireAmId(pub u8);

impl AmId {
    /// Largest id applications may use
    pub const MAX: AmId = AmId(AM_ID_MAX - 1 - AM_ID_RESERVED);

    #[inline]
    pub fn is_valid(self) -> bool {
        self <= Self::MAX
    }

    /// Translate to the transport id space
    ///
    /// Ids outside the public range are rejected before any arithmetic, so a
    /// public id can never alias one of the reserved system ids.
    pub fn to_wire(self) -> AmResult<WireAmId> {
        if !self.is_valid() {
            return Err(AmError::InvalidParameter(format!(
                "active message id {} out of range [0, {}]",
                self.0,
                Self::MAX.0
            )));
        }
        Ok(WireAmId(self.0 + AM_ID_RESERVED))
    }
}

impl WireAmId {
    /// Translate back to the public id space, `None` for reserved ids
    pub fn to_public(self) -> Option<AmId> {
        if self.0 < AM_ID_RESERVED || self.0 >= AM_ID_MAX {
            return None;
        }
        Some(AmId(self.0 - AM_ID_RESERVED))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for WireAmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
