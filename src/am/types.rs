/*!
 * Active-Message Types
 */

use crate::core::errors::AmResult;
use crate::request::RequestHandle;
use crate::transport::{CB_FLAG_ASYNC, CB_FLAG_SYNC};
use serde::{Deserialize, Serialize};

/// Where a receive handler may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AmHandlerFlags(pub u32);

impl AmHandlerFlags {
    pub const NONE: AmHandlerFlags = AmHandlerFlags(0);
    /// Only inside `Worker::progress`
    pub const SYNC: AmHandlerFlags = AmHandlerFlags(1 << 0);
    /// Also from the async context, as soon as the message arrives
    pub const ASYNC: AmHandlerFlags = AmHandlerFlags(1 << 1);

    #[inline]
    pub fn contains(self, other: AmHandlerFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Transport callback flags; `ASYNC` wins when both are set
    pub fn to_transport(self) -> u32 {
        if self.contains(Self::ASYNC) {
            CB_FLAG_ASYNC
        } else if self.contains(Self::SYNC) {
            CB_FLAG_SYNC
        } else {
            0
        }
    }
}

impl std::ops::BitOr for AmHandlerFlags {
    type Output = AmHandlerFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        AmHandlerFlags(self.0 | rhs.0)
    }
}

/// Result of a send: a final status, or a request still in flight
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusPtr {
    Status(AmResult<()>),
    Request(RequestHandle),
}

impl StatusPtr {
    /// An in-flight request the caller must wait on
    #[inline]
    pub fn is_ptr(&self) -> bool {
        matches!(self, StatusPtr::Request(_))
    }

    /// A final failure
    #[inline]
    pub fn is_err(&self) -> bool {
        matches!(self, StatusPtr::Status(Err(_)))
    }

    pub fn status(&self) -> Option<&AmResult<()>> {
        match self {
            StatusPtr::Status(status) => Some(status),
            StatusPtr::Request(_) => None,
        }
    }

    pub fn request(&self) -> Option<RequestHandle> {
        match self {
            StatusPtr::Request(handle) => Some(*handle),
            StatusPtr::Status(_) => None,
        }
    }
}
