/*!
 * Protocol Selection
 * Size-driven choice of wire encoding
 */

use crate::core::limits::DEFAULT_ZCOPY_THRESHOLD;
use crate::datatype::Datatype;
use crate::transport::IfaceAttr;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation slot chosen for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendOp {
    ContigShort,
    BcopySingle,
    BcopyMulti,
    ZcopySingle,
    ZcopyMulti,
}

impl SendOp {
    #[inline]
    pub fn is_multi(self) -> bool {
        matches!(self, SendOp::BcopyMulti | SendOp::ZcopyMulti)
    }

    #[inline]
    pub fn is_zcopy(self) -> bool {
        matches!(self, SendOp::ZcopySingle | SendOp::ZcopyMulti)
    }

    pub fn name(self) -> &'static str {
        match self {
            SendOp::ContigShort => "contig_short",
            SendOp::BcopySingle => "bcopy_single",
            SendOp::BcopyMulti => "bcopy_multi",
            SendOp::ZcopySingle => "zcopy_single",
            SendOp::ZcopyMulti => "zcopy_multi",
        }
    }
}

impl fmt::Display for SendOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-endpoint message limits for one message category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgConfig {
    /// Largest payload sent inline; negative disables the inline path
    pub max_short: isize,
    pub max_bcopy: usize,
    pub max_zcopy: usize,
    /// Payloads of this size and above go zero-copy; `None` never does
    pub zcopy_thresh: Option<usize>,
}

impl MsgConfig {
    /// Limits of a lane's interface, with an optional threshold override
    pub fn from_attr(attr: &IfaceAttr, zcopy_override: Option<usize>) -> Self {
        Self {
            max_short: isize::try_from(attr.max_short).unwrap_or(isize::MAX),
            max_bcopy: attr.max_bcopy,
            max_zcopy: attr.max_zcopy,
            zcopy_thresh: Some(
                zcopy_override
                    .or(attr.zcopy_threshold)
                    .unwrap_or(DEFAULT_ZCOPY_THRESHOLD),
            ),
        }
    }

    /// Inline limit for a request of this datatype
    ///
    /// Only contiguous data can be sent inline.
    #[inline]
    pub fn short_max(&self, datatype: &Datatype) -> isize {
        if datatype.is_contig() {
            self.max_short
        } else {
            -1
        }
    }

    /// Zero-copy threshold for a request of this datatype
    ///
    /// Generic datatypes are packed, so they never go zero-copy.
    #[inline]
    pub fn zcopy_threshold(&self, datatype: &Datatype) -> Option<usize> {
        if datatype.is_contig() {
            self.zcopy_thresh
        } else {
            None
        }
    }
}

/// `length` fits under a signed inline limit
#[inline]
pub fn fits_short(length: usize, max_short: isize) -> bool {
    isize::try_from(length).map_or(false, |l| l <= max_short)
}

/// Pick the operation slot for a payload of `length` bytes
pub fn select(
    length: usize,
    max_short: isize,
    zcopy_thresh: Option<usize>,
    msg: &MsgConfig,
    only_hdr_size: usize,
) -> SendOp {
    if fits_short(length, max_short) {
        return SendOp::ContigShort;
    }

    let below_zcopy = zcopy_thresh.map_or(true, |thresh| length < thresh);
    if below_zcopy {
        if length <= msg.max_bcopy.saturating_sub(only_hdr_size) {
            SendOp::BcopySingle
        } else {
            SendOp::BcopyMulti
        }
    } else if length <= msg.max_zcopy.saturating_sub(only_hdr_size) {
        SendOp::ZcopySingle
    } else {
        SendOp::ZcopyMulti
    }
}
