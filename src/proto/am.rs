/*!
 * Active-Message Protocol
 * Single-fragment active messages over short, bcopy and zcopy sends
 */

use super::Proto;
use crate::core::errors::{AmError, AmResult};
use crate::core::limits::AM_SHORT_HEADER_SIZE;
use crate::request::{Request, SendState, StepStatus};
use crate::transport::ZcopyStatus;
use tracing::{trace, warn};

/// Descriptor for active messages
pub struct AmProto;

pub static AM_PROTO: AmProto = AmProto;

const MULTI_UNSUPPORTED: &str = "no multiple active message support, reduce message size";

/// Split a short payload into the inline header word and the body
///
/// The header is the first 8 bytes in native byte order, zero padded when
/// the payload is shorter. The body is whatever follows.
pub fn split_short(payload: &[u8]) -> (u64, &[u8]) {
    let mut header = [0u8; AM_SHORT_HEADER_SIZE];
    let split = payload.len().min(AM_SHORT_HEADER_SIZE);
    header[..split].copy_from_slice(&payload[..split]);
    (u64::from_ne_bytes(header), &payload[split..])
}

fn multi_unsupported(req: &Request) -> AmResult<StepStatus> {
    warn!(req = %req.handle(), length = ?req.length(), "{}", MULTI_UNSUPPORTED);
    Err(AmError::NotImplemented(MULTI_UNSUPPORTED.into()))
}

impl Proto for AmProto {
    fn name(&self) -> &'static str {
        "am"
    }

    fn contig_short(&self, req: &mut Request) -> AmResult<StepStatus> {
        let send = req.send_mut()?;
        let (header, body) = split_short(&send.buffer[..send.length]);
        send.ep.am_short(send.id, header, body)?;
        Ok(StepStatus::Done)
    }

    fn bcopy_single(&self, req: &mut Request) -> AmResult<StepStatus> {
        let SendState {
            ep,
            id,
            buffer,
            datatype,
            count,
            length,
            dt,
            ..
        } = req.send_mut()?;

        let saved = *dt;
        let result = ep.am_bcopy(*id, &mut |dest: &mut [u8]| {
            dt.pack(datatype, buffer, *count, *length, dest)
        });

        match result {
            Ok(packed) if packed == *length => {
                dt.finish(datatype);
                Ok(StepStatus::Done)
            }
            Ok(packed) => Err(AmError::Internal(format!(
                "packed {} of {} bytes into a single fragment",
                packed, length
            ))),
            Err(e) => {
                // Nothing went out; pack again from the start next time
                *dt = saved;
                Err(e)
            }
        }
    }

    fn bcopy_multi(&self, req: &mut Request) -> AmResult<StepStatus> {
        multi_unsupported(req)
    }

    fn zcopy_single(&self, req: &mut Request) -> AmResult<StepStatus> {
        let handle = req.handle();
        let send = req.send_mut()?;
        if !send.datatype.is_contig() {
            return Err(AmError::Internal(format!(
                "{} selected zero-copy for non-contiguous data",
                handle
            )));
        }

        let payload = send.buffer.slice(..send.length);
        let hook = send.completions.hook(handle);
        match send.ep.am_zcopy(send.id, &[], payload, hook)? {
            ZcopyStatus::Done => Ok(StepStatus::Done),
            ZcopyStatus::InProgress => Ok(StepStatus::InProgress),
        }
    }

    fn zcopy_multi(&self, req: &mut Request) -> AmResult<StepStatus> {
        multi_unsupported(req)
    }

    fn zcopy_completion(&self, req: &mut Request, status: AmResult<()>) {
        trace!(req = %req.handle(), ok = status.is_ok(), "Zero-copy send completed");
        req.complete(status);
    }

    fn only_hdr_size(&self) -> usize {
        0
    }

    fn first_hdr_size(&self) -> usize {
        0
    }

    fn mid_hdr_size(&self) -> usize {
        0
    }
}
