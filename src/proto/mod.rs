/*!
 * Protocol Layer
 *
 * A protocol descriptor is a fixed set of send operation slots plus header
 * sizes. The selector picks a slot per request from the payload size and the
 * endpoint's limits; the request then runs that slot until it completes.
 */

mod am;
mod selector;

pub use am::{split_short, AmProto, AM_PROTO};
pub use selector::{fits_short, select, MsgConfig, SendOp};

use crate::core::errors::AmResult;
use crate::request::{Request, StepStatus};

/// Send protocol descriptor
///
/// Slots return `Err(NoResources)` to be retried at the next progress call.
/// Any other error is final for the request.
pub trait Proto: Send + Sync {
    fn name(&self) -> &'static str;

    fn contig_short(&self, req: &mut Request) -> AmResult<StepStatus>;

    fn bcopy_single(&self, req: &mut Request) -> AmResult<StepStatus>;

    fn bcopy_multi(&self, req: &mut Request) -> AmResult<StepStatus>;

    fn zcopy_single(&self, req: &mut Request) -> AmResult<StepStatus>;

    fn zcopy_multi(&self, req: &mut Request) -> AmResult<StepStatus>;

    /// A posted zero-copy send finished with `status`
    fn zcopy_completion(&self, req: &mut Request, status: AmResult<()>);

    /// Header bytes of a single-fragment message
    fn only_hdr_size(&self) -> usize;

    fn first_hdr_size(&self) -> usize;

    fn mid_hdr_size(&self) -> usize;

    /// Run the slot named by `op`
    fn step(&self, op: SendOp, req: &mut Request) -> AmResult<StepStatus> {
        match op {
            SendOp::ContigShort => self.contig_short(req),
            SendOp::BcopySingle => self.bcopy_single(req),
            SendOp::BcopyMulti => self.bcopy_multi(req),
            SendOp::ZcopySingle => self.zcopy_single(req),
            SendOp::ZcopyMulti => self.zcopy_multi(req),
        }
    }
}
