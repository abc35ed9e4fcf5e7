/*!
 * Send Request
 *
 * One outstanding send: what to send, how far packing got, and how it ended.
 *
 * ## Lifecycle
 *
 * ```text
 * Uninitialized --start--> Pending --step ok--> Completed
 *                             |  ^
 *                   no resources  |
 *                             +---+
 * ```
 *
 * A zero-copy step may post the send and leave the request pending until the
 * transport reports completion through the worker's completion queue.
 */

use super::completion::CompletionQueue;
use super::types::{RequestFlags, RequestHandle, RequestState, SendCallback, StepStatus};
use crate::core::errors::{AmError, AmResult};
use crate::core::types::{Lane, WireAmId};
use crate::datatype::{Datatype, DtState};
use crate::endpoint::Endpoint;
use crate::proto::{select, MsgConfig, Proto, SendOp};
use crate::transport::TransportEp;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, trace};

/// Everything a protocol slot needs to put the request on the wire
pub struct SendState {
    pub ep: Arc<dyn TransportEp>,
    pub lane: Lane,
    pub id: WireAmId,
    pub buffer: Bytes,
    pub datatype: Datatype,
    pub count: usize,
    pub length: usize,
    pub dt: DtState,
    pub op: Option<SendOp>,
    pub proto: Option<&'static dyn Proto>,
    pub(crate) completions: Arc<CompletionQueue>,
}

/// Pooled send request
pub struct Request {
    handle: RequestHandle,
    state: RequestState,
    flags: RequestFlags,
    status: AmResult<()>,
    callback: Option<SendCallback>,
    posted: bool,
    send: Option<SendState>,
}

impl Request {
    pub(crate) fn new(handle: RequestHandle) -> Self {
        Self {
            handle,
            state: RequestState::Uninitialized,
            flags: RequestFlags::default(),
            status: Ok(()),
            callback: None,
            posted: false,
            send: None,
        }
    }

    #[inline]
    pub fn handle(&self) -> RequestHandle {
        self.handle
    }

    #[inline]
    pub fn state(&self) -> RequestState {
        self.state
    }

    #[inline]
    pub fn flags(&self) -> RequestFlags {
        self.flags
    }

    #[inline]
    pub fn is_completed(&self) -> bool {
        self.flags.contains(RequestFlags::COMPLETED)
    }

    /// Final status; meaningful once completed
    pub fn status(&self) -> AmResult<()> {
        self.status.clone()
    }

    /// Selected operation slot, once started
    pub fn op(&self) -> Option<SendOp> {
        self.send.as_ref().and_then(|s| s.op)
    }

    pub fn length(&self) -> Option<usize> {
        self.send.as_ref().map(|s| s.length)
    }

    /// Send state, for protocol slots
    pub fn send_mut(&mut self) -> AmResult<&mut SendState> {
        let handle = self.handle;
        self.send
            .as_mut()
            .ok_or_else(|| AmError::Internal(format!("{} stepped before initialization", handle)))
    }

    /// Bind the request to an endpoint's active-message lane and size it
    pub fn init(
        &mut self,
        ep: &Endpoint,
        buffer: Bytes,
        datatype: Datatype,
        count: usize,
        id: WireAmId,
    ) -> AmResult<()> {
        let length = datatype.length(&buffer, count)?;
        let lane = ep.am_lane();
        self.send = Some(SendState {
            ep: ep.lane_ep(lane)?,
            lane,
            id,
            buffer,
            datatype,
            count,
            length,
            dt: DtState::default(),
            op: None,
            proto: None,
            completions: ep.worker().completions(),
        });
        trace!(req = %self.handle, id = %id, length = length, lane = lane, "Request initialized");
        Ok(())
    }

    /// Run the selector and arm the first step
    ///
    /// On error the request stays uninitialized and must be released.
    pub fn start(
        &mut self,
        max_short: isize,
        zcopy_thresh: Option<usize>,
        msg: &MsgConfig,
        proto: &'static dyn Proto,
    ) -> AmResult<()> {
        let handle = self.handle;
        let send = self.send_mut()?;
        let op = select(send.length, max_short, zcopy_thresh, msg, proto.only_hdr_size());
        if op == SendOp::ContigShort && !send.datatype.is_contig() {
            return Err(AmError::Internal(format!(
                "{} selected inline send for non-contiguous data",
                handle
            )));
        }

        send.op = Some(op);
        send.proto = Some(proto);
        let length = send.length;
        self.state = RequestState::Pending;
        debug!(req = %handle, op = %op, length = length, proto = proto.name(), "Request started");
        Ok(())
    }

    /// Advance by one step
    ///
    /// Completed and posted requests are left alone. `NoResources` keeps the
    /// request pending for another try; any other error completes it.
    pub fn progress(&mut self) -> RequestState {
        if self.state != RequestState::Pending || self.posted {
            return self.state;
        }

        let slot = self.send.as_ref().and_then(|s| s.op.zip(s.proto));
        let (op, proto) = match slot {
            Some(slot) => slot,
            None => {
                let err = AmError::Internal(format!("{} progressed without a protocol", self.handle));
                self.complete(Err(err));
                return self.state;
            }
        };

        match proto.step(op, self) {
            Ok(StepStatus::Done) => {
                if !self.is_completed() {
                    self.complete(Ok(()));
                }
            }
            Ok(StepStatus::InProgress) => {
                self.posted = true;
                trace!(req = %self.handle, op = %op, "Send posted");
            }
            Err(e) if e.is_transient() => {
                trace!(req = %self.handle, op = %op, error = %e, "Step deferred");
            }
            Err(e) => self.complete(Err(e)),
        }
        self.state
    }

    /// Whether a posted send is waiting for its completion
    #[inline]
    pub fn is_posted(&self) -> bool {
        self.posted
    }

    /// Record the final status
    pub fn complete(&mut self, status: AmResult<()>) {
        debug!(
            req = %self.handle,
            status = %crate::core::errors::status_string(&status),
            "Completing send request"
        );
        self.state = RequestState::Completed;
        self.flags.set(RequestFlags::COMPLETED);
        self.posted = false;
        self.status = status;
    }

    /// Install the completion callback
    pub fn set_callback(&mut self, callback: SendCallback) {
        self.callback = Some(callback);
        self.flags.set(RequestFlags::CALLBACK);
    }

    pub(crate) fn take_callback(&mut self) -> Option<SendCallback> {
        self.callback.take()
    }
}
