/*!
 * Active-Message Send and Handler Registration
 */

use super::types::{AmHandlerFlags, StatusPtr};
use crate::core::errors::{AmError, AmResult};
use crate::core::types::{AmId, WireAmId};
use crate::datatype::Datatype;
use crate::endpoint::Endpoint;
use crate::proto::{fits_short, split_short};
use crate::request::SendCallback;
use crate::transport::{RecvFlags, RecvStatus, TransportEp};
use bytes::Bytes;
use tracing::trace;

/// Inline send of a contiguous payload, no request involved
pub fn put_short(ep: &dyn TransportEp, id: WireAmId, payload: &[u8]) -> AmResult<()> {
    let (header, body) = split_short(payload);
    ep.am_short(id, header, body)
}

impl Endpoint {
    /// Install a receive handler for `id` on every interface of the worker
    pub fn set_am_handler<F>(&self, id: AmId, callback: F, flags: AmHandlerFlags) -> AmResult<()>
    where
        F: Fn(&Bytes, RecvFlags) -> RecvStatus + Send + Sync + 'static,
    {
        self.worker().set_am_handler(id, callback, flags)
    }

    /// Send `count` elements of `datatype` from `payload` as active message `id`
    ///
    /// Small contiguous payloads go inline with no request. Otherwise a request
    /// is taken from the worker's pool and its first step runs at once; if that
    /// finishes the send the request is retired and only the status comes
    /// back. A returned request is driven by `Worker::progress`, and
    /// `callback` runs when it completes.
    pub fn am_put(
        &self,
        id: AmId,
        payload: Bytes,
        count: usize,
        datatype: &Datatype,
        callback: Option<SendCallback>,
        flags: u32,
    ) -> StatusPtr {
        let worker = self.worker();
        let _lock = worker.mt_lock().enter();

        if flags != 0 {
            return StatusPtr::Status(Err(AmError::NotImplemented(format!(
                "send flags {:#x}",
                flags
            ))));
        }

        match self.put(id, payload, count, datatype, callback) {
            Ok(ptr) => ptr,
            Err(e) => StatusPtr::Status(Err(e)),
        }
    }

    fn put(
        &self,
        id: AmId,
        payload: Bytes,
        count: usize,
        datatype: &Datatype,
        callback: Option<SendCallback>,
    ) -> AmResult<StatusPtr> {
        let wire = id.to_wire()?;
        let config = *self.config();

        if datatype.is_contig() {
            let length = datatype.length(&payload, count)?;
            if fits_short(length, config.am.max_short) {
                let ep = self.lane_ep(self.am_lane())?;
                match put_short(ep.as_ref(), wire, &payload[..length]) {
                    Err(AmError::NoResources) => {
                        trace!(id = %id, length = length, "Inline send busy, falling back to request");
                    }
                    status => return Ok(StatusPtr::Status(status)),
                }
            }
        }

        let worker = self.worker();
        let mut req = worker.take_request()?;
        let started = req
            .init(self, payload, datatype.clone(), count, wire)
            .and_then(|()| {
                req.start(
                    config.am.short_max(datatype),
                    config.am.zcopy_threshold(datatype),
                    &config.am,
                    config.proto,
                )
            });
        if let Err(e) = started {
            worker.release_request(req);
            return Err(e);
        }

        Ok(worker.launch(req, callback))
    }
}
