/*!
 * Endpoint
 *
 * A connection to one destination: transport lanes, the lane active
 * messages travel on, and the message limits derived from that lane.
 */

use crate::core::errors::{AmError, AmResult};
use crate::core::types::Lane;
use crate::proto::{MsgConfig, Proto, AM_PROTO};
use crate::transport::TransportEp;
use crate::worker::{Worker, ZcopyThreshold};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Per-endpoint configuration, fixed once the endpoint is built
#[derive(Clone, Copy)]
pub struct EpConfig {
    pub am: MsgConfig,
    pub proto: &'static dyn Proto,
}

impl fmt::Debug for EpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpConfig")
            .field("am", &self.am)
            .field("proto", &self.proto.name())
            .finish()
    }
}

/// Connection to a destination
#[derive(Clone)]
pub struct Endpoint {
    worker: Worker,
    lanes: Vec<Arc<dyn TransportEp>>,
    am_lane: Lane,
    config: EpConfig,
}

impl Endpoint {
    pub fn builder(worker: &Worker) -> EndpointBuilder {
        EndpointBuilder::new(worker)
    }

    /// Single-lane endpoint with limits taken from the lane's interface
    pub fn connect(worker: &Worker, ep: Arc<dyn TransportEp>) -> AmResult<Self> {
        Self::builder(worker).lane(ep).build()
    }

    pub fn worker(&self) -> &Worker {
        &self.worker
    }

    #[inline]
    pub fn am_lane(&self) -> Lane {
        self.am_lane
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn lane_ep(&self, lane: Lane) -> AmResult<Arc<dyn TransportEp>> {
        self.lanes
            .get(lane)
            .cloned()
            .ok_or_else(|| AmError::InvalidParameter(format!("no lane {} on endpoint", lane)))
    }

    pub fn config(&self) -> &EpConfig {
        &self.config
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("worker", &self.worker.id())
            .field("lanes", &self.lanes.len())
            .field("am_lane", &self.am_lane)
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for [`Endpoint`]
pub struct EndpointBuilder {
    worker: Worker,
    lanes: Vec<Arc<dyn TransportEp>>,
    am_lane: Lane,
    max_short: Option<isize>,
    zcopy_thresh: Option<ZcopyThreshold>,
    proto: &'static dyn Proto,
}

impl EndpointBuilder {
    fn new(worker: &Worker) -> Self {
        Self {
            worker: worker.clone(),
            lanes: Vec::new(),
            am_lane: 0,
            max_short: None,
            zcopy_thresh: None,
            proto: &AM_PROTO,
        }
    }

    pub fn lane(mut self, ep: Arc<dyn TransportEp>) -> Self {
        self.lanes.push(ep);
        self
    }

    pub fn am_lane(mut self, lane: Lane) -> Self {
        self.am_lane = lane;
        self
    }

    /// Override the inline limit; negative disables inline sends
    pub fn max_short(mut self, max_short: isize) -> Self {
        self.max_short = Some(max_short);
        self
    }

    /// Override the worker's zero-copy threshold for this endpoint
    pub fn zcopy_thresh(mut self, thresh: ZcopyThreshold) -> Self {
        self.zcopy_thresh = Some(thresh);
        self
    }

    pub fn proto(mut self, proto: &'static dyn Proto) -> Self {
        self.proto = proto;
        self
    }

    pub fn build(self) -> AmResult<Endpoint> {
        let lane_ep = self.lanes.get(self.am_lane).ok_or_else(|| {
            AmError::InvalidParameter(format!(
                "active message lane {} out of {} lanes",
                self.am_lane,
                self.lanes.len()
            ))
        })?;

        let attr = lane_ep.iface_attr();
        let thresh = self
            .zcopy_thresh
            .unwrap_or(self.worker.config().zcopy_thresh);
        let mut am = match thresh {
            ZcopyThreshold::Bytes(bytes) => MsgConfig::from_attr(&attr, Some(bytes)),
            _ => MsgConfig::from_attr(&attr, None),
        };
        if thresh == ZcopyThreshold::Disabled {
            am.zcopy_thresh = None;
        }
        if let Some(max_short) = self.max_short {
            am.max_short = max_short;
        }

        let config = EpConfig {
            am,
            proto: self.proto,
        };
        debug!(
            worker = self.worker.id(),
            am_lane = self.am_lane,
            config = ?config,
            "Endpoint created"
        );

        Ok(Endpoint {
            worker: self.worker,
            lanes: self.lanes,
            am_lane: self.am_lane,
            config,
        })
    }
}
