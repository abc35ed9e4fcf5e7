/*!
 * Active-Message Delivery Engine
 * Size-driven protocol selection, pooled send requests, and async delivery
 * of receive callbacks over pluggable transports
 */

pub mod am;
pub mod async_dispatch;
pub mod core;
pub mod datatype;
pub mod endpoint;
pub mod monitoring;
pub mod proto;
pub mod request;
pub mod transport;
pub mod worker;

// Re-exports
pub use am::{AmHandlerFlags, StatusPtr};
pub use async_dispatch::{AsyncContext, DeliveryMode};
pub use crate::core::errors::{AmError, AmResult};
pub use crate::core::types::{AmId, WireAmId};
pub use datatype::{Datatype, GenericDatatype};
pub use endpoint::{Endpoint, EndpointBuilder, EpConfig};
pub use monitoring::{init_tracing, try_init_tracing};
pub use proto::{MsgConfig, Proto, SendOp, AM_PROTO};
pub use request::{RequestHandle, RequestState, SendCallback};
pub use transport::{RecvFlags, RecvStatus, TransportEp, TransportIface};
pub use worker::{ThreadMode, Worker, WorkerConfig, ZcopyThreshold};
