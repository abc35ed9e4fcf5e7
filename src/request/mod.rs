/*!
 * Request State Machine
 *
 * Pooled send requests driven to completion by repeated progress steps.
 */

pub mod completion;
mod pool;
#[allow(clippy::module_inception)]
mod request;
mod types;

pub use completion::CompletionQueue;
pub use pool::RequestPool;
pub use request::{Request, SendState};
pub use types::{
    RequestFlags, RequestHandle, RequestState, SendCallback, StepStatus,
};
