/*!
 * Active Messages
 *
 * Register per-id receive handlers across a worker's interfaces and send
 * payloads tagged with an id.
 *
 * ## Id Space
 *
 * Applications use ids `0..=AmId::MAX`. Transports see them offset past the
 * ids the engine reserves for its own protocols.
 */

mod send;
mod types;

pub use send::put_short;
pub use types::{AmHandlerFlags, StatusPtr};
