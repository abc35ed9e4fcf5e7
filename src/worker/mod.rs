/*!
 * Worker Module
 * Worker object, configuration and the progress loop
 */

mod config;
#[allow(clippy::module_inception)]
mod worker;

pub use config::{ThreadMode, WorkerConfig, ZcopyThreshold};
pub use worker::Worker;
