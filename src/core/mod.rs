/*!
 * Core Module
 * Fundamental engine types, limits, guards, and error handling
 */

pub mod errors;
pub mod guard;
pub mod id;
pub mod limits;
pub mod types;

// Re-export for convenience
pub use errors::*;
pub use guard::{
    AsyncBlockGuard, ConditionalLock, Guard, GuardDrop, GuardError, GuardMetadata, GuardResult,
    WorkerLockGuard,
};
pub use types::*;
