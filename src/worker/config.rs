/*!
 * Worker Configuration
 *
 * Defaults come from `core::limits`, can be loaded from JSON, and can be
 * overridden from the environment:
 *
 * - `AM_ASYNC_MODE`: `thread` or `signal`
 * - `AM_THREAD_MODE`: `single` or `multi`
 * - `AM_REQUEST_POOL_SIZE`: request pool capacity
 * - `AM_ZCOPY_THRESH`: zero-copy threshold in bytes, or `inf` to disable
 */

use crate::async_dispatch::DeliveryMode;
use crate::core::errors::{AmError, AmResult};
use crate::core::limits::DEFAULT_REQUEST_POOL_CAPACITY;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which threads may call into a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadMode {
    /// Only the owning thread; the worker lock is compiled out at runtime
    #[default]
    Single,
    /// Any thread; entry points serialize on the worker lock
    Multi,
}

impl ThreadMode {
    #[inline]
    pub fn is_multi(self) -> bool {
        self == ThreadMode::Multi
    }
}

impl fmt::Display for ThreadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ThreadMode::Single => "single",
            ThreadMode::Multi => "multi",
        })
    }
}

impl FromStr for ThreadMode {
    type Err = AmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(ThreadMode::Single),
            "multi" => Ok(ThreadMode::Multi),
            other => Err(AmError::InvalidParameter(format!(
                "unknown thread mode '{}'",
                other
            ))),
        }
    }
}

/// Zero-copy threshold setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZcopyThreshold {
    /// Take the transport's threshold
    #[default]
    Auto,
    /// Never use zero-copy
    Disabled,
    Bytes(usize),
}

/// Worker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub async_mode: DeliveryMode,
    pub thread_mode: ThreadMode,
    pub request_pool_size: usize,
    pub zcopy_thresh: ZcopyThreshold,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            async_mode: DeliveryMode::default(),
            thread_mode: ThreadMode::default(),
            request_pool_size: DEFAULT_REQUEST_POOL_CAPACITY,
            zcopy_thresh: ZcopyThreshold::Auto,
        }
    }
}

impl WorkerConfig {
    pub fn with_async_mode(mut self, mode: DeliveryMode) -> Self {
        self.async_mode = mode;
        self
    }

    pub fn with_thread_mode(mut self, mode: ThreadMode) -> Self {
        self.thread_mode = mode;
        self
    }

    pub fn with_request_pool_size(mut self, size: usize) -> Self {
        self.request_pool_size = size;
        self
    }

    pub fn with_zcopy_thresh(mut self, thresh: ZcopyThreshold) -> Self {
        self.zcopy_thresh = thresh;
        self
    }

    /// Parse from JSON; missing fields keep their defaults
    pub fn from_json(json: &str) -> AmResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| AmError::InvalidParameter(format!("worker config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> AmResult<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a key lookup, using the `AM_*` variable names
    pub fn with_overrides<F>(mut self, lookup: F) -> AmResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup("AM_ASYNC_MODE") {
            self.async_mode = mode.parse::<DeliveryMode>()?;
        }
        if let Some(mode) = lookup("AM_THREAD_MODE") {
            self.thread_mode = mode.parse()?;
        }
        if let Some(size) = lookup("AM_REQUEST_POOL_SIZE") {
            self.request_pool_size = size.parse().map_err(|_| {
                AmError::InvalidParameter(format!("AM_REQUEST_POOL_SIZE: invalid size '{}'", size))
            })?;
        }
        if let Some(thresh) = lookup("AM_ZCOPY_THRESH") {
            self.zcopy_thresh = match thresh.to_ascii_lowercase().as_str() {
                "auto" => ZcopyThreshold::Auto,
                "inf" => ZcopyThreshold::Disabled,
                value => ZcopyThreshold::Bytes(value.parse().map_err(|_| {
                    AmError::InvalidParameter(format!(
                        "AM_ZCOPY_THRESH: invalid threshold '{}'",
                        thresh
                    ))
                })?),
            };
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> AmResult<()> {
        if self.request_pool_size == 0 {
            return Err(AmError::InvalidParameter(
                "request pool size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
