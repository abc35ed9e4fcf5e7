/*!
 * Tracing
 * Subscriber setup and spans for worker operations
 *
 * Features:
 * - JSON-formatted logs for structured parsing
 * - Sequence ids correlating the events of one operation
 * - Slow-operation warnings
 */

use crate::core::id::{AtomicGenerator, IdGenerator};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::{debug, info, span, warn, Level, Span};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Operations slower than this are reported at `warn`
const SLOW_OPERATION: Duration = Duration::from_millis(10);

fn json_requested() -> bool {
    std::env::var("AM_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false)
}

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - AM_TRACE_JSON: Enable JSON output (default: false)
///
/// Panics if a global subscriber is already installed; see
/// [`try_init_tracing`].
pub fn init_tracing() {
    if !try_init_tracing() {
        panic!("global tracing subscriber already installed");
    }
}

/// Like [`init_tracing`], but returns `false` instead of panicking when a
/// subscriber is already installed
pub fn try_init_tracing() -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if json_requested() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = json_requested(), "Tracing initialized");
    }
    installed
}

fn operation_ids() -> &'static AtomicGenerator {
    static IDS: OnceLock<AtomicGenerator> = OnceLock::new();
    IDS.get_or_init(|| AtomicGenerator::new(1))
}

/// Span covering one worker operation
pub struct OperationSpan {
    span: Span,
    start: Instant,
    seq: u64,
    operation: &'static str,
}

impl OperationSpan {
    pub fn new(operation: &'static str, worker: u64) -> Self {
        let seq = operation_ids().next();
        let span = span!(
            Level::DEBUG,
            "operation",
            seq = seq,
            operation = operation,
            worker = worker,
            duration_us = tracing::field::Empty,
            error = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            seq,
            operation,
        }
    }

    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn record_error(&self, error: &str) {
        self.span.record("error", error);
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for OperationSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_us", duration.as_micros() as u64);

        if duration > SLOW_OPERATION {
            warn!(
                seq = self.seq,
                operation = self.operation,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "Slow operation"
            );
        } else {
            debug!(
                seq = self.seq,
                operation = self.operation,
                duration_us = duration.as_micros() as u64,
                "Operation completed"
            );
        }
    }
}

#[inline]
pub fn span_operation(operation: &'static str, worker: u64) -> OperationSpan {
    OperationSpan::new(operation, worker)
}
