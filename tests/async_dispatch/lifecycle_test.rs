/*!
 * Delivery Mode Lifecycle Tests
 * Process-wide setup on the first context of a mode, teardown on the last
 */

use am_core::async_dispatch::{AsyncContext, SIGNAL_OPS};
use am_core::{DeliveryMode, Worker, WorkerConfig};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::time::{Duration, Instant};

#[test]
#[serial]
fn test_signal_handler_installed_while_contexts_live() {
    let before = DeliveryMode::Signal.active_contexts();
    assert_eq!(before, 0);
    assert!(!SIGNAL_OPS.is_installed());

    let a = AsyncContext::new(DeliveryMode::Signal).unwrap();
    let b = AsyncContext::new(DeliveryMode::Signal).unwrap();
    assert_eq!(DeliveryMode::Signal.active_contexts(), 2);
    assert!(SIGNAL_OPS.is_installed());

    drop(a);
    assert!(SIGNAL_OPS.is_installed());
    drop(b);
    assert_eq!(DeliveryMode::Signal.active_contexts(), 0);
    assert!(!SIGNAL_OPS.is_installed());
}

#[test]
#[serial]
fn test_thread_context_shuts_down_cleanly() {
    let before = DeliveryMode::Thread.active_contexts();
    {
        let worker =
            Worker::new(WorkerConfig::default().with_async_mode(DeliveryMode::Thread)).unwrap();
        assert_eq!(DeliveryMode::Thread.active_contexts(), before + 1);
        assert_eq!(worker.async_context().mode(), DeliveryMode::Thread);
    }
    // The delivery thread may hold the last reference for a moment
    let deadline = Instant::now() + Duration::from_secs(2);
    while DeliveryMode::Thread.active_contexts() != before && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(DeliveryMode::Thread.active_contexts(), before);
}
