/*!
 * Blocked Region Tests
 * No callback runs while blocked; missed work runs once the last level goes
 */

use am_core::async_dispatch::{AsyncContext, EventMask};
use am_core::DeliveryMode;
use serial_test::serial;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn wait_for<F: Fn() -> bool>(timeout: Duration, done: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    done()
}

#[test]
#[serial]
fn test_thread_mode_defers_while_blocked() {
    let ctx = AsyncContext::new(DeliveryMode::Thread).unwrap();
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    let id = ctx
        .set_event_handler(40, EventMask::READ, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    {
        let _outer = ctx.block();
        let _inner = ctx.block();
        ctx.raise_event(40);
        assert!(wait_for(Duration::from_secs(2), || ctx.missed_count() == 1));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        drop(_inner);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), 0, "one level still held");
    }

    // Released without any explicit check_missed call
    assert!(wait_for(Duration::from_secs(2), || count.load(Ordering::SeqCst) == 1));
    assert_eq!(ctx.check_handler(id, |h| h.missed()).unwrap(), 1);
    ctx.remove_handler(id).unwrap();
}

#[test]
#[serial]
fn test_release_right_after_deferral_runs_callback() {
    let ctx = AsyncContext::new(DeliveryMode::Thread).unwrap();
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    let id = ctx
        .set_event_handler(44, EventMask::READ, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    for round in 1..=200u64 {
        let guard = ctx.block();
        ctx.raise_event(44);
        while ctx.check_handler(id, |h| h.missed()).unwrap() < round {
            std::hint::spin_loop();
        }
        drop(guard);

        // No progress call: only the delivery thread may run it
        assert!(
            wait_for(Duration::from_secs(2), || count.load(Ordering::SeqCst) == round as usize),
            "deferred dispatch {} never ran",
            round
        );
    }
    ctx.remove_handler(id).unwrap();
}

#[test]
#[serial]
fn test_block_waits_for_running_callback() {
    let ctx = AsyncContext::new(DeliveryMode::Thread).unwrap();
    let running = Arc::new(AtomicBool::new(false));
    let finished = Arc::new(AtomicBool::new(false));
    let (r, f) = (Arc::clone(&running), Arc::clone(&finished));
    let id = ctx
        .set_event_handler(41, EventMask::READ, move |_| {
            r.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            f.store(true, Ordering::SeqCst);
        })
        .unwrap();

    ctx.raise_event(41);
    assert!(wait_for(Duration::from_secs(2), || running.load(Ordering::SeqCst)));

    let guard = ctx.block();
    assert!(
        finished.load(Ordering::SeqCst),
        "block entered while a callback was running"
    );
    drop(guard);
    ctx.remove_handler(id).unwrap();
}

#[test]
#[serial]
fn test_signal_mode_runs_missed_on_check() {
    let ctx = AsyncContext::new(DeliveryMode::Signal).unwrap();
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    let id = ctx
        .set_event_handler(42, EventMask::READ, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    {
        let _block = ctx.block();
        ctx.raise_event(42);
        ctx.raise_event(42);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    assert_eq!(ctx.poll(), 2);
    assert_eq!(count.load(Ordering::SeqCst), 2);
    ctx.remove_handler(id).unwrap();
}

#[test]
#[serial]
fn test_callback_may_reenter_block() {
    let ctx = AsyncContext::new(DeliveryMode::Signal).unwrap();
    let weak = Arc::downgrade(&ctx);
    let nested = Arc::new(AtomicUsize::new(0));
    let n = Arc::clone(&nested);
    let id = ctx
        .set_event_handler(43, EventMask::READ, move |_| {
            if let Some(ctx) = weak.upgrade() {
                let _guard = ctx.block();
                n.store(ctx.blocked_count() as usize, Ordering::SeqCst);
            }
        })
        .unwrap();

    ctx.raise_event(43);
    // One level for the dispatch, one for the callback's own block
    assert_eq!(nested.load(Ordering::SeqCst), 2);
    assert!(!ctx.is_blocked());
    ctx.remove_handler(id).unwrap();
}
