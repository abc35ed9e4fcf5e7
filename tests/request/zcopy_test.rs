/*!
 * Zero-Copy Completion Tests
 */

use super::common::{callback, link, link_with, sized_payload, Sink};
use am_core::transport::LoopbackConfig;
use am_core::{
    AmHandlerFlags, AmId, Datatype, DeliveryMode, RequestState, StatusPtr, WorkerConfig,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_deferred_completion_invokes_callback_once() {
    let link = link(DeliveryMode::Signal);
    let sink = Sink::default();
    sink.install(&link.receiver, AmId(3), AmHandlerFlags::SYNC);

    let len = link.ep.config().am.zcopy_thresh.unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let payload = sized_payload(len);

    let status = link.ep.am_put(
        AmId(3),
        payload.clone(),
        len,
        &Datatype::contig(1),
        callback(move |_, status| {
            assert!(status.is_ok());
            c.fetch_add(1, Ordering::SeqCst);
        }),
        0,
    );
    let handle = status.request().unwrap();
    assert_eq!(link.tx.zcopy_pending(), 1);
    // Posted sends wait for the transport, not for another step
    assert_eq!(link.sender.pending_count(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    assert!(link.sender.wait(handle, 16));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(link.sender.request_check_status(handle), RequestState::Completed);

    for _ in 0..4 {
        link.sender.progress();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(link.drive_until(Duration::from_secs(2), || sink.received() == 1));
    assert_eq!(sink.last().unwrap(), payload);
}

#[test]
fn test_immediate_zcopy_collapses_to_status() {
    let link = link_with(
        WorkerConfig::default().with_async_mode(DeliveryMode::Signal),
        LoopbackConfig {
            deferred_zcopy: false,
            ..LoopbackConfig::default()
        },
    );
    let len = link.ep.config().am.zcopy_thresh.unwrap();

    let status = link.ep.am_put(
        AmId(0),
        sized_payload(len),
        len,
        &Datatype::contig(1),
        callback(|_, _| panic!("collapsed sends report through the return value")),
        0,
    );
    assert_eq!(status, StatusPtr::Status(Ok(())));
    assert_eq!(link.tx.stats().zcopy_sent, 1);
    assert_eq!(link.sender.request_pool().in_use(), 0);
}

#[test]
fn test_zcopy_retried_after_no_resources() {
    let link = link(DeliveryMode::Signal);
    let len = link.ep.config().am.zcopy_thresh.unwrap();
    link.tx.inject_no_resource(1);

    let status = link
        .ep
        .am_put(AmId(0), sized_payload(len), len, &Datatype::contig(1), None, 0);
    let handle = status.request().unwrap();
    assert_eq!(link.sender.pending_count(), 1);
    assert_eq!(link.tx.stats().zcopy_sent, 0);

    assert!(link.sender.wait(handle, 16));
    assert_eq!(link.tx.stats().zcopy_sent, 1);
}

#[test]
fn test_stale_handle_reports_completed() {
    let link = link(DeliveryMode::Signal);
    let len = link.ep.config().am.zcopy_thresh.unwrap();

    let first = link
        .ep
        .am_put(AmId(0), sized_payload(len), len, &Datatype::contig(1), None, 0)
        .request()
        .unwrap();
    assert!(link.sender.wait(first, 16));

    // The next request reuses the slot under a new generation
    let second = link
        .ep
        .am_put(AmId(0), sized_payload(len), len, &Datatype::contig(1), None, 0)
        .request()
        .unwrap();
    assert_eq!(first.index(), second.index());
    assert_eq!(link.sender.request_check_status(first), RequestState::Completed);
    assert_eq!(link.sender.request_check_status(second), RequestState::Pending);
    assert!(link.sender.wait(second, 16));
}
