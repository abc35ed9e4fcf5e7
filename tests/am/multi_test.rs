/*!
 * Unsupported Paths and Resource Limits
 * Multi-fragment rejection, send flags, and request pool exhaustion
 */

use super::common::{callback, link_with, sized_payload};
use am_core::transport::{IfaceAttr, LoopbackConfig};
use am_core::{AmError, AmId, Datatype, DeliveryMode, StatusPtr, WorkerConfig, ZcopyThreshold};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn small_fragments(thresh: ZcopyThreshold) -> super::common::Link {
    let attr = IfaceAttr {
        max_short: 16,
        max_bcopy: 128,
        max_zcopy: 256,
        zcopy_threshold: None,
    };
    link_with(
        WorkerConfig::default()
            .with_async_mode(DeliveryMode::Signal)
            .with_zcopy_thresh(thresh),
        LoopbackConfig {
            attr,
            ..LoopbackConfig::default()
        },
    )
}

#[test]
fn test_bcopy_multi_rejected_without_transmission() {
    let link = small_fragments(ZcopyThreshold::Disabled);
    let called = Arc::new(AtomicBool::new(false));
    let c = Arc::clone(&called);

    let status = link.ep.am_put(
        AmId(0),
        sized_payload(200),
        200,
        &Datatype::contig(1),
        callback(move |_, _| c.store(true, Ordering::SeqCst)),
        0,
    );

    assert!(matches!(
        status,
        StatusPtr::Status(Err(AmError::NotImplemented(_)))
    ));
    assert_eq!(link.tx.stats().total_sent(), 0);
    assert_eq!(link.rx.rx_pending(), 0);
    assert_eq!(link.sender.request_pool().in_use(), 0);
    assert!(!called.load(Ordering::SeqCst));
}

#[test]
fn test_zcopy_multi_rejected_without_transmission() {
    let link = small_fragments(ZcopyThreshold::Bytes(128));

    let status = link
        .ep
        .am_put(AmId(0), sized_payload(300), 300, &Datatype::contig(1), None, 0);

    assert!(status.is_err());
    assert!(matches!(
        status,
        StatusPtr::Status(Err(AmError::NotImplemented(_)))
    ));
    assert_eq!(link.tx.stats().total_sent(), 0);

    // Single fragments on either side of the gap still work
    let status = link
        .ep
        .am_put(AmId(0), sized_payload(100), 100, &Datatype::contig(1), None, 0);
    assert_eq!(status, StatusPtr::Status(Ok(())));
    let status = link
        .ep
        .am_put(AmId(0), sized_payload(256), 256, &Datatype::contig(1), None, 0);
    assert!(status.is_ptr());
}

#[test]
fn test_send_flags_not_implemented() {
    let link = small_fragments(ZcopyThreshold::Auto);
    let status = link
        .ep
        .am_put(AmId(0), sized_payload(8), 8, &Datatype::contig(1), None, 1);

    assert!(matches!(
        status,
        StatusPtr::Status(Err(AmError::NotImplemented(_)))
    ));
    assert_eq!(link.tx.stats().total_sent(), 0);
}

#[test]
fn test_pool_exhaustion_reports_no_memory() {
    let link = link_with(
        WorkerConfig::default()
            .with_async_mode(DeliveryMode::Signal)
            .with_request_pool_size(1),
        LoopbackConfig::default(),
    );
    let thresh = link.ep.config().am.zcopy_thresh.unwrap();

    let first = link
        .ep
        .am_put(AmId(0), sized_payload(thresh), thresh, &Datatype::contig(1), None, 0);
    let handle = first.request().expect("zero-copy send stays in flight");

    let second = link
        .ep
        .am_put(AmId(0), sized_payload(thresh), thresh, &Datatype::contig(1), None, 0);
    assert!(matches!(
        second,
        StatusPtr::Status(Err(AmError::NoMemory(_)))
    ));

    // Inline sends need no request
    let short = link
        .ep
        .am_put(AmId(0), sized_payload(8), 8, &Datatype::contig(1), None, 0);
    assert_eq!(short, StatusPtr::Status(Ok(())));

    assert!(link.sender.wait(handle, 16));
    let third = link
        .ep
        .am_put(AmId(0), sized_payload(thresh), thresh, &Datatype::contig(1), None, 0);
    assert!(third.is_ptr());
}
