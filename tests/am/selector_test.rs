/*!
 * Protocol Selection Tests
 * Size thresholds seen through the loopback transport's counters
 */

use super::common::{link, link_with, sized_payload, Sink};
use am_core::transport::{IfaceAttr, LoopbackConfig};
use am_core::{
    AmHandlerFlags, AmId, Datatype, DeliveryMode, SendOp, StatusPtr, WorkerConfig,
    ZcopyThreshold,
};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn put(link: &super::common::Link, len: usize) -> StatusPtr {
    link.ep
        .am_put(AmId(0), sized_payload(len), len, &Datatype::contig(1), None, 0)
}

#[test]
fn test_short_boundary() {
    let link = link(DeliveryMode::Signal);
    let max_short = link.ep.config().am.max_short as usize;

    assert_eq!(put(&link, max_short), StatusPtr::Status(Ok(())));
    assert_eq!(link.tx.stats().short_sent, 1);
    assert_eq!(link.sender.request_pool().in_use(), 0);

    assert_eq!(put(&link, max_short + 1), StatusPtr::Status(Ok(())));
    assert_eq!(link.tx.stats().bcopy_sent, 1);
    assert_eq!(link.tx.stats().short_sent, 1);
}

#[test]
fn test_zcopy_threshold_boundary() {
    let config = WorkerConfig::default()
        .with_async_mode(DeliveryMode::Signal)
        .with_zcopy_thresh(ZcopyThreshold::Bytes(1024));
    let link = link_with(config, LoopbackConfig::default());
    assert_eq!(link.ep.config().am.zcopy_thresh, Some(1024));

    assert_eq!(put(&link, 1023), StatusPtr::Status(Ok(())));
    assert_eq!(link.tx.stats().bcopy_sent, 1);

    let ptr = put(&link, 1024);
    assert!(ptr.is_ptr(), "deferred zero-copy send returns a request");
    assert_eq!(link.tx.stats().zcopy_sent, 1);

    let handle = ptr.request().unwrap();
    assert!(link.sender.wait(handle, 16));
}

#[test]
fn test_disabled_zcopy_stays_on_bcopy() {
    let config = WorkerConfig::default()
        .with_async_mode(DeliveryMode::Signal)
        .with_zcopy_thresh(ZcopyThreshold::Disabled);
    let link = link_with(config, LoopbackConfig::default());

    assert_eq!(put(&link, 4096), StatusPtr::Status(Ok(())));
    assert_eq!(link.tx.stats().bcopy_sent, 1);
    assert_eq!(link.tx.stats().zcopy_sent, 0);
}

#[test]
fn test_endpoint_overrides() {
    let link = link(DeliveryMode::Signal);
    let ep = am_core::Endpoint::builder(&link.sender)
        .lane(link.tx.connect(&link.rx))
        .max_short(-1)
        .build()
        .unwrap();

    // Inline disabled: even an empty payload goes through a request
    let status = ep.am_put(AmId(0), sized_payload(0), 0, &Datatype::contig(1), None, 0);
    assert_eq!(status, StatusPtr::Status(Ok(())));
    assert_eq!(link.tx.stats().short_sent, 0);
    assert_eq!(link.tx.stats().bcopy_sent, 1);

    assert!(am_core::Endpoint::builder(&link.sender).am_lane(1).build().is_err());
}

#[test]
fn test_bcopy_payload_arrives_intact() {
    let link = link(DeliveryMode::Signal);
    let sink = Sink::default();
    sink.install(&link.receiver, AmId(2), AmHandlerFlags::SYNC);

    let payload = sized_payload(700);
    let status = link
        .ep
        .am_put(AmId(2), payload.clone(), 700, &Datatype::contig(1), None, 0);
    assert_eq!(status, StatusPtr::Status(Ok(())));

    assert!(link.drive_until(Duration::from_secs(2), || sink.received() == 1));
    assert_eq!(sink.last().unwrap(), payload);
}

#[test]
fn test_element_size_scales_length() {
    let attr = IfaceAttr {
        max_short: 32,
        ..LoopbackConfig::default().attr
    };
    let link = link_with(
        WorkerConfig::default().with_async_mode(DeliveryMode::Signal),
        LoopbackConfig {
            attr,
            ..LoopbackConfig::default()
        },
    );

    // 4 elements of 8 bytes fit inline, 5 do not
    let buf = sized_payload(64);
    let dt = Datatype::contig(8);
    link.ep.am_put(AmId(0), buf.clone(), 4, &dt, None, 0);
    link.ep.am_put(AmId(0), buf, 5, &dt, None, 0);
    assert_eq!(link.tx.stats().short_sent, 1);
    assert_eq!(link.tx.stats().bcopy_sent, 1);
}

#[test]
fn test_select_matches_endpoint_config() {
    let link = link(DeliveryMode::Signal);
    let am = link.ep.config().am;
    let dt = Datatype::contig(1);
    let pick = |len| am_core::proto::select(len, am.short_max(&dt), am.zcopy_threshold(&dt), &am, 0);

    assert_eq!(pick(am.max_short as usize), SendOp::ContigShort);
    assert_eq!(pick(am.max_short as usize + 1), SendOp::BcopySingle);
    assert_eq!(pick(am.zcopy_thresh.unwrap()), SendOp::ZcopySingle);
}
