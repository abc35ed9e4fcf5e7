/*!
 * Inline Send Tests
 * Header split and the request-free fast path
 */

use super::common::{callback, link_with, Link, Sink};
use am_core::transport::{FrameKind, IfaceAttr, LoopbackConfig};
use am_core::{AmHandlerFlags, AmId, Datatype, DeliveryMode, StatusPtr, WorkerConfig};
use bytes::Bytes;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::time::Duration;

fn wide_short_link() -> Link {
    let attr = IfaceAttr {
        max_short: 1024,
        ..LoopbackConfig::default().attr
    };
    link_with(
        WorkerConfig::default().with_async_mode(DeliveryMode::Signal),
        LoopbackConfig {
            attr,
            ..LoopbackConfig::default()
        },
    )
}

#[test]
fn test_header_split_sizes() {
    let link = wide_short_link();
    let sink = Sink::default();
    sink.install(&link.receiver, AmId(1), AmHandlerFlags::SYNC);

    for (i, len) in [8usize, 9, 16, 512].into_iter().enumerate() {
        let payload: Bytes = (0..len).map(|b| b as u8).collect::<Vec<_>>().into();
        let status = link
            .ep
            .am_put(AmId(1), payload.clone(), len, &Datatype::contig(1), None, 0);
        assert_eq!(status, StatusPtr::Status(Ok(())));

        let (kind, frame) = link.tx.last_sent_frame().unwrap();
        assert_eq!(kind, FrameKind::Short);
        // Header word is the first 8 payload bytes, body is the rest
        assert_eq!(&frame[..8], &payload[..8]);
        assert_eq!(&frame[8..], &payload[8..]);

        assert!(link.drive_until(Duration::from_secs(2), || sink.received() == i + 1));
        assert_eq!(sink.last().unwrap(), payload);
    }
}

#[test]
fn test_fast_path_returns_no_request() {
    let link = wide_short_link();
    let status = link.ep.am_put(
        AmId(0),
        Bytes::from_static(b"0123456789"),
        10,
        &Datatype::contig(1),
        callback(|_, _| panic!("fast path must not invoke callbacks")),
        0,
    );

    assert!(!status.is_ptr());
    assert!(!status.is_err());
    assert_eq!(link.sender.request_pool().in_use(), 0);
    assert_eq!(link.sender.pending_count(), 0);
}

#[test]
fn test_small_payload_header_is_padded() {
    let link = wide_short_link();
    link.ep
        .am_put(AmId(0), Bytes::from_static(&[7, 7, 7]), 3, &Datatype::contig(1), None, 0);

    let (_, frame) = link.tx.last_sent_frame().unwrap();
    assert_eq!(&frame[..], &[7, 7, 7, 0, 0, 0, 0, 0]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_short_frame_is_header_then_body(payload in proptest::collection::vec(any::<u8>(), 0..256)) {
        let link = wide_short_link();
        let len = payload.len();
        let status = link.ep.am_put(
            AmId(3),
            Bytes::from(payload.clone()),
            len,
            &Datatype::contig(1),
            None,
            0,
        );
        prop_assert_eq!(status, StatusPtr::Status(Ok(())));

        let (kind, frame) = link.tx.last_sent_frame().unwrap();
        prop_assert_eq!(kind, FrameKind::Short);
        let mut expected = payload.clone();
        if expected.len() < 8 {
            expected.resize(8, 0);
        }
        prop_assert_eq!(&frame[..], &expected[..]);
    }
}
