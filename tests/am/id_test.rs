/*!
 * Active-Message Id Tests
 * Public/wire id translation and handler registration
 */

use super::common::{link, sized_payload, Sink};
use am_core::core::limits::{AM_ID_MAX, AM_ID_RESERVED};
use am_core::{AmError, AmHandlerFlags, AmId, Datatype, DeliveryMode, RecvStatus, StatusPtr, WireAmId};
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    #[test]
    fn prop_valid_ids_round_trip(id in 0u8..=AmId::MAX.0) {
        let wire = AmId(id).to_wire().unwrap();
        prop_assert!(wire.0 >= AM_ID_RESERVED && wire.0 < AM_ID_MAX);
        prop_assert_eq!(wire.to_public(), Some(AmId(id)));
    }

    #[test]
    fn prop_out_of_range_ids_rejected(id in (AmId::MAX.0 + 1)..=u8::MAX) {
        prop_assert!(matches!(AmId(id).to_wire(), Err(AmError::InvalidParameter(_))));
    }

    #[test]
    fn prop_reserved_wire_ids_have_no_public_form(wire in 0u8..AM_ID_RESERVED) {
        prop_assert_eq!(WireAmId(wire).to_public(), None);
    }
}

#[test]
fn test_register_rejects_out_of_range() {
    let link = link(DeliveryMode::Signal);
    let result = link.receiver.set_am_handler(
        AmId(AmId::MAX.0 + 1),
        |_, _| RecvStatus::Consumed,
        AmHandlerFlags::SYNC,
    );
    assert!(matches!(result, Err(AmError::InvalidParameter(_))));
    // Lock and block are released on the error path
    assert!(!link.receiver.async_context().is_blocked());

    let status = link
        .ep
        .am_put(AmId(200), sized_payload(8), 8, &Datatype::contig(1), None, 0);
    assert!(matches!(
        status,
        StatusPtr::Status(Err(AmError::InvalidParameter(_)))
    ));
}

#[test]
fn test_ids_reach_their_own_handlers() {
    let link = link(DeliveryMode::Signal);
    let sinks: Vec<Sink> = (0..=AmId::MAX.0).map(|_| Sink::default()).collect();
    for (id, sink) in sinks.iter().enumerate() {
        sink.install(&link.receiver, AmId(id as u8), AmHandlerFlags::SYNC);
    }

    for id in 0..=AmId::MAX.0 {
        for _ in 0..=id {
            link.ep
                .am_put(AmId(id), sized_payload(16), 16, &Datatype::contig(1), None, 0);
        }
    }

    let total: usize = (1..=AmId::MAX.0 as usize + 1).sum();
    assert!(link.drive_until(Duration::from_secs(2), || {
        sinks.iter().map(Sink::received).sum::<usize>() == total
    }));
    for (id, sink) in sinks.iter().enumerate() {
        assert_eq!(sink.received(), id + 1);
    }
}

#[test]
fn test_handler_replaced_on_reregistration() {
    let link = link(DeliveryMode::Signal);
    let first = Sink::default();
    let second = Sink::default();
    first.install(&link.receiver, AmId(4), AmHandlerFlags::SYNC);
    second.install(&link.receiver, AmId(4), AmHandlerFlags::SYNC);

    link.ep
        .am_put(AmId(4), sized_payload(8), 8, &Datatype::contig(1), None, 0);
    assert!(link.drive_until(Duration::from_secs(2), || second.received() == 1));
    assert_eq!(first.received(), 0);
}

#[test]
fn test_unhandled_id_is_dropped() {
    let link = link(DeliveryMode::Signal);
    link.ep
        .am_put(AmId(6), sized_payload(8), 8, &Datatype::contig(1), None, 0);
    assert!(link.drive_until(Duration::from_secs(2), || link.rx.stats().dropped == 1));
    assert_eq!(link.rx.stats().delivered, 0);
}

#[test]
fn test_handler_installed_on_late_interface() {
    let link = link(DeliveryMode::Signal);
    let sink = Sink::default();
    sink.install(&link.receiver, AmId(5), AmHandlerFlags::SYNC);

    let late_rx = am_core::transport::LoopbackIface::with_defaults("late-rx");
    link.receiver.add_iface(late_rx.clone()).unwrap();
    let ep = am_core::Endpoint::connect(&link.sender, link.tx.connect(&late_rx)).unwrap();

    ep.am_put(AmId(5), sized_payload(8), 8, &Datatype::contig(1), None, 0);
    assert!(link.drive_until(Duration::from_secs(2), || sink.received() == 1));
    assert_eq!(late_rx.stats().delivered, 1);
}
