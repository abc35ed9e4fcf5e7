/*!
 * Handler Registration Tests
 * An interface refusing a handler leaves no other interface stale
 */

use super::common::{link, sized_payload, Sink};
use am_core::core::types::EventFd;
use am_core::transport::{AmHandler, EventNotifier, IfaceAttr, LoopbackConfig, LoopbackIface};
use am_core::{
    AmError, AmHandlerFlags, AmId, AmResult, Datatype, DeliveryMode, Endpoint, RecvStatus,
    TransportIface, Worker, WireAmId,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// Interface that refuses every handler it is offered
#[derive(Default)]
struct RefusingIface {
    offered: Mutex<Vec<WireAmId>>,
}

impl TransportIface for RefusingIface {
    fn name(&self) -> &str {
        "refusing"
    }

    fn attr(&self) -> IfaceAttr {
        LoopbackConfig::default().attr
    }

    fn set_am_handler(&self, id: WireAmId, _handler: AmHandler, _flags: u32) -> AmResult<()> {
        self.offered.lock().push(id);
        Err(AmError::Transport(format!("handler table full for {}", id)))
    }

    fn progress(&self) -> usize {
        0
    }

    fn progress_async(&self) -> usize {
        0
    }

    fn event_fd(&self) -> Option<EventFd> {
        None
    }

    fn arm(&self, _notifier: EventNotifier) {}
}

fn register(worker: &Worker, id: AmId, sink: &Sink) -> AmResult<()> {
    let sink = sink.clone();
    worker.set_am_handler(
        id,
        move |data, _flags| {
            sink.payloads.lock().push(data.clone());
            sink.count.fetch_add(1, Ordering::SeqCst);
            RecvStatus::Consumed
        },
        AmHandlerFlags::SYNC,
    )
}

#[test]
fn test_refusing_interface_does_not_stop_registration() {
    let link = link(DeliveryMode::Signal);
    let refusing = Arc::new(RefusingIface::default());
    link.receiver.add_iface(refusing.clone()).unwrap();
    let after_rx = LoopbackIface::with_defaults("after-rx");
    link.receiver.add_iface(after_rx.clone()).unwrap();
    let after_ep = Endpoint::connect(&link.sender, link.tx.connect(&after_rx)).unwrap();

    let stale = Sink::default();
    let current = Sink::default();
    for sink in [&stale, &current] {
        let err = register(&link.receiver, AmId(2), sink).unwrap_err();
        assert!(matches!(err, AmError::Transport(_)));
    }
    assert_eq!(refusing.offered.lock().len(), 2);

    let dt = Datatype::contig(1);
    // Interfaces on both sides of the refusing one hold the newest handler
    link.ep.am_put(AmId(2), sized_payload(16), 16, &dt, None, 0);
    assert!(link.drive_until(Duration::from_secs(2), || current.received() == 1));
    after_ep.am_put(AmId(2), sized_payload(24), 24, &dt, None, 0);
    assert!(link.drive_until(Duration::from_secs(2), || current.received() == 2));

    // Interfaces attached later get the newest handler replayed
    let late_rx = LoopbackIface::with_defaults("late-rx");
    link.receiver.add_iface(late_rx.clone()).unwrap();
    let late_ep = Endpoint::connect(&link.sender, link.tx.connect(&late_rx)).unwrap();
    late_ep.am_put(AmId(2), sized_payload(32), 32, &dt, None, 0);
    assert!(link.drive_until(Duration::from_secs(2), || current.received() == 3));

    assert_eq!(stale.received(), 0);
    assert_eq!(late_rx.stats().delivered, 1);
}

#[test]
fn test_iface_refusing_replay_is_not_attached() {
    let link = link(DeliveryMode::Signal);
    let kept = Sink::default();
    kept.install(&link.receiver, AmId(3), AmHandlerFlags::SYNC);

    link.receiver
        .add_iface(Arc::new(RefusingIface::default()))
        .unwrap_err();
    assert_eq!(link.receiver.iface_count(), 1);

    link.ep
        .am_put(AmId(3), sized_payload(8), 8, &Datatype::contig(1), None, 0);
    assert!(link.drive_until(Duration::from_secs(2), || kept.received() == 1));
}
