//! Integration tests for room isolation, broadcast, capacity, and
//! backpressure, driving the transport-independent room core directly.

use bytes::Bytes;

use rz_core::types::PrincipalId;
use rz_relay::{RelayError, RelayLimits, RoomRegistry};

fn alice() -> PrincipalId {
    PrincipalId::new("alice")
}

fn bob() -> PrincipalId {
    PrincipalId::new("bob")
}

fn registry_with(capacity: usize, queue_depth: usize) -> RoomRegistry {
    RoomRegistry::new(RelayLimits { room_capacity: capacity, outbound_queue_depth: queue_depth })
}

#[tokio::test]
async fn broadcast_reaches_others_but_not_sender() {
    let reg = registry_with(8, 16);

    let mut dev1 = reg.join("alice-vault", &alice()).unwrap();
    let mut dev2 = reg.join("alice-vault", &alice()).unwrap();
    let mut dev3 = reg.join("alice-vault", &alice()).unwrap();

    let frame = Bytes::from_static(b"crdt-delta-0001");
    let delivered = reg.publish(&dev1.handle, frame.clone());
    assert_eq!(delivered, 2);

    assert_eq!(dev2.outbound.recv().await.unwrap(), frame);
    assert_eq!(dev3.outbound.recv().await.unwrap(), frame);

    // No echo to the sender.
    assert!(dev1.outbound.try_recv().is_err());
}

#[tokio::test]
async fn foreign_principal_cannot_join_or_observe() {
    let reg = registry_with(8, 16);

    let mut alice_dev = reg.join("alice-vault", &alice()).unwrap();

    // Bob is authenticated, but not as the room owner.
    let result = reg.join("alice-vault", &bob());
    assert!(matches!(result, Err(RelayError::OwnerMismatch { .. })));

    // Bob's own room traffic never reaches Alice's devices.
    let bob_dev = reg.join("bob-vault", &bob()).unwrap();
    reg.publish(&bob_dev.handle, Bytes::from_static(b"bob-frame"));

    assert!(alice_dev.outbound.try_recv().is_err());
    assert_eq!(reg.room_count(), 2);
}

#[tokio::test]
async fn capacity_ceiling_rejects_with_explicit_error() {
    let reg = registry_with(2, 16);

    let _d1 = reg.join("alice-vault", &alice()).unwrap();
    let _d2 = reg.join("alice-vault", &alice()).unwrap();

    let result = reg.join("alice-vault", &alice());
    assert!(matches!(result, Err(RelayError::CapacityExceeded { limit: 2, .. })));

    // Existing members are unaffected.
    assert_eq!(reg.device_count(), 2);
}

#[tokio::test]
async fn new_joiner_catches_up_from_snapshot() {
    let reg = registry_with(8, 16);

    let dev1 = reg.join("alice-vault", &alice()).unwrap();
    reg.publish(&dev1.handle, Bytes::from_static(b"update-1"));
    reg.publish(&dev1.handle, Bytes::from_static(b"update-2"));

    // A reconnecting device gets the full log at join time, in order,
    // without replaying history through the broadcast path.
    let mut dev2 = reg.join("alice-vault", &alice()).unwrap();
    assert_eq!(dev2.snapshot.len(), 2);
    assert_eq!(dev2.snapshot[0], Bytes::from_static(b"update-1"));
    assert_eq!(dev2.snapshot[1], Bytes::from_static(b"update-2"));

    // And receives live frames from then on.
    reg.publish(&dev1.handle, Bytes::from_static(b"update-3"));
    assert_eq!(dev2.outbound.recv().await.unwrap(), Bytes::from_static(b"update-3"));
}

#[tokio::test]
async fn slow_consumer_is_disconnected_not_blocking() {
    let reg = registry_with(8, 2);

    let dev1 = reg.join("alice-vault", &alice()).unwrap();
    let dev2 = reg.join("alice-vault", &alice()).unwrap(); // never drains
    let mut dev3 = reg.join("alice-vault", &alice()).unwrap();

    // dev2's queue (depth 2) overflows on the third frame.
    for i in 0..5u8 {
        reg.publish(&dev1.handle, Bytes::copy_from_slice(&[i]));
        // dev3 keeps draining, so it must see every frame.
        assert_eq!(dev3.outbound.recv().await.unwrap(), Bytes::copy_from_slice(&[i]));
    }

    // dev2 got dropped from the room after its queue filled.
    assert_eq!(reg.device_count(), 2);

    // Its receiver yields the buffered frames and then closes.
    let mut dev2_rx = dev2.outbound;
    assert!(dev2_rx.recv().await.is_some());
    assert!(dev2_rx.recv().await.is_some());
    assert!(dev2_rx.recv().await.is_none(), "relay must have dropped the sender");
}

#[tokio::test]
async fn frames_are_forwarded_verbatim() {
    let reg = registry_with(8, 16);

    let dev1 = reg.join("alice-vault", &alice()).unwrap();
    let mut dev2 = reg.join("alice-vault", &alice()).unwrap();

    // Arbitrary high-entropy bytes: the relay must not parse, trim, or
    // re-encode anything.
    let frame: Bytes = (0..=255u8).collect::<Vec<u8>>().into();
    reg.publish(&dev1.handle, frame.clone());

    assert_eq!(dev2.outbound.recv().await.unwrap(), frame);
}

#[tokio::test]
async fn room_teardown_discards_snapshot() {
    let reg = registry_with(8, 16);

    let dev1 = reg.join("alice-vault", &alice()).unwrap();
    reg.publish(&dev1.handle, Bytes::from_static(b"ephemeral"));
    reg.leave(&dev1.handle);

    assert_eq!(reg.room_count(), 0);

    // The in-memory log is not authoritative storage: a fresh room
    // starts empty.
    let dev2 = reg.join("alice-vault", &alice()).unwrap();
    assert!(dev2.snapshot.is_empty());
}

#[tokio::test]
async fn stats_count_forwarded_frames() {
    let reg = registry_with(8, 16);

    let dev1 = reg.join("alice-vault", &alice()).unwrap();
    let _dev2 = reg.join("alice-vault", &alice()).unwrap();

    reg.publish(&dev1.handle, Bytes::from_static(b"a"));
    reg.publish(&dev1.handle, Bytes::from_static(b"b"));

    assert_eq!(reg.stats().frames_forwarded(), 2);
    assert_eq!(reg.stats().auth_failures(), 0);
}
