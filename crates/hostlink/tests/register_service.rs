//! Service registry behavior through the public API.

mod common;

use common::{launch_consumer, publish_packet, ready_flag_is_unset, wait_until, TestBuffer};
use hostlink::HostcallError;

#[test]
fn duplicate_service_is_rejected() {
    hostlink::register_service(23, |slot| {
        slot[0] += 1;
        0
    })
    .unwrap();

    assert_eq!(
        hostlink::register_service(23, |_| 0),
        Err(HostcallError::InvalidRequest)
    );
}

#[test]
fn unknown_service_falls_back_to_default() {
    // The default handler (ID 0) serves packets whose service has no
    // registered handler.
    hostlink::register_service(0, |slot| {
        slot[0] = 0xd00d;
        0
    })
    .unwrap();

    let buffer = TestBuffer::new(2);
    let (consumer, doorbell) = launch_consumer(&buffer);

    let hb = buffer.header();
    let ptr = publish_packet(hb, &*doorbell, 777, 0x1, |slots| {
        slots[0][0] = 1;
    });

    assert!(wait_until(|| ready_flag_is_unset(hb, ptr), 50));
    let payload = unsafe { hostlink_core::layout::packet_payload(hb, ptr) };
    assert_eq!(payload.slots[0][0], 0xd00d);

    consumer.terminate().unwrap();
}
