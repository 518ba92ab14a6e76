//! Many concurrent producers hammering one buffer.
//!
//! Each producer thread plays the part of a wave: pop a free packet, fill
//! it, publish, ring the doorbell, poll READY, check the response, recycle.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{launch_consumer, wait_until, TestBuffer};
use hostlink::Doorbell;
use hostlink_core::layout::{packet_header, packet_header_mut, packet_payload, packet_payload_mut};
use hostlink_core::{get_ready_flag, set_ready_flag, stack};

const TEST_SERVICE: u32 = 23;
const NUM_THREADS: usize = 1000;
const ROUNDS: u64 = 10;

#[test]
fn many_waves() {
    hostlink::register_service(TEST_SERVICE, |slot| {
        slot[0] += 1;
        0
    })
    .unwrap();

    let buffer = TestBuffer::new(NUM_THREADS as u32);
    let (consumer, doorbell) = launch_consumer(&buffer);

    let shared = buffer.shared();
    let done = Arc::new(AtomicU32::new(0));
    // Line the producers up behind a common start time.
    let start = Instant::now() + Duration::from_millis(50);

    let producers: Vec<_> = (0..NUM_THREADS)
        .map(|id| {
            let done = Arc::clone(&done);
            let doorbell = Arc::clone(&doorbell);
            std::thread::spawn(move || {
                std::thread::sleep(start.saturating_duration_since(Instant::now()));
                let hb = shared.header();

                for i in 0..ROUNDS {
                    let ptr = unsafe { stack::pop_free(hb) };
                    {
                        let header = unsafe { packet_header_mut(hb, ptr) };
                        header.service = TEST_SERVICE;
                        header.activemask = 1;
                        let control = header.control.load(Ordering::Relaxed);
                        *header.control.get_mut() = set_ready_flag(control);
                        let payload = unsafe { packet_payload_mut(hb, ptr) };
                        payload.slots[0][0] = id as u64 * i;
                    }
                    unsafe { stack::push_ready(hb, ptr) };
                    doorbell.add(1);

                    let header = unsafe { packet_header(hb, ptr) };
                    while get_ready_flag(header.control.load(Ordering::Acquire)) != 0 {
                        std::thread::sleep(Duration::from_micros(50));
                    }

                    let payload = unsafe { packet_payload(hb, ptr) };
                    assert_eq!(payload.slots[0][0], id as u64 * i + 1);
                    unsafe { stack::push_free(hb, ptr) };
                    std::thread::sleep(Duration::from_micros(10));
                }
                done.fetch_add(1, Ordering::Relaxed);
            })
        })
        .collect();

    assert!(
        wait_until(|| done.load(Ordering::Relaxed) == NUM_THREADS as u32, 500),
        "only {}/{NUM_THREADS} producers finished",
        done.load(Ordering::Relaxed)
    );

    for producer in producers {
        producer.join().unwrap();
    }

    consumer.terminate().unwrap();
}
