//! Shared scaffolding for the consumer integration tests: an aligned
//! caller-owned buffer, a consumer wired to an in-process doorbell, and the
//! producer-side helpers the device would normally run.

#![allow(dead_code)]

use std::alloc::{alloc, dealloc, Layout};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hostlink::{Consumer, Doorbell, LocalDoorbell};
use hostlink_core::layout::BufferHeader;
use hostlink_core::{buffer_alignment, buffer_size};

/// A caller-owned packet buffer, aligned and poisoned like a fresh device
/// allocation.
pub struct TestBuffer {
    ptr: *mut u8,
    layout: Layout,
}

impl TestBuffer {
    pub fn new(num_packets: u32) -> Self {
        let layout =
            Layout::from_size_align(buffer_size(num_packets), buffer_alignment() as usize)
                .unwrap();
        let ptr = unsafe { alloc(layout) };
        assert!(!ptr.is_null());
        unsafe {
            ptr.write_bytes(0xff, layout.size());
            hostlink_core::initialize_buffer(ptr, num_packets).unwrap();
        }
        Self { ptr, layout }
    }

    pub fn ptr(&self) -> *mut u8 {
        self.ptr
    }

    pub fn header(&self) -> &BufferHeader {
        unsafe { &*(self.ptr as *const BufferHeader) }
    }

    /// A copyable view for producer threads.
    pub fn shared(&self) -> SharedBuffer {
        SharedBuffer(self.ptr as *const BufferHeader)
    }
}

impl Drop for TestBuffer {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr, self.layout) };
    }
}

/// Raw buffer view handed to producer threads.
#[derive(Clone, Copy)]
pub struct SharedBuffer(*const BufferHeader);

// SAFETY: producer threads only touch the buffer through the atomic stack
// protocol, and the owning TestBuffer outlives them.
unsafe impl Send for SharedBuffer {}
unsafe impl Sync for SharedBuffer {}

impl SharedBuffer {
    pub fn header(&self) -> &BufferHeader {
        unsafe { &*self.0 }
    }
}

/// A launched consumer on a local doorbell, with the buffer registered.
pub fn launch_consumer(buffer: &TestBuffer) -> (Consumer, Arc<LocalDoorbell>) {
    let doorbell = Arc::new(LocalDoorbell::new());
    let consumer = Consumer::with_doorbell(doorbell.clone());
    consumer.launch().unwrap();
    consumer.register_buffer(buffer.ptr()).unwrap();
    (consumer, doorbell)
}

/// Fill one lane of a free packet and publish it.
///
/// Returns the packet pointer so the producer can poll its READY flag.
pub fn publish_packet(
    hb: &BufferHeader,
    doorbell: &dyn Doorbell,
    service: u32,
    activemask: u64,
    fill: impl FnOnce(&mut [[u64; 8]; 64]),
) -> u64 {
    use hostlink_core::set_ready_flag;
    use std::sync::atomic::Ordering;

    let ptr = unsafe { hostlink_core::stack::pop_free(hb) };
    {
        let header = unsafe { hostlink_core::layout::packet_header_mut(hb, ptr) };
        header.service = service;
        header.activemask = activemask;
        let control = header.control.load(Ordering::Relaxed);
        *header.control.get_mut() = set_ready_flag(control);

        let payload = unsafe { hostlink_core::layout::packet_payload_mut(hb, ptr) };
        fill(&mut payload.slots);
    }
    unsafe { hostlink_core::stack::push_ready(hb, ptr) };
    doorbell.add(1);
    ptr
}

/// True once the packet's READY flag is observed clear.
pub fn ready_flag_is_unset(hb: &BufferHeader, ptr: u64) -> bool {
    use std::sync::atomic::Ordering;
    let header = unsafe { hostlink_core::layout::packet_header(hb, ptr) };
    hostlink_core::get_ready_flag(header.control.load(Ordering::Acquire)) == 0
}

/// Poll `pred` until it holds or `millis` elapse; true means satisfied.
pub fn wait_until(pred: impl Fn() -> bool, millis: u64) -> bool {
    let deadline = Instant::now() + Duration::from_millis(millis);
    loop {
        if pred() {
            return true;
        }
        if Instant::now() > deadline {
            return false;
        }
        std::thread::sleep(Duration::from_micros(50));
    }
}
