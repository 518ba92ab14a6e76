//! The lock-free stack protocol over a packet buffer.
//!
//! Producers (device waves) pop from the free stack, publish on the ready
//! stack, and later recycle packets back onto the free stack with a bumped
//! generation tag. The host consumer performs exactly two operations: a
//! single atomic exchange that drains the ready stack, and a release store
//! that clears a packet's READY bit.
//!
//! The producer-side operations here mirror the device implementation
//! one-to-one. They exist so host-side tests (and host-resident producers)
//! can drive a buffer through the identical protocol.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::control::reset_ready_flag;
use crate::layout::{packet_header, BufferHeader, PacketHeader};
use crate::packet;

// Bounded spin before yielding to the scheduler on a contended CAS.
const SPIN_LIMIT: u32 = 128;

#[inline]
fn backoff(spins: &mut u32) {
    if *spins < SPIN_LIMIT {
        std::hint::spin_loop();
        *spins += 1;
    } else {
        std::thread::yield_now();
    }
}

/// Pop a packet pointer from the free stack, spinning while it is empty.
///
/// An empty free stack means every packet is held by some wave; the pop
/// retries until one is recycled.
///
/// # Safety
///
/// `buffer` must have been initialized by
/// [`initialize_buffer`](crate::layout::initialize_buffer).
pub unsafe fn pop_free(buffer: &BufferHeader) -> u64 {
    let top = &buffer.free_stack;
    let mut current = top.load(Ordering::Acquire);
    let mut spins = 0;
    loop {
        if current == packet::EMPTY {
            backoff(&mut spins);
            current = top.load(Ordering::Acquire);
            continue;
        }
        let header = unsafe { packet_header(buffer, current) };
        let next = header.next.load(Ordering::Relaxed);
        match top.compare_exchange(current, next, Ordering::Acquire, Ordering::Relaxed) {
            Ok(_) => return current,
            Err(observed) => {
                current = observed;
                backoff(&mut spins);
            }
        }
    }
}

unsafe fn push(buffer: &BufferHeader, top: &AtomicU64, ptr: u64) {
    let header = unsafe { packet_header(buffer, ptr) };
    let mut current = top.load(Ordering::Relaxed);
    let mut spins = 0;
    loop {
        header.next.store(current, Ordering::Relaxed);
        match top.compare_exchange(current, ptr, Ordering::Release, Ordering::Relaxed) {
            Ok(_) => return,
            Err(observed) => {
                current = observed;
                backoff(&mut spins);
            }
        }
    }
}

/// Publish a filled packet on the ready stack.
///
/// The release CAS makes the packet's header and payload visible to the
/// consumer's acquire drain.
///
/// # Safety
///
/// `buffer` must be initialized and the caller must own the packet (popped
/// from the free stack and not yet published).
pub unsafe fn push_ready(buffer: &BufferHeader, ptr: u64) {
    unsafe { push(buffer, &buffer.ready_stack, ptr) };
}

/// Recycle a finished packet onto the free stack.
///
/// Bumps the pointer's generation tag first; see [`packet::bump_tag`].
///
/// # Safety
///
/// `buffer` must be initialized and the caller must own the packet (its
/// READY bit observed clear after publication).
pub unsafe fn push_free(buffer: &BufferHeader, ptr: u64) {
    let tagged = packet::bump_tag(ptr, buffer.index_size);
    unsafe { push(buffer, &buffer.free_stack, tagged) };
}

/// Drain the ready stack, returning a chain private to the caller.
///
/// A single acquire exchange; the returned head (possibly [`packet::EMPTY`])
/// links packets latest-published-first through their `next` fields.
pub fn take_ready(buffer: &BufferHeader) -> u64 {
    buffer.ready_stack.swap(packet::EMPTY, Ordering::Acquire)
}

/// Hand a fully processed packet back to its producer.
///
/// Clears the READY bit with release ordering, preserving all other control
/// bits. The producer's acquire poll on `control` then observes the
/// handler's writes to the payload.
pub fn release_packet(header: &PacketHeader) {
    let control = header.control.load(Ordering::Relaxed);
    header.control.store(reset_ready_flag(control), Ordering::Release);
}
