//! A heap-backed packet buffer for driving the real stack operations.

use std::alloc::{alloc, dealloc, Layout};

use hostlink_core::layout::BufferHeader;
use hostlink_core::{buffer_alignment, buffer_size};

/// An initialized, properly aligned packet buffer on the heap.
pub struct RawBuffer {
    ptr: *mut u8,
    layout: Layout,
}

impl RawBuffer {
    pub fn new(num_packets: u32) -> Self {
        let layout =
            Layout::from_size_align(buffer_size(num_packets), buffer_alignment() as usize)
                .expect("buffer layout");
        let ptr = unsafe { alloc(layout) };
        assert!(!ptr.is_null(), "allocation failed");
        unsafe {
            // Poison first so stale reads stand out, then initialize.
            ptr.write_bytes(0xff, layout.size());
            hostlink_core::initialize_buffer(ptr, num_packets).expect("initialize_buffer");
        }
        Self { ptr, layout }
    }

    pub fn header(&self) -> &BufferHeader {
        unsafe { &*(self.ptr as *const BufferHeader) }
    }
}

impl Drop for RawBuffer {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr, self.layout) };
    }
}
