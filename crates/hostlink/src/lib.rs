//! hostlink: host-side consumer runtime for GPU hostcalls.
//!
//! A GPU kernel invokes a host service by filling a packet in a shared
//! buffer, publishing it on the buffer's lock-free ready stack, and ringing
//! a doorbell. Each [`Consumer`] owns one worker thread that blocks on that
//! doorbell, drains the ready stacks of all registered buffers, dispatches
//! every active lane of every packet to its service handler, and releases
//! the packets back to their producers.
//!
//! # Typical flow
//!
//! ```ignore
//! let consumer = Consumer::create().ok_or("notification runtime unavailable")?;
//! hostlink::register_service(MY_SERVICE, |slot| { slot[0] += 1; 0 })?;
//! consumer.launch()?;
//!
//! // Per command queue: allocate, initialize, register.
//! let size = hostlink_core::buffer_size(num_packets);
//! // ... allocate `size` bytes aligned to hostlink_core::buffer_alignment() ...
//! unsafe { hostlink_core::initialize_buffer(buffer, num_packets)? };
//! consumer.register_buffer(buffer)?;
//!
//! // When the queue dies: deregister, then free.
//! consumer.deregister_buffer(buffer)?;
//! ```
//!
//! Service handlers run on the consumer thread. A handler returning non-zero
//! (or a packet naming an unregistered service with no default handler) is
//! fatal: the error hook runs once and the process exits without unwinding.

#![forbid(unsafe_op_in_unsafe_fn)]

mod consumer;
mod doorbell;
mod registry;
mod services;

pub use consumer::Consumer;
pub use doorbell::{Doorbell, LocalDoorbell, RuntimeDoorbell, SIGNAL_DONE, SIGNAL_INIT};
pub use registry::{on_error, register_service};
pub use services::{register_builtin_services, HostFunction, SERVICE_FUNCTION_CALL};

pub use hostlink_core::{ErrorCode, HostcallError};
