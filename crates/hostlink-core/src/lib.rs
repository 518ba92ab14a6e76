//! hostlink-core: shared-memory contract for the hostlink call channel.
//!
//! This crate defines the canonical `repr(C)` layouts of the packet buffer
//! shared between GPU producers and the host consumer, together with the
//! lock-free stack protocol that moves packets between them. The layouts are
//! bit-exact with the device-side header; changing them breaks the wire
//! format.
//!
//! # Memory layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  BufferHeader (48 bytes)                                        │
//! │    doorbell, headers, payloads, index_size,                     │
//! │    free_stack, ready_stack                                      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  PacketHeader[num_packets]   each { next, activemask,           │
//! │                                     service, control }          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  PacketPayload[num_packets]  each 64 lanes × 8 u64 slots        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Packet life cycle
//!
//! A packet lives on exactly one of two per-buffer Treiber stacks, or is
//! in flight between them:
//!
//! - a producing wave pops a packet from the **free stack**, fills the
//!   header and its lanes' payload slots, sets the READY control bit, and
//!   pushes the packet onto the **ready stack** with a release CAS;
//! - the consumer swaps the whole ready stack out with a single acquire
//!   exchange, walks the private chain, dispatches each active lane, and
//!   clears READY with a release store;
//! - the producer polls READY and, once clear, reads its response from the
//!   same payload slots and pushes the packet back onto the free stack with
//!   a bumped generation tag.
//!
//! The generation tag in the upper bits of every packet pointer defeats ABA
//! on the free-stack CAS; see [`packet`].

#![forbid(unsafe_op_in_unsafe_fn)]

pub mod control;
pub mod error;
pub mod layout;
pub mod packet;
pub mod stack;

pub use control::{get_ready_flag, reset_ready_flag, set_control_field, set_ready_flag};
pub use error::{ErrorCode, HostcallError};
pub use layout::{
    buffer_alignment, buffer_size, initialize_buffer, BufferHeader, PacketHeader, PacketPayload,
    NUM_LANES, SLOTS_PER_LANE,
};
