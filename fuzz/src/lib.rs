//! hostlink-fuzz: pure in-memory models of the packet stack protocol for
//! property-based testing, plus a heap-backed harness around the real
//! buffer operations.

pub mod raw_buffer;
pub mod stack_model;
