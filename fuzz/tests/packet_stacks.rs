//! Bolero harness for the stack-protocol model.
//!
//! Properties:
//! - every packet is always in exactly one place
//! - pointer values never repeat across pops (the tag defeats ABA)
//! - the consumer drain is exclusive
//! - recycled packets become poppable again

use bolero::check;
use hostlink_fuzz::stack_model::{execute_and_verify, StackOp, MAX_PACKETS, MIN_PACKETS};

fn main() {
    check!()
        .with_type::<(u8, Vec<OpInput>)>()
        .for_each(|(packets_byte, ops)| {
            let num_packets =
                (*packets_byte as u32 % (MAX_PACKETS - MIN_PACKETS + 1)) + MIN_PACKETS;
            let ops: Vec<StackOp> = ops.iter().map(OpInput::to_op).collect();
            if let Err(e) = execute_and_verify(num_packets, &ops) {
                panic!("invariant violated: {e}");
            }
        });
}

/// Fuzz-friendly input type for stack operations.
#[derive(Debug, Clone, bolero::TypeGenerator)]
enum OpInput {
    PopFree,
    PushReady(u8),
    DrainAndRecycle,
}

impl OpInput {
    fn to_op(&self) -> StackOp {
        match self {
            OpInput::PopFree => StackOp::PopFree,
            OpInput::PushReady(slot) => StackOp::PushReady(*slot),
            OpInput::DrainAndRecycle => StackOp::DrainAndRecycle,
        }
    }
}
