//! Built-in services.
//!
//! Only one ships today: the function-call trampoline, which lets device
//! code invoke an arbitrary host function by address.

use hostlink_core::HostcallError;

use crate::registry::register_service;

/// Service ID of the built-in function-call trampoline.
pub const SERVICE_FUNCTION_CALL: u32 = 1;

/// Signature accepted by the function-call service.
///
/// Up to seven 64-bit arguments arrive through `input`; up to two 64-bit
/// results leave through `output`. The meaning of both is defined by the
/// function being invoked.
pub type HostFunction = extern "C" fn(output: *mut u64, input: *const u64);

/// Register the built-in services with the process-wide registry.
///
/// Idempotence is not provided: registering twice reports `InvalidRequest`
/// like any other duplicate.
pub fn register_builtin_services() -> Result<(), HostcallError> {
    register_service(SERVICE_FUNCTION_CALL, |slot| {
        // Lane layout: [fn_ptr, arg0 .. arg6]. The two output words overwrite
        // the function pointer and the first argument.
        // SAFETY: the device side promises slot[0] is a valid HostFunction.
        let func = unsafe { std::mem::transmute::<usize, HostFunction>(slot[0] as usize) };
        let mut output = [0u64; 2];
        func(output.as_mut_ptr(), slot[1..].as_ptr());
        slot[0] = output[0];
        slot[1] = output[1];
        0
    })
}
