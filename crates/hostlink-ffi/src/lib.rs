//! C API for the hostlink consumer runtime.
//!
//! A thin `extern "C"` veneer over [`hostlink`]: opaque consumer handles,
//! a fixed-order status enum, and raw-pointer handler registration. Every
//! entry point returns a status code; none panics across the boundary.
//!
//! # Handler state
//!
//! The `state` pointers supplied to `hostlink_register_service` and
//! `hostlink_on_error` are passed back on the consumer thread. The caller
//! guarantees they stay valid for the process lifetime and that the handlers
//! synchronize any access to the pointed-to data.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_int, c_void};

use hostlink::{Consumer, HostcallError};
use hostlink_core::{ErrorCode, SLOTS_PER_LANE};

/// Service handler: `(state, service, payload)` over eight 64-bit slots,
/// returning zero on success. Non-zero is fatal.
pub type hostlink_service_handler_t =
    extern "C" fn(state: *mut c_void, service: u32, payload: *mut u64) -> c_int;

/// Error handler: `(state, error)` invoked once before a fatal exit.
pub type hostlink_error_handler_t = extern "C" fn(state: *mut c_void, error: c_int);

// Raw state pointer carried into the registry closures. The C contract
// (documented above) makes this sound.
#[derive(Clone, Copy)]
struct StatePtr(*mut c_void);
unsafe impl Send for StatePtr {}
unsafe impl Sync for StatePtr {}

fn status(result: Result<(), HostcallError>) -> ErrorCode {
    match result {
        Ok(()) => ErrorCode::Success,
        Err(err) => err.code(),
    }
}

/// Create a consumer. Writes the new handle through `consumer`.
///
/// Returns `HOSTLINK_INTERNAL_ERROR` when the notification runtime is
/// unavailable, `HOSTLINK_ERROR_NULLPTR` on a null out-parameter.
///
/// # Safety
///
/// `consumer`, when non-null, must be valid for a pointer write.
#[no_mangle]
pub unsafe extern "C" fn hostlink_create_consumer(consumer: *mut *mut Consumer) -> ErrorCode {
    if consumer.is_null() {
        return ErrorCode::Nullptr;
    }
    match Consumer::create() {
        Some(created) => {
            unsafe { consumer.write(Box::into_raw(Box::new(created))) };
            ErrorCode::Success
        }
        None => ErrorCode::InternalError,
    }
}

/// Terminate (if active) and free a consumer.
///
/// # Safety
///
/// `consumer` must have come from `hostlink_create_consumer` and must not
/// be used afterwards; a second destroy of the same handle is undefined.
#[no_mangle]
pub unsafe extern "C" fn hostlink_destroy_consumer(consumer: *mut Consumer) -> ErrorCode {
    if consumer.is_null() {
        return ErrorCode::Nullptr;
    }
    drop(unsafe { Box::from_raw(consumer) });
    ErrorCode::Success
}

/// Launch the consumer's worker thread.
///
/// # Safety
///
/// `consumer` must be a live handle from `hostlink_create_consumer`.
#[no_mangle]
pub unsafe extern "C" fn hostlink_launch_consumer(consumer: *mut Consumer) -> ErrorCode {
    let Some(consumer) = (unsafe { consumer.as_ref() }) else {
        return ErrorCode::Nullptr;
    };
    status(consumer.launch())
}

/// Register an initialized buffer with a consumer. Idempotent.
///
/// # Safety
///
/// `consumer` must be a live handle; `buffer` must point to memory that was
/// successfully passed through `hostlink_initialize_buffer` and stays alive
/// until the drain pass after deregistration.
#[no_mangle]
pub unsafe extern "C" fn hostlink_register_buffer(
    consumer: *mut Consumer,
    buffer: *mut c_void,
) -> ErrorCode {
    let Some(consumer) = (unsafe { consumer.as_ref() }) else {
        return ErrorCode::Nullptr;
    };
    status(consumer.register_buffer(buffer as *mut u8))
}

/// Deregister a buffer. The buffer may be freed only after the consumer's
/// next drain pass; `HOSTLINK_ERROR_INVALID_REQUEST` if it was never
/// registered or already deregistered.
///
/// # Safety
///
/// `consumer` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn hostlink_deregister_buffer(
    consumer: *mut Consumer,
    buffer: *mut c_void,
) -> ErrorCode {
    let Some(consumer) = (unsafe { consumer.as_ref() }) else {
        return ErrorCode::Nullptr;
    };
    status(consumer.deregister_buffer(buffer as *mut u8))
}

/// Register a service handler with the process-wide registry.
///
/// Service ID 0 is the default handler, invoked for packets whose service
/// has no registered handler. `HOSTLINK_ERROR_INVALID_REQUEST` if the
/// service is already registered.
///
/// # Safety
///
/// `handler` and `state` must satisfy the handler-state contract in the
/// crate docs.
#[no_mangle]
pub unsafe extern "C" fn hostlink_register_service(
    service: u32,
    handler: hostlink_service_handler_t,
    state: *mut c_void,
) -> ErrorCode {
    let state = StatePtr(state);
    status(hostlink::register_service(service, move |slot: &mut [u64; SLOTS_PER_LANE]| {
        let state = state;
        handler(state.0, service, slot.as_mut_ptr())
    }))
}

/// Register the handler invoked once before the process terminates on a
/// fatal dispatch error. `HOSTLINK_ERROR_INVALID_REQUEST` if a handler is
/// already installed.
///
/// # Safety
///
/// `handler` and `state` must satisfy the handler-state contract in the
/// crate docs.
#[no_mangle]
pub unsafe extern "C" fn hostlink_on_error(
    handler: hostlink_error_handler_t,
    state: *mut c_void,
) -> ErrorCode {
    let state = StatePtr(state);
    status(hostlink::on_error(move |error: i32| {
        let state = state;
        handler(state.0, error)
    }))
}

/// Initialize the packet data structures in a caller-allocated buffer of at
/// least `hostlink_get_buffer_size(num_packets)` bytes.
///
/// # Safety
///
/// `buffer`, when non-null and aligned, must be valid for writes of that
/// many bytes.
#[no_mangle]
pub unsafe extern "C" fn hostlink_initialize_buffer(
    buffer: *mut c_void,
    num_packets: u32,
) -> ErrorCode {
    status(unsafe { hostlink_core::initialize_buffer(buffer as *mut u8, num_packets) })
}

/// Buffer size required for `num_packets` packets, padding included.
#[no_mangle]
pub extern "C" fn hostlink_get_buffer_size(num_packets: u32) -> usize {
    hostlink_core::buffer_size(num_packets)
}

/// Alignment required for the start of the buffer.
#[no_mangle]
pub extern "C" fn hostlink_get_buffer_alignment() -> u32 {
    hostlink_core::buffer_alignment()
}

/// Route library diagnostics to standard output at debug verbosity.
///
/// Installs a process-global subscriber; the first collector wins, so this
/// is a no-op when the embedding application already set one up.
#[no_mangle]
pub extern "C" fn hostlink_enable_debug() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// The canonical name of a status code, as a static NUL-terminated string.
#[no_mangle]
pub extern "C" fn hostlink_error_string(error: c_int) -> *const c_char {
    match ErrorCode::from_raw(error) {
        Some(ErrorCode::Success) => c"HOSTLINK_SUCCESS".as_ptr(),
        Some(ErrorCode::ConsumerActive) => c"HOSTLINK_ERROR_CONSUMER_ACTIVE".as_ptr(),
        Some(ErrorCode::ConsumerInactive) => c"HOSTLINK_ERROR_CONSUMER_INACTIVE".as_ptr(),
        Some(ErrorCode::ConsumerLaunchFailed) => {
            c"HOSTLINK_ERROR_CONSUMER_LAUNCH_FAILED".as_ptr()
        }
        Some(ErrorCode::InvalidRequest) => c"HOSTLINK_ERROR_INVALID_REQUEST".as_ptr(),
        Some(ErrorCode::ServiceUnknown) => c"HOSTLINK_ERROR_SERVICE_UNKNOWN".as_ptr(),
        Some(ErrorCode::IncorrectAlignment) => c"HOSTLINK_ERROR_INCORRECT_ALIGNMENT".as_ptr(),
        Some(ErrorCode::Nullptr) => c"HOSTLINK_ERROR_NULLPTR".as_ptr(),
        Some(ErrorCode::InternalError) => c"HOSTLINK_INTERNAL_ERROR".as_ptr(),
        None => c"HOSTLINK_ERROR_UNKNOWN".as_ptr(),
    }
}
