//! Status codes shared by the Rust API and the C surface.

use thiserror::Error;

/// C-compatible status code. The numeric order is part of the ABI and must
/// not change.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Operation completed.
    Success = 0,
    /// The consumer thread is already running.
    ConsumerActive,
    /// The consumer thread is not running.
    ConsumerInactive,
    /// The consumer thread could not be spawned.
    ConsumerLaunchFailed,
    /// The request conflicts with current registry state.
    InvalidRequest,
    /// A packet named a service with no registered handler.
    ServiceUnknown,
    /// The buffer pointer is not aligned to `buffer_alignment()`.
    IncorrectAlignment,
    /// A required pointer was null.
    Nullptr,
    /// The notification runtime is unavailable.
    InternalError,
}

impl ErrorCode {
    /// The canonical name, as reported by the C API's `error_string`.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Success => "HOSTLINK_SUCCESS",
            ErrorCode::ConsumerActive => "HOSTLINK_ERROR_CONSUMER_ACTIVE",
            ErrorCode::ConsumerInactive => "HOSTLINK_ERROR_CONSUMER_INACTIVE",
            ErrorCode::ConsumerLaunchFailed => "HOSTLINK_ERROR_CONSUMER_LAUNCH_FAILED",
            ErrorCode::InvalidRequest => "HOSTLINK_ERROR_INVALID_REQUEST",
            ErrorCode::ServiceUnknown => "HOSTLINK_ERROR_SERVICE_UNKNOWN",
            ErrorCode::IncorrectAlignment => "HOSTLINK_ERROR_INCORRECT_ALIGNMENT",
            ErrorCode::Nullptr => "HOSTLINK_ERROR_NULLPTR",
            ErrorCode::InternalError => "HOSTLINK_INTERNAL_ERROR",
        }
    }

    /// Whether this code reports success.
    pub fn is_success(self) -> bool {
        self == ErrorCode::Success
    }

    /// Decode a raw integer received over the C ABI.
    pub fn from_raw(value: i32) -> Option<ErrorCode> {
        Some(match value {
            0 => ErrorCode::Success,
            1 => ErrorCode::ConsumerActive,
            2 => ErrorCode::ConsumerInactive,
            3 => ErrorCode::ConsumerLaunchFailed,
            4 => ErrorCode::InvalidRequest,
            5 => ErrorCode::ServiceUnknown,
            6 => ErrorCode::IncorrectAlignment,
            7 => ErrorCode::Nullptr,
            8 => ErrorCode::InternalError,
            _ => return None,
        })
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the fallible Rust entry points.
///
/// Each variant maps 1:1 onto an [`ErrorCode`]; the worker thread itself
/// never returns one of these (fatal dispatch errors terminate the process
/// instead).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostcallError {
    #[error("consumer thread is already active")]
    ConsumerActive,

    #[error("consumer thread is not active")]
    ConsumerInactive,

    #[error("failed to launch consumer thread")]
    LaunchFailed,

    #[error("request conflicts with registry state")]
    InvalidRequest,

    #[error("no handler registered for service")]
    ServiceUnknown,

    #[error("buffer is not aligned to the required alignment")]
    IncorrectAlignment,

    #[error("null pointer")]
    NullPointer,

    #[error("notification runtime unavailable")]
    Internal,
}

impl HostcallError {
    /// The C status code for this error.
    pub fn code(self) -> ErrorCode {
        match self {
            HostcallError::ConsumerActive => ErrorCode::ConsumerActive,
            HostcallError::ConsumerInactive => ErrorCode::ConsumerInactive,
            HostcallError::LaunchFailed => ErrorCode::ConsumerLaunchFailed,
            HostcallError::InvalidRequest => ErrorCode::InvalidRequest,
            HostcallError::ServiceUnknown => ErrorCode::ServiceUnknown,
            HostcallError::IncorrectAlignment => ErrorCode::IncorrectAlignment,
            HostcallError::NullPointer => ErrorCode::Nullptr,
            HostcallError::Internal => ErrorCode::InternalError,
        }
    }
}
