//! FFI status codes returned by the `gb_*` exports.

use crate::error::BindingError;

/// Status codes for the C ABI surface.
///
/// Every `gb_*` function that returns `i32` uses these values; `gb_init`
/// returns 0 on failure and leaves the code in `gb_last_error`.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiResult {
    Ok = 0,
    /// The handle is not the live handle.
    InvalidHandle = 1,
    /// A required argument was null, not valid UTF-8, or rejected by validation.
    InvalidArgument = 2,
    /// `gb_init` has not succeeded yet.
    NotInitialized = 3,
    /// An internal error occurred (logged via tracing).
    Internal = 4,
    AlreadyInitialized = 5,
    NativeInitFailure = 6,
    NavigationRejected = 7,
    /// Events were delivered but at least one host callback failed.
    PartialDeliveryFailure = 8,
    /// Unknown subscription id.
    NotFound = 9,
    AlreadyShutdown = 10,
}

impl From<&BindingError> for FfiResult {
    fn from(err: &BindingError) -> Self {
        match err {
            BindingError::NotInitialized => FfiResult::NotInitialized,
            BindingError::AlreadyInitialized => FfiResult::AlreadyInitialized,
            BindingError::InvalidHandle => FfiResult::InvalidHandle,
            BindingError::NativeInitFailure { .. } => FfiResult::NativeInitFailure,
            BindingError::InvalidArgument(_) => FfiResult::InvalidArgument,
            BindingError::NavigationRejected { .. } => FfiResult::NavigationRejected,
            BindingError::PartialDeliveryFailure { .. } => FfiResult::PartialDeliveryFailure,
            BindingError::NotFound(_) => FfiResult::NotFound,
            BindingError::AlreadyShutdown => FfiResult::AlreadyShutdown,
        }
    }
}
