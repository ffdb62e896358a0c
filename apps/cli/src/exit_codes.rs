//! Process exit codes, one per failure class.

use ispflash_core::nvm::NvmError;
use ispflash_core::sync::SyncError;
use ispflash_core::{ImageError, TransportError, UpdateError};

pub const EXIT_OK: i32 = 0;
pub const EXIT_UNEXPECTED: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_NO_DEVICE: i32 = 10;
pub const EXIT_BUS_ERROR: i32 = 11;
pub const EXIT_INVALID_IMAGE: i32 = 12;
pub const EXIT_INVALID_REGION: i32 = 13;
pub const EXIT_TIMEOUT: i32 = 14;
pub const EXIT_MODE_ENTRY: i32 = 15;
pub const EXIT_VERIFY_FAILED: i32 = 16;
pub const EXIT_WRONG_DEVICE: i32 = 17;
pub const EXIT_CANCELLED: i32 = 130;

fn transport_code(err: &TransportError) -> i32 {
    match err {
        TransportError::Unavailable { .. } | TransportError::OpenFailed { .. } => EXIT_NO_DEVICE,
        TransportError::InvalidRequest(_) => EXIT_USAGE,
        _ => EXIT_BUS_ERROR,
    }
}

fn update_code(err: &UpdateError) -> i32 {
    match err {
        UpdateError::TransportUnavailable(_) => EXIT_NO_DEVICE,
        UpdateError::Transport(e) => transport_code(e),
        UpdateError::Parse(_) => EXIT_INVALID_IMAGE,
        UpdateError::InvalidRegion(_) => EXIT_INVALID_REGION,
        UpdateError::EraseTimeout { .. }
        | UpdateError::ProgramTimeout { .. }
        | UpdateError::CrcTimeout { .. } => EXIT_TIMEOUT,
        UpdateError::ModeEntryFailed { .. } => EXIT_MODE_ENTRY,
        UpdateError::VerificationMismatch { .. } => EXIT_VERIFY_FAILED,
        UpdateError::DeviceIdentityMismatch { .. } => EXIT_WRONG_DEVICE,
        UpdateError::Cancelled => EXIT_CANCELLED,
        UpdateError::InvalidTransition { .. } => EXIT_UNEXPECTED,
    }
}

/// Exit code for an error reaching `main`.
pub fn for_error(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<UpdateError>() {
            return update_code(e);
        }
        if let Some(e) = cause.downcast_ref::<NvmError>() {
            return match e {
                NvmError::Transport(t) => transport_code(t),
                NvmError::Image(_) => EXIT_INVALID_IMAGE,
                NvmError::OutOfRange { .. } => EXIT_INVALID_REGION,
                NvmError::Cancelled => EXIT_CANCELLED,
                NvmError::Io(_) => EXIT_UNEXPECTED,
            };
        }
        if let Some(e) = cause.downcast_ref::<SyncError>() {
            return match e {
                SyncError::InvalidFrameRate(_) => EXIT_USAGE,
                SyncError::Transport(t) => transport_code(t),
            };
        }
        if cause.downcast_ref::<ImageError>().is_some() {
            return EXIT_INVALID_IMAGE;
        }
        if let Some(e) = cause.downcast_ref::<TransportError>() {
            return transport_code(e);
        }
    }
    EXIT_UNEXPECTED
}
