//! Error kinds of an update pass.

use thiserror::Error;

use crate::events::UpdatePhase;
use crate::payload::ImageError;
use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum UpdateError {
    /// The bus stayed unusable through the whole retry budget.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(#[source] TransportError),

    #[error("transport error: {0}")]
    Transport(#[source] TransportError),

    #[error("image parse error: {0}")]
    Parse(#[from] ImageError),

    #[error("invalid region: {0}")]
    InvalidRegion(String),

    #[error("erase did not finish within {polls} status polls")]
    EraseTimeout { polls: u32 },

    #[error("block at 0x{address:04X} did not finish within {polls} status polls")]
    ProgramTimeout { address: u32, polls: u32 },

    #[error("device CRC not ready after {polls} probes")]
    CrcTimeout { polls: u32 },

    #[error("device did not come back after mode entry ({polls} probes)")]
    ModeEntryFailed { polls: u32 },

    #[error("verification failed: local CRC 0x{local:04X}, device CRC 0x{device:04X}")]
    VerificationMismatch { local: u16, device: u16 },

    #[error("unexpected flash id {actual:02X?}, expected {expected:02X?}")]
    DeviceIdentityMismatch { expected: [u8; 3], actual: [u8; 3] },

    #[error("cancelled")]
    Cancelled,

    #[error("invalid phase transition {from} -> {to}")]
    InvalidTransition { from: UpdatePhase, to: UpdatePhase },
}

impl From<TransportError> for UpdateError {
    fn from(err: TransportError) -> Self {
        match err {
            e @ TransportError::Unavailable { .. } => UpdateError::TransportUnavailable(e),
            e => UpdateError::Transport(e),
        }
    }
}

pub type Result<T, E = UpdateError> = std::result::Result<T, E>;
