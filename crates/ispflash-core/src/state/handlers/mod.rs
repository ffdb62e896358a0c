//! Phase handlers.
//!
//! - `mode`: password and update-mode entry
//! - `erase`: region and whole-device erase
//! - `program`: block streaming
//! - `verify`: host/device CRC comparison
//! - `finalize`: password clear and reboot

mod erase;
mod finalize;
mod mode;
mod program;
mod verify;

use std::thread;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::device::{FlashProtocol, PollOutcome, PollPolicy, poll_until};
use crate::error::{Result, UpdateError};
use crate::events::{LogLevel, UpdateEvent, UpdateObserver};
use crate::session::UpdateConfig;

pub use erase::{erase_all, erase_region, erase_scope};
pub use finalize::finalize;
pub use mode::{authenticate, check_identity, enter_update_mode};
pub use program::{ProgramSummary, program};
pub use verify::{CrcReference, VerifyReport, verify};

/// Handler context containing all resources.
pub struct HandlerContext<'a, P: FlashProtocol, O: UpdateObserver> {
    pub protocol: &'a P,
    pub observer: &'a O,
    pub config: &'a UpdateConfig,
    pub cancel: &'a CancelToken,
}

impl<'a, P: FlashProtocol, O: UpdateObserver> HandlerContext<'a, P, O> {
    pub(crate) fn emit(&self, event: UpdateEvent) {
        self.observer.on_event(&event);
    }

    pub(crate) fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(UpdateEvent::Log {
            level,
            message: message.into(),
        });
    }

    pub(crate) fn check_cancel(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(UpdateError::Cancelled);
        }
        Ok(())
    }

    pub(crate) fn settle(&self, ms: u64) -> Result<()> {
        self.check_cancel()?;
        thread::sleep(Duration::from_millis(ms));
        Ok(())
    }

    /// Poll `read_status` until idle.
    pub(crate) fn wait_idle(&self, policy: &PollPolicy) -> Result<PollOutcome> {
        let protocol = self.protocol;
        let outcome = poll_until(policy, self.cancel, || {
            protocol.read_status().map(|s| s.is_idle())
        })?;
        if outcome == PollOutcome::Cancelled {
            return Err(UpdateError::Cancelled);
        }
        Ok(outcome)
    }

    /// Probe liveness until the device acknowledges.
    pub(crate) fn wait_alive(&self, policy: &PollPolicy) -> Result<PollOutcome> {
        let protocol = self.protocol;
        let outcome = poll_until(policy, self.cancel, || protocol.is_alive())?;
        if outcome == PollOutcome::Cancelled {
            return Err(UpdateError::Cancelled);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::events::NullObserver;

    /// Config with millisecond budgets so failure paths finish quickly.
    pub fn fast_config() -> UpdateConfig {
        UpdateConfig {
            erase_poll: PollPolicy::new(1, 20),
            program_poll: PollPolicy::new(1, 10),
            crc_poll: PollPolicy::new(1, 10),
            liveness_poll: PollPolicy::new(1, 10),
            auth_settle_ms: 0,
            mode_settle_ms: 0,
            reboot_settle_ms: 0,
            ..UpdateConfig::default()
        }
    }

    pub fn context<'a, P: FlashProtocol>(
        protocol: &'a P,
        config: &'a UpdateConfig,
        cancel: &'a CancelToken,
    ) -> HandlerContext<'a, P, NullObserver> {
        HandlerContext {
            protocol,
            observer: &NullObserver,
            config,
            cancel,
        }
    }
}
