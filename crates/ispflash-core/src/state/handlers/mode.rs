//! Password and update-mode entry.

use tracing::{info, warn};

use super::HandlerContext;
use crate::device::{FlashProtocol, PollOutcome};
use crate::error::{Result, UpdateError};
use crate::events::{LogLevel, UpdateObserver};

/// Write the password and let the application latch it.
pub fn authenticate<P: FlashProtocol, O: UpdateObserver>(
    ctx: &HandlerContext<'_, P, O>,
    password: u16,
) -> Result<()> {
    ctx.check_cancel()?;
    ctx.protocol.set_password(password)?;
    ctx.log(LogLevel::Debug, "Password written");
    ctx.settle(ctx.config.auth_settle_ms)
}

/// Request the update mode and wait for the device to answer again.
pub fn enter_update_mode<P: FlashProtocol, O: UpdateObserver>(
    ctx: &HandlerContext<'_, P, O>,
) -> Result<()> {
    ctx.check_cancel()?;
    info!(target_name = ctx.protocol.name(), "Entering update mode");
    ctx.protocol.enter_update_mode()?;
    ctx.settle(ctx.config.mode_settle_ms)?;

    match ctx.wait_alive(&ctx.config.liveness_poll)? {
        PollOutcome::Ready { polls } => {
            ctx.log(
                LogLevel::Info,
                format!("{} ready after {} probe(s)", ctx.protocol.name(), polls),
            );
            Ok(())
        }
        PollOutcome::TimedOut { polls } => Err(UpdateError::ModeEntryFailed { polls }),
        PollOutcome::Cancelled => Err(UpdateError::Cancelled),
    }
}

/// Compare the flash identity against the expected part, if the target has one.
pub fn check_identity<P: FlashProtocol, O: UpdateObserver>(
    ctx: &HandlerContext<'_, P, O>,
) -> Result<()> {
    let Some(expected) = ctx.protocol.expected_identity() else {
        return Ok(());
    };
    ctx.check_cancel()?;
    let Some(actual) = ctx.protocol.read_identity()? else {
        return Ok(());
    };
    if actual != expected {
        warn!(actual = ?actual, expected = ?expected, "Flash identity mismatch");
        return Err(UpdateError::DeviceIdentityMismatch { expected, actual });
    }
    ctx.log(LogLevel::Info, format!("Flash id {:02X?}", actual));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{context, fast_config};
    use super::*;
    use crate::cancel::CancelToken;
    use crate::device::IspUpgrader;
    use crate::transport::MockTransport;

    #[test]
    fn test_mode_entry_waits_for_ack() {
        let mock = MockTransport::new();
        mock.queue_probe(false);
        mock.queue_probe(false);
        let isp = IspUpgrader::new(&mock);
        let config = fast_config();
        let cancel = CancelToken::new();
        let ctx = context(&isp, &config, &cancel);

        enter_update_mode(&ctx).unwrap();
        assert_eq!(mock.probe_count(), 3);
        assert_eq!(mock.get_writes(), vec![vec![0x30, 0xEB, 0x82]]);
    }

    #[test]
    fn test_mode_entry_fails_when_silent() {
        let mock = MockTransport::new();
        mock.set_probe_default(false);
        let isp = IspUpgrader::new(&mock);
        let config = fast_config();
        let cancel = CancelToken::new();
        let ctx = context(&isp, &config, &cancel);

        let err = enter_update_mode(&ctx).unwrap_err();
        assert!(matches!(err, UpdateError::ModeEntryFailed { polls: 10 }));
        assert_eq!(mock.probe_count(), 10);
    }

    #[test]
    fn test_identity_mismatch() {
        let mock = MockTransport::new();
        mock.queue_reply(&[0xC2, 0x20, 0x14]);
        let isp = IspUpgrader::new(&mock);
        let config = fast_config();
        let cancel = CancelToken::new();
        let ctx = context(&isp, &config, &cancel);

        let err = check_identity(&ctx).unwrap_err();
        assert!(matches!(
            err,
            UpdateError::DeviceIdentityMismatch {
                actual: [0xC2, 0x20, 0x14],
                ..
            }
        ));
    }
}
