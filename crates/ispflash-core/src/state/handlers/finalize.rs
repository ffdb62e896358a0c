//! Password clear and reboot.

use std::thread;
use std::time::Duration;

use super::HandlerContext;
use crate::device::FlashProtocol;
use crate::error::Result;
use crate::events::{LogLevel, UpdateObserver};

/// Clear the password; reboot only when the update verified.
pub fn finalize<P: FlashProtocol, O: UpdateObserver>(
    ctx: &HandlerContext<'_, P, O>,
    verified: bool,
) -> Result<()> {
    let cleared_on_reboot = ctx.protocol.password_cleared_on_reboot();
    if !cleared_on_reboot {
        ctx.protocol.clear_password()?;
    }
    if !verified {
        ctx.log(LogLevel::Warn, "Verification failed, leaving device in update mode");
        if cleared_on_reboot {
            ctx.log(
                LogLevel::Warn,
                "Bootloader keeps the update password until the camera restarts",
            );
        }
        return Ok(());
    }
    ctx.log(LogLevel::Info, "Rebooting");
    ctx.protocol.reboot()?;
    thread::sleep(Duration::from_millis(ctx.config.reboot_settle_ms));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{context, fast_config};
    use super::*;
    use crate::cancel::CancelToken;
    use crate::device::{IspUpgrader, McuBootloader};
    use crate::protocol::constants::{BL_REBOOT, REG_PASSWORD_HI, REG_PASSWORD_LO};
    use crate::protocol::frame;
    use crate::transport::MockTransport;

    #[test]
    fn test_isp_clears_password_without_reboot_on_mismatch() {
        let mock = MockTransport::new();
        let isp = IspUpgrader::new(&mock);
        let config = fast_config();
        let cancel = CancelToken::new();
        let ctx = context(&isp, &config, &cancel);

        finalize(&ctx, false).unwrap();
        assert_eq!(
            mock.get_writes(),
            vec![
                frame::write_reg8(REG_PASSWORD_LO, 0),
                frame::write_reg8(REG_PASSWORD_HI, 0)
            ]
        );
    }

    #[test]
    fn test_bootloader_reboot_drops_password() {
        let mock = MockTransport::new();
        let bl = McuBootloader::new(&mock);
        let config = fast_config();
        let cancel = CancelToken::new();
        let ctx = context(&bl, &config, &cancel);

        finalize(&ctx, true).unwrap();
        assert_eq!(mock.get_writes(), vec![BL_REBOOT.to_vec()]);
    }

    #[test]
    fn test_bootloader_mismatch_leaves_device_untouched() {
        let mock = MockTransport::new();
        let bl = McuBootloader::new(&mock);
        let config = fast_config();
        let cancel = CancelToken::new();
        let ctx = context(&bl, &config, &cancel);

        finalize(&ctx, false).unwrap();
        assert!(mock.get_writes().is_empty());
    }
}
