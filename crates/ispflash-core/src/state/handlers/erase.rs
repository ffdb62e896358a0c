//! Erase handlers.

use tracing::{debug, info};

use super::HandlerContext;
use crate::device::{FlashProtocol, PollOutcome};
use crate::error::{Result, UpdateError};
use crate::events::{LogLevel, UpdateEvent, UpdateObserver, UpdatePhase, progress_percent};
use crate::payload::Region;

fn wait_erased<P: FlashProtocol, O: UpdateObserver>(ctx: &HandlerContext<'_, P, O>) -> Result<()> {
    match ctx.wait_idle(&ctx.config.erase_poll)? {
        PollOutcome::Ready { polls } => {
            debug!(polls, "Erase finished");
            Ok(())
        }
        PollOutcome::TimedOut { polls } => Err(UpdateError::EraseTimeout { polls }),
        PollOutcome::Cancelled => Err(UpdateError::Cancelled),
    }
}

/// Erase the whole device and wait for it to go idle.
pub fn erase_all<P: FlashProtocol, O: UpdateObserver>(ctx: &HandlerContext<'_, P, O>) -> Result<()> {
    ctx.check_cancel()?;
    info!("Erasing entire flash");
    ctx.protocol.erase_all()?;
    wait_erased(ctx)
}

/// Erase `length` bytes at `start` (at most one page) and wait for idle.
pub fn erase_region<P: FlashProtocol, O: UpdateObserver>(
    ctx: &HandlerContext<'_, P, O>,
    start: u32,
    length: u32,
) -> Result<()> {
    let max = ctx.config.max_page_size;
    if length == 0 || length > max {
        return Err(UpdateError::InvalidRegion(format!(
            "erase length {} at 0x{:04X} not in 1..={}",
            length, start, max
        )));
    }
    if start.saturating_add(length - 1) > ctx.protocol.max_address() {
        return Err(UpdateError::InvalidRegion(format!(
            "erase at 0x{:X} exceeds {} address range",
            start,
            ctx.protocol.name()
        )));
    }
    ctx.check_cancel()?;
    ctx.protocol.erase_page(start, length)?;
    wait_erased(ctx)
}

/// Erase everything `region` covers: page by page for a window, in one
/// command for [`Region::All`].
pub fn erase_scope<P: FlashProtocol, O: UpdateObserver>(
    ctx: &HandlerContext<'_, P, O>,
    region: Region,
) -> Result<()> {
    let Some(window) = region.window() else {
        return erase_all(ctx);
    };

    let page = ctx.config.max_page_size.max(1);
    let total = u64::from(window.len());
    ctx.log(LogLevel::Info, format!("Erasing {} ({})", region, window));

    let mut address = window.start;
    while address <= window.max {
        let length = page.min(window.max - address + 1);
        erase_region(ctx, address, length)?;
        address += length;
        ctx.emit(UpdateEvent::Progress {
            phase: UpdatePhase::Erasing,
            address,
            percent: progress_percent(u64::from(address - window.start), total),
        });
    }
    Ok(())
}
