//! Block programming.

use tracing::{debug, info};

use super::HandlerContext;
use crate::device::{FlashProtocol, PollOutcome};
use crate::error::{Result, UpdateError};
use crate::events::{UpdateEvent, UpdateObserver, UpdatePhase, progress_percent};
use crate::payload::{FirmwareImage, Region};

/// What a programming pass wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramSummary {
    pub blocks: usize,
    pub bytes: u32,
}

/// Write every in-scope record of `image`, waiting for idle after each.
///
/// Nothing is written unless every in-scope record fits the region and the
/// target's address range.
pub fn program<P: FlashProtocol, O: UpdateObserver>(
    ctx: &HandlerContext<'_, P, O>,
    image: &FirmwareImage,
    region: Region,
) -> Result<ProgramSummary> {
    let scope = region.select(image);
    if scope.is_empty() {
        return Err(UpdateError::InvalidRegion(format!(
            "image has no data in region {}",
            region
        )));
    }

    let window_max = region
        .window()
        .map_or(ctx.protocol.max_address(), |w| w.max);
    let limit = window_max.min(ctx.protocol.max_address());
    if let Some(record) = scope.records().iter().find(|r| r.end() - 1 > limit) {
        return Err(UpdateError::InvalidRegion(format!(
            "block 0x{:04X}..0x{:04X} extends past 0x{:04X}",
            record.address,
            record.end(),
            limit
        )));
    }

    let total = u64::from(scope.size());
    info!(
        region = %region,
        blocks = scope.records().len(),
        bytes = total,
        "Programming"
    );

    let mut written: u64 = 0;
    for record in scope.records() {
        ctx.check_cancel()?;
        ctx.protocol.write_block(record.address, &record.payload)?;

        match ctx.wait_idle(&ctx.config.program_poll)? {
            PollOutcome::Ready { polls } => {
                debug!(address = %format!("0x{:04X}", record.address), polls, "Block written");
            }
            PollOutcome::TimedOut { polls } => {
                return Err(UpdateError::ProgramTimeout {
                    address: record.address,
                    polls,
                });
            }
            PollOutcome::Cancelled => return Err(UpdateError::Cancelled),
        }

        // Percent of in-scope bytes written, not of the address span, so
        // gaps between blocks do not stall the bar.
        written += record.len() as u64;
        ctx.emit(UpdateEvent::Progress {
            phase: UpdatePhase::Programming,
            address: record.address,
            percent: progress_percent(written, total),
        });
    }

    Ok(ProgramSummary {
        blocks: scope.records().len(),
        bytes: scope.size(),
    })
}
