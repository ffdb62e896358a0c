//! CRC verification.

use tracing::{info, warn};

use super::HandlerContext;
use crate::device::{FlashProtocol, PollOutcome};
use crate::error::{Result, UpdateError};
use crate::events::{LogLevel, UpdateEvent, UpdateObserver};
use crate::payload::{FirmwareImage, Region};

/// What the device checksum was compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrcReference {
    /// CRC of the image records the device checksums.
    Image,
    /// CRC the application recorded in flash; used when the image has no
    /// data inside the area the device checksums.
    Stored,
}

/// Host and device checksum over the same address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyReport {
    pub start: u32,
    /// Exclusive.
    pub end: u32,
    pub local: u16,
    pub device: u16,
    pub reference: CrcReference,
}

impl VerifyReport {
    pub fn matches(&self) -> bool {
        self.local == self.device
    }
}

/// Compare the device CRC with the CRC of the bytes it covers.
///
/// Targets that checksum a fixed area are compared against the in-scope
/// records inside that area. When none fall inside it, the device CRC is
/// compared against the CRC stored in flash instead.
///
/// Read-only on the device side, so repeated calls give the same report.
pub fn verify<P: FlashProtocol, O: UpdateObserver>(
    ctx: &HandlerContext<'_, P, O>,
    image: &FirmwareImage,
    region: Region,
) -> Result<VerifyReport> {
    let scope = region.select(image);
    if scope.is_empty() {
        return Err(UpdateError::InvalidRegion(format!(
            "image has no data in region {}",
            region
        )));
    }

    let crc_window = ctx.protocol.crc_window();
    let checked = match crc_window {
        Some(window) => scope.within(window),
        None => scope.clone(),
    };
    if checked.records().len() < scope.records().len() && !checked.is_empty() {
        ctx.log(
            LogLevel::Info,
            format!(
                "{} of {} blocks lie outside the checksummed area",
                scope.records().len() - checked.records().len(),
                scope.records().len()
            ),
        );
    }

    ctx.check_cancel()?;
    let stored = ctx.protocol.stored_image_info()?;
    if let Some(stored) = stored {
        ctx.log(
            LogLevel::Info,
            format!(
                "Stored CRC 0x{:04X}, stored size 0x{:04X}",
                stored.crc, stored.size
            ),
        );
    }

    let (start, end, local, reference) = match (checked.start(), checked.end()) {
        (Some(start), Some(end)) => {
            if !checked.is_contiguous() {
                warn!(region = %region, "Image has gaps; device CRC covers unwritten bytes");
            }
            (start, end, checked.crc(), CrcReference::Image)
        }
        _ => {
            let (Some(window), Some(stored)) = (crc_window, stored) else {
                return Err(UpdateError::InvalidRegion(format!(
                    "nothing to verify region {} against",
                    region
                )));
            };
            ctx.log(
                LogLevel::Info,
                format!("No image data in {}, checking against the stored CRC", window),
            );
            let end = window.start + u32::from(stored.size);
            (window.start, end, stored.crc, CrcReference::Stored)
        }
    };

    ctx.protocol.start_crc(start, end)?;
    let device = match ctx.wait_alive(&ctx.config.crc_poll)? {
        PollOutcome::Ready { .. } => ctx.protocol.read_crc()?,
        PollOutcome::TimedOut { polls } => return Err(UpdateError::CrcTimeout { polls }),
        PollOutcome::Cancelled => return Err(UpdateError::Cancelled),
    };

    ctx.emit(UpdateEvent::CrcReport { local, device });

    let report = VerifyReport {
        start,
        end,
        local,
        device,
        reference,
    };
    info!(
        start = %format!("0x{:04X}", start),
        end = %format!("0x{:04X}", end),
        reference = ?reference,
        matches = report.matches(),
        "Verification done"
    );
    Ok(report)
}
