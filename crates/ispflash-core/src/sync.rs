//! Frame sync and external trigger setup.

use thiserror::Error;
use tracing::info;

use crate::device::RegisterClient;
use crate::protocol::constants::*;
use crate::transport::{I2cTransport, TransportError};

/// Sync generator clock ticks per second.
const SYNC_CLOCK_HZ: f64 = 256_000_000.0;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("invalid frame rate {0}")]
    InvalidFrameRate(f64),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Frame period register value for `fps`: `round(256e6 / fps)`.
pub fn frame_period(fps: f64) -> Result<u32, SyncError> {
    if !fps.is_finite() || fps <= 0.0 {
        return Err(SyncError::InvalidFrameRate(fps));
    }
    let period = (SYNC_CLOCK_HZ / fps).round();
    if period > f64::from(u32::MAX) {
        return Err(SyncError::InvalidFrameRate(fps));
    }
    Ok(period as u32)
}

/// Program the frame period on the sync master.
pub fn set_frame_rate<T: I2cTransport>(
    regs: &RegisterClient<T>,
    fps: f64,
) -> Result<u32, SyncError> {
    let period = frame_period(fps)?;
    regs.write32(REG_SYNC_PERIOD, period)?;
    info!(
        fps = %format!("{:.2}", fps),
        period_us = %format!("{:.2}", 1_000_000.0 / fps),
        register = %format!("0x{:08X}", period),
        "Frame rate set"
    );
    Ok(period)
}

/// Enable the sync output and put the master in wait-for-trigger mode.
pub fn configure_master<T: I2cTransport>(regs: &RegisterClient<T>) -> Result<(), TransportError> {
    regs.write16(REG_SYNC_DUTY, SYNC_DUTY_DEFAULT)?;
    regs.write8(REG_SYNC_ENABLE, SYNC_ENABLE_PWM)?;
    regs.write16(REG_TRIGGER_MODE, TRIGGER_MODE_WAIT)
}

/// Put a follower camera in wait-for-trigger mode.
pub fn configure_follower<T: I2cTransport>(regs: &RegisterClient<T>) -> Result<(), TransportError> {
    regs.write16(REG_TRIGGER_MODE, TRIGGER_MODE_WAIT)
}
