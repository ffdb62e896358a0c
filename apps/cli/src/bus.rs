//! Opening the camera bus for a command.

use std::path::Path;

use anyhow::{Context, Result};
use ispflash_core::transport::{DryRunTransport, I2cTransport, RetryingTransport};
use ispflash_core::UpdateConfig;
use tracing::{debug, info};

/// Bus handle used by every command: retried, backend chosen at runtime.
pub type Bus = RetryingTransport<Box<dyn I2cTransport>>;

pub fn open(path: &Path, dry_run: bool, config: &UpdateConfig) -> Result<Bus> {
    let inner: Box<dyn I2cTransport> = if dry_run {
        info!(path = %path.display(), "Dry run, no bus traffic");
        Box::new(DryRunTransport::new(config.bus_address))
    } else {
        open_device(path, config.bus_address)?
    };
    debug!(
        attempts = config.retry.max_attempts,
        backoff_ms = config.retry.backoff_ms,
        "Bus retry policy"
    );
    Ok(RetryingTransport::new(inner, config.retry))
}

#[cfg(target_os = "linux")]
fn open_device(path: &Path, address: u16) -> Result<Box<dyn I2cTransport>> {
    let bus = ispflash_core::LinuxI2c::open(path, address)
        .with_context(|| format!("opening {}", path.display()))?;
    info!(path = %path.display(), addr = %format!("0x{:02X}", address), "Bus opened");
    Ok(Box::new(bus))
}

#[cfg(not(target_os = "linux"))]
fn open_device(path: &Path, _address: u16) -> Result<Box<dyn I2cTransport>> {
    Err(ispflash_core::TransportError::OpenFailed {
        path: path.display().to_string(),
        message: "i2c-dev is only available on Linux, use --dry-run".to_string(),
    })
    .context("opening bus")
}
