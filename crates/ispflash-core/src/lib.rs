//! ispflash-core: firmware and NVM update engine for I2C camera modules.
//!
//! The camera MCU is reachable only through a narrow register-transaction
//! bus. This crate places the device into an update-capable mode, erases
//! flash, streams a hex-dump image in bounded blocks and verifies the result
//! by comparing a host-side CRC-16 against the one the device computes.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Transport**: one bus transaction at a fixed address (i2c-dev, dry-run, mock) plus bounded retry
//! - **Protocol**: opcodes, register map, request frames
//! - **Device**: the ISP upgrader and MCU bootloader command sets behind `FlashProtocol`
//! - **Payload**: image parsing and region selection
//! - **State**: phase tracking and erase/program/verify handlers
//! - **Events**: Observer pattern for UI decoupling
//! - **Session**: High-level orchestrator
//! - **NVM / Sync / Info**: register-level tools sharing the same transport
//!
//! # Example
//!
//! ```no_run
//! use ispflash_core::device::IspUpgrader;
//! use ispflash_core::payload::{FirmwareImage, Region};
//! use ispflash_core::session::{UpdateConfig, UpdateSession};
//! use ispflash_core::transport::{LinuxI2c, RetryingTransport};
//!
//! let config = UpdateConfig::default();
//! let bus = LinuxI2c::open("/dev/links/csi0_i2c", config.bus_address)?;
//! let bus = RetryingTransport::new(bus, config.retry);
//! let image = FirmwareImage::load("isp.img")?;
//!
//! let mut session = UpdateSession::new(config, image, Region::All).with_password(Some(0x1234));
//! session.run(&IspUpgrader::new(&bus))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cancel;
pub mod crc;
pub mod device;
pub mod error;
pub mod events;
pub mod info;
pub mod nvm;
pub mod payload;
pub mod protocol;
pub mod session;
pub mod state;
pub mod sync;
pub mod transport;

// Re-exports for convenience
pub use cancel::CancelToken;
pub use device::{FlashProtocol, IspUpgrader, McuBootloader, PollPolicy, RegWidth, RegisterClient};
pub use error::UpdateError;
pub use events::{LogLevel, TracingObserver, UpdateEvent, UpdateObserver, UpdatePhase};
pub use info::CameraInfo;
pub use nvm::{NvmContents, NvmError};
pub use payload::{FirmwareImage, ImageError, NvmBlock, Region};
pub use session::{UpdateConfig, UpdateSession};
pub use state::{CrcReference, VerifyReport};
#[cfg(target_os = "linux")]
pub use transport::LinuxI2c;
pub use transport::{DryRunTransport, I2cTransport, MockTransport, RetryingTransport, TransportError};
