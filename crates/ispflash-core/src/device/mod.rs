//! Device command sets.
//!
//! - `registers`: main application register protocol
//! - `isp`: SPI flash behind the ISP (upgrader mode)
//! - `bootloader`: MCU flash (bootloader mode)
//! - `poll`: bounded status polling

pub mod bootloader;
pub mod isp;
pub mod poll;
pub mod registers;
pub mod traits;

pub use bootloader::McuBootloader;
pub use isp::IspUpgrader;
pub use poll::{PollOutcome, PollPolicy, poll_until};
pub use registers::{RegWidth, RegisterClient, Versions};
pub use traits::{FlashProtocol, StoredImageInfo};
