//! Protocol module - command encodings for the camera MCU.

pub mod constants;
pub mod frame;
pub mod status;

pub use constants::*;
pub use status::DeviceStatus;
