//! Payload handling module.
//!
//! Provides parsing and serialisation of hex-dump images and the address
//! windows update passes are restricted to.

pub mod image;
pub mod region;

pub use image::{FirmwareImage, ImageError, ImageMetadata, ImageRecord};
pub use region::{AddressWindow, InvalidNvmBlock, NvmBlock, Region, Scope};
