//! Update target abstraction.
//!
//! The session drives the same erase/program/verify sequence against either
//! the SPI flash behind the ISP or the MCU's own flash. `FlashProtocol`
//! hides the opcode differences between the two command sets.

use crate::payload::AddressWindow;
use crate::protocol::DeviceStatus;
use crate::transport::TransportError;

/// CRC and size the application image recorded in flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredImageInfo {
    pub crc: u16,
    pub size: u16,
}

pub trait FlashProtocol {
    /// Short human-readable target name.
    fn name(&self) -> &'static str;

    /// Write the update password (main application register protocol).
    fn set_password(&self, password: u16) -> Result<(), TransportError>;

    /// Clear the password once the update pass is over.
    fn clear_password(&self) -> Result<(), TransportError> {
        self.set_password(0)
    }

    /// Whether leaving update mode drops the password. `clear_password` is
    /// then skipped, since the update-mode command set cannot reach the
    /// password registers.
    fn password_cleared_on_reboot(&self) -> bool {
        false
    }

    /// Switch the device into the mode that accepts flash commands.
    fn enter_update_mode(&self) -> Result<(), TransportError>;

    /// Liveness probe. `Ok(false)` when the device does not acknowledge.
    fn is_alive(&self) -> Result<bool, TransportError>;

    /// Identity of the flash part, if the target can report one.
    fn read_identity(&self) -> Result<Option<[u8; 3]>, TransportError> {
        Ok(None)
    }

    /// Identity `read_identity` must return for the update to proceed.
    fn expected_identity(&self) -> Option<[u8; 3]> {
        None
    }

    fn read_status(&self) -> Result<DeviceStatus, TransportError>;

    fn erase_all(&self) -> Result<(), TransportError>;

    /// Erase the page(s) covering `address..address + len`.
    fn erase_page(&self, address: u32, len: u32) -> Result<(), TransportError>;

    fn write_block(&self, address: u32, payload: &[u8]) -> Result<(), TransportError>;

    /// Ask the device to checksum `start..end` (end exclusive).
    fn start_crc(&self, start: u32, end: u32) -> Result<(), TransportError>;

    /// Fixed area the device checksums whatever range `start_crc` is given.
    /// `None` when the requested range is honoured.
    fn crc_window(&self) -> Option<AddressWindow> {
        None
    }

    /// Fetch the checksum computed by the last `start_crc`.
    fn read_crc(&self) -> Result<u16, TransportError>;

    fn reboot(&self) -> Result<(), TransportError>;

    /// Highest address the command set can encode.
    fn max_address(&self) -> u32;

    /// CRC and size recorded in flash by the image itself.
    fn stored_image_info(&self) -> Result<Option<StoredImageInfo>, TransportError> {
        Ok(None)
    }
}

impl<P: FlashProtocol + ?Sized> FlashProtocol for &P {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn set_password(&self, password: u16) -> Result<(), TransportError> {
        (**self).set_password(password)
    }

    fn clear_password(&self) -> Result<(), TransportError> {
        (**self).clear_password()
    }

    fn password_cleared_on_reboot(&self) -> bool {
        (**self).password_cleared_on_reboot()
    }

    fn enter_update_mode(&self) -> Result<(), TransportError> {
        (**self).enter_update_mode()
    }

    fn is_alive(&self) -> Result<bool, TransportError> {
        (**self).is_alive()
    }

    fn read_identity(&self) -> Result<Option<[u8; 3]>, TransportError> {
        (**self).read_identity()
    }

    fn expected_identity(&self) -> Option<[u8; 3]> {
        (**self).expected_identity()
    }

    fn read_status(&self) -> Result<DeviceStatus, TransportError> {
        (**self).read_status()
    }

    fn erase_all(&self) -> Result<(), TransportError> {
        (**self).erase_all()
    }

    fn erase_page(&self, address: u32, len: u32) -> Result<(), TransportError> {
        (**self).erase_page(address, len)
    }

    fn write_block(&self, address: u32, payload: &[u8]) -> Result<(), TransportError> {
        (**self).write_block(address, payload)
    }

    fn start_crc(&self, start: u32, end: u32) -> Result<(), TransportError> {
        (**self).start_crc(start, end)
    }

    fn crc_window(&self) -> Option<AddressWindow> {
        (**self).crc_window()
    }

    fn read_crc(&self) -> Result<u16, TransportError> {
        (**self).read_crc()
    }

    fn reboot(&self) -> Result<(), TransportError> {
        (**self).reboot()
    }

    fn max_address(&self) -> u32 {
        (**self).max_address()
    }

    fn stored_image_info(&self) -> Result<Option<StoredImageInfo>, TransportError> {
        (**self).stored_image_info()
    }
}

/// Map a probe result onto alive / not alive.
///
/// Transient failures mean "not yet"; anything else is reported.
pub(crate) fn probe_alive(result: Result<(), TransportError>) -> Result<bool, TransportError> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_transient() => Ok(false),
        Err(e) => Err(e),
    }
}
