//! MCU bootloader command set (application and NVM areas of the MCU flash).

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, instrument};

use super::registers::RegisterClient;
use super::traits::{FlashProtocol, StoredImageInfo, probe_alive};
use crate::payload::AddressWindow;
use crate::protocol::constants::*;
use crate::protocol::{DeviceStatus, frame};
use crate::transport::{I2cTransport, TransportError, expect_len};

pub struct McuBootloader<T: I2cTransport> {
    regs: RegisterClient<T>,
}

impl<T: I2cTransport> McuBootloader<T> {
    pub fn new(transport: T) -> Self {
        Self {
            regs: RegisterClient::new(transport),
        }
    }

    fn transport(&self) -> &T {
        self.regs.transport()
    }

    fn address16(&self, address: u32) -> Result<u16, TransportError> {
        u16::try_from(address).map_err(|_| {
            TransportError::InvalidRequest(format!(
                "address 0x{:X} exceeds 16-bit range",
                address
            ))
        })
    }

    /// Read `len` bytes of flash.
    pub fn read_flash(&self, address: u32, len: u8) -> Result<Vec<u8>, TransportError> {
        let address = self.address16(address)?;
        let data = self
            .transport()
            .transfer(&frame::bl_read(address, len), usize::from(len))?;
        expect_len(data, usize::from(len))
    }

    pub fn boot_id(&self) -> Result<u16, TransportError> {
        self.regs.boot_id()
    }
}

impl<T: I2cTransport> FlashProtocol for McuBootloader<T> {
    fn name(&self) -> &'static str {
        "MCU flash"
    }

    fn set_password(&self, password: u16) -> Result<(), TransportError> {
        self.regs.set_password(password)
    }

    /// The bootloader has no password register; the password is dropped
    /// when it reboots into the application.
    fn password_cleared_on_reboot(&self) -> bool {
        true
    }

    fn enter_update_mode(&self) -> Result<(), TransportError> {
        self.regs.enter_bootloader()
    }

    fn is_alive(&self) -> Result<bool, TransportError> {
        probe_alive(self.transport().probe())
    }

    /// The bootloader stops acknowledging while it is busy.
    fn read_status(&self) -> Result<DeviceStatus, TransportError> {
        if self.is_alive()? {
            Ok(DeviceStatus::IDLE)
        } else {
            Ok(DeviceStatus::BUSY)
        }
    }

    #[instrument(level = "debug", skip(self))]
    fn erase_all(&self) -> Result<(), TransportError> {
        self.transport().write(&BL_ERASE_ALL)
    }

    fn erase_page(&self, address: u32, len: u32) -> Result<(), TransportError> {
        let address = self.address16(address)?;
        let len = u16::try_from(len)
            .ok()
            .filter(|l| u32::from(*l) <= FLASH_PAGE_SIZE)
            .ok_or_else(|| {
                TransportError::InvalidRequest(format!("erase length {} exceeds page", len))
            })?;
        debug!(address = %format!("0x{:04X}", address), len, "MCU page erase");
        self.transport().write(&frame::bl_erase_page(address, len))
    }

    fn write_block(&self, address: u32, payload: &[u8]) -> Result<(), TransportError> {
        let address = self.address16(address)?;
        self.transport().write(&frame::bl_write(address, payload))
    }

    fn crc_window(&self) -> Option<AddressWindow> {
        Some(AddressWindow::new(FLASH_APP_START, FLASH_APP_MAX))
    }

    /// The bootloader always checksums the application area; the range is
    /// not sent.
    fn start_crc(&self, start: u32, end: u32) -> Result<(), TransportError> {
        debug!(
            start = %format!("0x{:04X}", start),
            end = %format!("0x{:04X}", end),
            "MCU CRC request (whole application)"
        );
        self.transport().write(&BL_CALC_CRC)
    }

    fn read_crc(&self) -> Result<u16, TransportError> {
        let data = expect_len(self.transport().read(2)?, 2)?;
        Ok(LittleEndian::read_u16(&data))
    }

    fn reboot(&self) -> Result<(), TransportError> {
        self.transport().write(&BL_REBOOT)
    }

    fn max_address(&self) -> u32 {
        BL_MAX_ADDRESS
    }

    fn stored_image_info(&self) -> Result<Option<StoredImageInfo>, TransportError> {
        let crc = self.read_flash(FLASH_CRC_ADDRESS, 2)?;
        let size = self.read_flash(FLASH_APP_SIZE_ADDRESS, 2)?;
        Ok(Some(StoredImageInfo {
            crc: LittleEndian::read_u16(&crc),
            size: LittleEndian::read_u16(&size),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    #[test]
    fn test_bootloader_opcodes() {
        let mock = MockTransport::new();
        let bl = McuBootloader::new(&mock);

        bl.enter_update_mode().unwrap();
        bl.erase_page(0x1A00, 512).unwrap();
        bl.erase_all().unwrap();
        bl.write_block(0x1A10, &[1, 2, 3]).unwrap();
        bl.start_crc(0x1A00, 0x1A03).unwrap();
        bl.reboot().unwrap();

        assert_eq!(
            mock.get_writes(),
            vec![
                vec![0x30, 0xF0, 0xA5],
                vec![0x44, 0x00, 0x1A, 0x00, 0x02],
                vec![0x44, 0x01],
                vec![0x38, 0x10, 0x1A, 1, 2, 3],
                vec![0x41, 0x00],
                vec![0x46, 0x01],
            ]
        );
    }

    #[test]
    fn test_erase_page_limits() {
        let mock = MockTransport::new();
        let bl = McuBootloader::new(&mock);
        assert!(bl.erase_page(0x1A00, 513).is_err());
        assert!(bl.erase_page(0x1_0000, 16).is_err());
        assert!(mock.get_writes().is_empty());
    }

    #[test]
    fn test_status_follows_probe() {
        let mock = MockTransport::new();
        mock.queue_probe(false);
        let bl = McuBootloader::new(&mock);
        assert!(!bl.read_status().unwrap().is_idle());
        assert!(bl.read_status().unwrap().is_idle());
    }

    #[test]
    fn test_stored_image_info() {
        let mock = MockTransport::new();
        mock.queue_reply(&[0x34, 0x12]);
        mock.queue_reply(&[0x00, 0xD0]);
        let bl = McuBootloader::new(&mock);

        let info = bl.stored_image_info().unwrap().unwrap();
        assert_eq!(info.crc, 0x1234);
        assert_eq!(info.size, 0xD000);

        let tx = mock.get_transactions();
        assert_eq!(tx[0].request, vec![0x39, 0xF0, 0xF3, 2]);
        assert_eq!(tx[1].request, vec![0x39, 0xF4, 0xF3, 2]);
    }

    #[test]
    fn test_checksum_covers_application_area() {
        let mock = MockTransport::new();
        let bl = McuBootloader::new(&mock);
        let window = bl.crc_window().unwrap();
        assert_eq!((window.start, window.max), (0x1A00, 0xF3FF));
        assert!(bl.password_cleared_on_reboot());
    }
}
