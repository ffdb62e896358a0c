//! Register protocol of the main camera application.

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, info, instrument};

use crate::protocol::constants::*;
use crate::protocol::frame;
use crate::transport::{I2cTransport, TransportError, expect_len};

/// Register width for peek/poke commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegWidth {
    W8,
    W16,
    W32,
}

impl RegWidth {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            8 => Some(RegWidth::W8),
            16 => Some(RegWidth::W16),
            32 => Some(RegWidth::W32),
            _ => None,
        }
    }

    pub fn bytes(self) -> usize {
        match self {
            RegWidth::W8 => 1,
            RegWidth::W16 => 2,
            RegWidth::W32 => 4,
        }
    }

    /// Largest value representable at this width.
    pub fn max_value(self) -> u32 {
        match self {
            RegWidth::W8 => 0xFF,
            RegWidth::W16 => 0xFFFF,
            RegWidth::W32 => u32::MAX,
        }
    }
}

/// Firmware versions reported by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Versions {
    pub mcu: (u8, u8),
    pub nvm: (u8, u8),
    pub isp: u16,
}

/// Register client over any transport.
pub struct RegisterClient<T: I2cTransport> {
    transport: T,
}

impl<T: I2cTransport> RegisterClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn read8(&self, reg: u8) -> Result<u8, TransportError> {
        let data = expect_len(self.transport.transfer(&frame::read_reg8(reg), 1)?, 1)?;
        Ok(data[0])
    }

    pub fn read16(&self, reg: u8) -> Result<u16, TransportError> {
        let data = expect_len(self.transport.transfer(&frame::read_reg16(reg), 2)?, 2)?;
        Ok(LittleEndian::read_u16(&data))
    }

    pub fn read32(&self, reg: u8) -> Result<u32, TransportError> {
        let data = expect_len(self.transport.transfer(&frame::read_reg32(reg), 4)?, 4)?;
        Ok(LittleEndian::read_u32(&data))
    }

    pub fn write8(&self, reg: u8, value: u8) -> Result<(), TransportError> {
        self.transport.write(&frame::write_reg8(reg, value))
    }

    pub fn write16(&self, reg: u8, value: u16) -> Result<(), TransportError> {
        self.transport.write(&frame::write_reg16(reg, value))
    }

    pub fn write32(&self, reg: u8, value: u32) -> Result<(), TransportError> {
        self.transport.write(&frame::write_reg32(reg, value))
    }

    /// Read a register of the given width, widened to `u32`.
    pub fn read(&self, width: RegWidth, reg: u8) -> Result<u32, TransportError> {
        match width {
            RegWidth::W8 => self.read8(reg).map(u32::from),
            RegWidth::W16 => self.read16(reg).map(u32::from),
            RegWidth::W32 => self.read32(reg),
        }
    }

    /// Write a register of the given width.
    pub fn write(&self, width: RegWidth, reg: u8, value: u32) -> Result<(), TransportError> {
        if value > width.max_value() {
            return Err(TransportError::InvalidRequest(format!(
                "value 0x{:X} does not fit in {} bytes",
                value,
                width.bytes()
            )));
        }
        match width {
            RegWidth::W8 => self.write8(reg, value as u8),
            RegWidth::W16 => self.write16(reg, value as u16),
            RegWidth::W32 => self.write32(reg, value),
        }
    }

    pub fn read_serial(&self) -> Result<[u8; SERIAL_LEN], TransportError> {
        let data = expect_len(
            self.transport.transfer(&[CMD_READ_SERIAL], SERIAL_LEN)?,
            SERIAL_LEN,
        )?;
        let mut serial = [0u8; SERIAL_LEN];
        serial.copy_from_slice(&data[..SERIAL_LEN]);
        Ok(serial)
    }

    /// Write the 16-bit password, low byte first. Zero clears it.
    #[instrument(level = "debug", skip_all)]
    pub fn set_password(&self, password: u16) -> Result<(), TransportError> {
        let [lo, hi] = password.to_le_bytes();
        self.write8(REG_PASSWORD_LO, lo)?;
        self.write8(REG_PASSWORD_HI, hi)
    }

    /// Restart the application.
    pub fn restart(&self) -> Result<(), TransportError> {
        info!("Restarting camera");
        self.write8(REG_MODE, MODE_RESTART)
    }

    pub fn enter_bootloader(&self) -> Result<(), TransportError> {
        debug!("Requesting bootloader mode");
        self.write8(REG_MODE, MODE_ENTER_BOOTLOADER)
    }

    pub fn enter_upgrader(&self) -> Result<(), TransportError> {
        debug!("Requesting ISP upgrader mode");
        self.write8(REG_UPGRADER, UPGRADER_ENABLE)
    }

    /// Boot id, `BOOT_ID` while the bootloader runs.
    pub fn boot_id(&self) -> Result<u16, TransportError> {
        let data = expect_len(self.transport.transfer(&[BL_BOOT_ID], 2)?, 2)?;
        Ok(LittleEndian::read_u16(&data))
    }

    pub fn bootloader_active(&self) -> Result<bool, TransportError> {
        Ok(self.boot_id()? == BOOT_ID)
    }

    pub fn versions(&self) -> Result<Versions, TransportError> {
        Ok(Versions {
            mcu: (
                self.read8(REG_MCU_VERSION_MAJOR)?,
                self.read8(REG_MCU_VERSION_MINOR)?,
            ),
            nvm: (
                self.read8(REG_NVM_VERSION_MAJOR)?,
                self.read8(REG_NVM_VERSION_MINOR)?,
            ),
            isp: u16::from_be_bytes([
                self.read8(REG_ISP_VERSION_HI)?,
                self.read8(REG_ISP_VERSION_LO)?,
            ]),
        })
    }

    /// Select an info item and read its value.
    pub fn info(&self, selector: u8) -> Result<u8, TransportError> {
        self.write8(REG_INFO_SELECT, selector)?;
        self.read8(REG_INFO_VALUE)
    }

    pub fn nvm_read(&self, page: u8, addr: u8, len: u8) -> Result<Vec<u8>, TransportError> {
        let data = self
            .transport
            .transfer(&frame::nvm_read(page, addr, len), usize::from(len))?;
        expect_len(data, usize::from(len))
    }

    pub fn nvm_write(&self, page: u8, addr: u8, data: &[u8]) -> Result<(), TransportError> {
        if data.len() > NVM_LINE_SIZE {
            return Err(TransportError::InvalidRequest(format!(
                "NVM write of {} bytes exceeds {}",
                data.len(),
                NVM_LINE_SIZE
            )));
        }
        self.transport.write(&frame::nvm_write(page, addr, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    #[test]
    fn test_password_write_order() {
        let mock = MockTransport::new();
        let regs = RegisterClient::new(&mock);
        regs.set_password(0x1234).unwrap();
        assert_eq!(
            mock.get_writes(),
            vec![vec![0x30, 0xFC, 0x34], vec![0x30, 0xFD, 0x12]]
        );
    }

    #[test]
    fn test_read_widths() {
        let mock = MockTransport::new();
        mock.queue_reply(&[0xAB]);
        mock.queue_reply(&[0x02, 0x03]);
        mock.queue_reply(&[0x78, 0x56, 0x34, 0x12]);
        let regs = RegisterClient::new(&mock);

        assert_eq!(regs.read(RegWidth::W8, 0x10).unwrap(), 0xAB);
        assert_eq!(regs.read(RegWidth::W16, 0x58).unwrap(), 0x0302);
        assert_eq!(regs.read(RegWidth::W32, 0x64).unwrap(), 0x1234_5678);

        let tx = mock.get_transactions();
        assert_eq!(tx[0].request, vec![0x31, 0x10]);
        assert_eq!(tx[1].request, vec![0x33, 0x58]);
        assert_eq!(tx[2].request, vec![0x35, 0x64]);
        assert_eq!(tx[2].read_len, 4);
    }

    #[test]
    fn test_write_rejects_wide_value() {
        let mock = MockTransport::new();
        let regs = RegisterClient::new(&mock);
        assert!(regs.write(RegWidth::W8, 0x10, 0x100).is_err());
        assert!(mock.get_writes().is_empty());

        regs.write(RegWidth::W32, 0x64, 0x00F4_2400).unwrap();
        assert_eq!(mock.get_writes(), vec![vec![0x34, 0x64, 0x00, 0x24, 0xF4, 0x00]]);
    }

    #[test]
    fn test_short_read_is_error() {
        let mock = MockTransport::new();
        mock.queue_reply(&[0x01]);
        let regs = RegisterClient::new(&mock);
        let err = regs.read16(0x58).unwrap_err();
        assert!(matches!(
            err,
            TransportError::ShortRead {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_info_selects_then_reads() {
        let mock = MockTransport::new();
        mock.queue_reply(&[42]);
        let regs = RegisterClient::new(&mock);
        assert_eq!(regs.info(INFO_MCU_TEMP).unwrap(), 42);
        let tx = mock.get_transactions();
        assert_eq!(tx[0].request, vec![0x30, 0xE8, INFO_MCU_TEMP]);
        assert_eq!(tx[1].request, vec![0x31, 0xE9]);
    }

    #[test]
    fn test_boot_id() {
        let mock = MockTransport::new();
        mock.queue_reply(&[0xA5, 0x5A]);
        let regs = RegisterClient::new(&mock);
        assert!(regs.bootloader_active().unwrap());
    }

    #[test]
    fn test_nvm_write_limit() {
        let mock = MockTransport::new();
        let regs = RegisterClient::new(&mock);
        assert!(regs.nvm_write(0, 0, &[0u8; 17]).is_err());
        regs.nvm_write(1, 0x20, &[1, 2]).unwrap();
        assert_eq!(mock.get_writes(), vec![vec![0x50, 0x01, 0x20, 0x01, 0x02]]);
    }
}
