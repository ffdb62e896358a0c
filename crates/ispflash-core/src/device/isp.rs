//! ISP upgrader command set (SPI flash behind the image signal processor).

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, instrument};

use super::registers::RegisterClient;
use super::traits::{FlashProtocol, probe_alive};
use crate::protocol::constants::*;
use crate::protocol::{DeviceStatus, frame};
use crate::transport::{I2cTransport, TransportError, expect_len};

pub struct IspUpgrader<T: I2cTransport> {
    regs: RegisterClient<T>,
}

impl<T: I2cTransport> IspUpgrader<T> {
    pub fn new(transport: T) -> Self {
        Self {
            regs: RegisterClient::new(transport),
        }
    }

    fn transport(&self) -> &T {
        self.regs.transport()
    }

    fn check_address(&self, address: u32) -> Result<(), TransportError> {
        if address > ISP_MAX_ADDRESS {
            return Err(TransportError::InvalidRequest(format!(
                "address 0x{:X} exceeds 24-bit range",
                address
            )));
        }
        Ok(())
    }

    /// Read the SPI flash id with the given id command.
    pub fn read_spi_id(&self, command: u8) -> Result<[u8; 3], TransportError> {
        let data = expect_len(self.transport().transfer(&frame::isp_spi_id(command), 3)?, 3)?;
        Ok([data[0], data[1], data[2]])
    }
}

impl<T: I2cTransport> FlashProtocol for IspUpgrader<T> {
    fn name(&self) -> &'static str {
        "ISP SPI flash"
    }

    fn set_password(&self, password: u16) -> Result<(), TransportError> {
        self.regs.set_password(password)
    }

    fn enter_update_mode(&self) -> Result<(), TransportError> {
        self.regs.enter_upgrader()
    }

    fn is_alive(&self) -> Result<bool, TransportError> {
        probe_alive(self.transport().probe())
    }

    fn read_identity(&self) -> Result<Option<[u8; 3]>, TransportError> {
        self.read_spi_id(SPI_ID_JEDEC).map(Some)
    }

    fn expected_identity(&self) -> Option<[u8; 3]> {
        Some(EXPECTED_JEDEC_ID)
    }

    fn read_status(&self) -> Result<DeviceStatus, TransportError> {
        let data = self.transport().transfer(&[ISP_STATUS], 2)?;
        DeviceStatus::from_bytes(&data).ok_or(TransportError::ShortRead {
            expected: 2,
            actual: data.len(),
        })
    }

    #[instrument(level = "debug", skip(self))]
    fn erase_all(&self) -> Result<(), TransportError> {
        self.transport().write(&ISP_ERASE_ALL)
    }

    fn erase_page(&self, address: u32, _len: u32) -> Result<(), TransportError> {
        self.check_address(address)?;
        debug!(address = %format!("0x{:06X}", address), "ISP page erase");
        self.transport().write(&frame::isp_erase_page(address))
    }

    fn write_block(&self, address: u32, payload: &[u8]) -> Result<(), TransportError> {
        self.check_address(address)?;
        self.transport().write(&frame::isp_write(address, payload))
    }

    fn start_crc(&self, start: u32, end: u32) -> Result<(), TransportError> {
        if end <= start {
            return Err(TransportError::InvalidRequest(format!(
                "empty CRC range 0x{:X}..0x{:X}",
                start, end
            )));
        }
        let last = end - 1;
        self.check_address(last)?;
        debug!(
            start = %format!("0x{:06X}", start),
            last = %format!("0x{:06X}", last),
            "ISP CRC request"
        );
        self.transport().write(&frame::isp_calc_crc(start, last))
    }

    fn read_crc(&self) -> Result<u16, TransportError> {
        let data = expect_len(self.transport().read(2)?, 2)?;
        Ok(LittleEndian::read_u16(&data))
    }

    fn reboot(&self) -> Result<(), TransportError> {
        self.regs.restart()
    }

    fn max_address(&self) -> u32 {
        ISP_MAX_ADDRESS
    }
}
