//! Camera status report.

use std::fmt;

use crate::device::{RegisterClient, Versions};
use crate::protocol::constants::*;
use crate::transport::{I2cTransport, TransportError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    pub bootloader_active: bool,
    pub versions: Versions,
    pub camera_state: u8,
    pub password_state: u8,
    pub mcu_temperature: u8,
    pub sensor_temperature: u8,
}

impl CameraInfo {
    /// Collect the status items the application exposes.
    pub fn read<T: I2cTransport>(regs: &RegisterClient<T>) -> Result<Self, TransportError> {
        let bootloader_active = regs.bootloader_active()?;
        let versions = regs.versions()?;
        let camera_state = regs.info(INFO_CAMERA_STATE)?;
        let password_state = regs.info(INFO_CAMERA_PASSWORD)?;
        let mcu_temperature = regs.info(INFO_MCU_TEMP)?;
        // The temperature sensor must be enabled before its value is selected.
        regs.write8(REG_INFO_SELECT, INFO_SENSOR_TEMP_ENABLE)?;
        let sensor_temperature = regs.info(INFO_SENSOR_TEMP)?;

        Ok(Self {
            bootloader_active,
            versions,
            camera_state,
            password_state,
            mcu_temperature,
            sensor_temperature,
        })
    }
}

impl fmt::Display for CameraInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bootloader_active {
            writeln!(f, "Bootloader is active!")?;
        }
        let v = &self.versions;
        writeln!(f, "MCU version = {}.{}", v.mcu.0, v.mcu.1)?;
        writeln!(f, "NVM version = {}.{}", v.nvm.0, v.nvm.1)?;
        writeln!(f, "ISP version = {}", v.isp)?;
        writeln!(f, "CAMERA_STATE = {}", self.camera_state)?;
        writeln!(f, "CAMERA_PASSWORD = {}", self.password_state)?;
        writeln!(f, "MCU_TEMP = {}", self.mcu_temperature)?;
        write!(f, "SENSOR_TEMP = {}", self.sensor_temperature)
    }
}
