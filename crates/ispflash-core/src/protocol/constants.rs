//! Protocol constants for the ISP camera module.
//!
//! Opcodes, register addresses and the flash map are fixed by the device
//! firmware and must be reproduced byte for byte.

// ============================================================================
// Bus
// ============================================================================

/// 7-bit I2C address of the camera MCU.
pub const DEFAULT_I2C_ADDRESS: u16 = 0x38;

/// Device nodes for the two camera links.
pub const CSI0_I2C_PATH: &str = "/dev/links/csi0_i2c";
pub const CSI1_I2C_PATH: &str = "/dev/links/csi1_i2c";

// ============================================================================
// Register protocol (main application)
// ============================================================================

pub const CMD_WRITE_REG8: u8 = 0x30;
pub const CMD_READ_REG8: u8 = 0x31;
pub const CMD_WRITE_REG16: u8 = 0x32;
pub const CMD_READ_REG16: u8 = 0x33;
pub const CMD_WRITE_REG32: u8 = 0x34;
pub const CMD_READ_REG32: u8 = 0x35;

/// Write up to 16 bytes into an NVM page: `0x50 page addr data...`
pub const CMD_NVM_WRITE: u8 = 0x50;
/// Read from an NVM page: `0x51 page addr len`
pub const CMD_NVM_READ: u8 = 0x51;

/// Read the 16 byte unique serial number.
pub const CMD_READ_SERIAL: u8 = 0x61;
pub const SERIAL_LEN: usize = 16;

/// Mode register: bootloader entry / restart.
pub const REG_MODE: u8 = 0xF0;
pub const MODE_ENTER_BOOTLOADER: u8 = 0xA5;
pub const MODE_RESTART: u8 = 0x99;

/// Upgrader mode register (exposes the ISP SPI-flash commands).
pub const REG_UPGRADER: u8 = 0xEB;
pub const UPGRADER_ENABLE: u8 = 0x82;

/// Password (unlocks factory NVM pages and flash updates).
pub const REG_PASSWORD_LO: u8 = 0xFC;
pub const REG_PASSWORD_HI: u8 = 0xFD;

// Version registers (major, minor)
pub const REG_MCU_VERSION_MAJOR: u8 = 0xFF;
pub const REG_MCU_VERSION_MINOR: u8 = 0xFE;
pub const REG_NVM_VERSION_MAJOR: u8 = 0xEF;
pub const REG_NVM_VERSION_MINOR: u8 = 0xEE;
pub const REG_ISP_VERSION_HI: u8 = 0xED;
pub const REG_ISP_VERSION_LO: u8 = 0xEC;

/// Info selector / value pair.
pub const REG_INFO_SELECT: u8 = 0xE8;
pub const REG_INFO_VALUE: u8 = 0xE9;

pub const INFO_CAMERA_STATE: u8 = 0x01;
pub const INFO_CAMERA_PASSWORD: u8 = 0x02;
pub const INFO_MCU_TEMP: u8 = 0x03;
pub const INFO_SENSOR_TEMP_ENABLE: u8 = 0x04;
pub const INFO_SENSOR_TEMP: u8 = 0x05;

// Sync / trigger
pub const REG_TRIGGER_MODE: u8 = 0x58;
pub const REG_SYNC_DUTY: u8 = 0x60;
pub const REG_SYNC_PERIOD: u8 = 0x64;
pub const REG_SYNC_ENABLE: u8 = 0x68;

pub const TRIGGER_MODE_WAIT: u16 = 0x0302;
pub const SYNC_DUTY_DEFAULT: u16 = 0x3FFF;
pub const SYNC_ENABLE_PWM: u8 = 0x07;

// ============================================================================
// ISP upgrader (SPI flash behind the ISP)
// ============================================================================

pub const ISP_WRITE: u8 = 0x40;
pub const ISP_ERASE_ALL: [u8; 2] = [0x42, 0x01];
pub const ISP_SPI_ID: u8 = 0x43;
pub const ISP_ERASE_PAGE: u8 = 0x44;
pub const ISP_STATUS: u8 = 0x45;
pub const ISP_CALC_CRC: u8 = 0x47;

/// SPI flash id commands for `ISP_SPI_ID`.
pub const SPI_ID_JEDEC: u8 = 0x9F;
pub const SPI_ID_LEGACY: u8 = 0x90;

/// JEDEC id of the fitted SPI flash (Winbond W25Q80).
pub const EXPECTED_JEDEC_ID: [u8; 3] = [0xEF, 0x40, 0x14];

/// Highest address encodable in the 24-bit ISP commands.
pub const ISP_MAX_ADDRESS: u32 = 0x00FF_FFFF;

// ============================================================================
// MCU bootloader
// ============================================================================

pub const BL_WRITE: u8 = 0x38;
pub const BL_READ: u8 = 0x39;
pub const BL_CALC_CRC: [u8; 2] = [0x41, 0x00];
pub const BL_ERASE: u8 = 0x44;
pub const BL_ERASE_ALL: [u8; 2] = [0x44, 0x01];
pub const BL_REBOOT: [u8; 2] = [0x46, 0x01];
pub const BL_BOOT_ID: u8 = 0x47;

/// Value returned by `BL_BOOT_ID` while the bootloader runs.
pub const BOOT_ID: u16 = 0x5AA5;

/// Highest address encodable in the 16-bit bootloader commands.
pub const BL_MAX_ADDRESS: u32 = 0xFFFF;

// ============================================================================
// Flash map
// ============================================================================

pub const FLASH_APP_START: u32 = 0x1A00;
pub const FLASH_APP_MAX: u32 = 0xF3FF;
pub const FLASH_NVM_START: u32 = 0xF400;
pub const FLASH_NVM_MAX: u32 = 0xF7FF;
pub const FLASH_NVM_SIZE: u32 = FLASH_NVM_MAX - FLASH_NVM_START + 1;
pub const FLASH_CRC_ADDRESS: u32 = 0xF3F0;
pub const FLASH_APP_SIZE_ADDRESS: u32 = 0xF3F4;
pub const FLASH_MAX: u32 = 0xF9FF;

/// Largest erase the bootloader handles correctly; bigger requests corrupt
/// neighbouring pages.
pub const FLASH_PAGE_SIZE: u32 = 512;

/// Largest write-block payload.
pub const MAX_BLOCK_SIZE: usize = 64;

// ============================================================================
// NVM layout
// ============================================================================

pub const NVM_PAGE_COUNT: u8 = 4;
pub const NVM_LINE_SIZE: usize = 16;
pub const NVM_LINES_PER_PAGE: usize = 16;
pub const NVM_PAGE_SIZE: usize = NVM_LINE_SIZE * NVM_LINES_PER_PAGE;

// ============================================================================
// Checksum
// ============================================================================

pub const CRC_POLY: u16 = 0x1021;
pub const CRC_INITIAL: u16 = 0xFFFF;
