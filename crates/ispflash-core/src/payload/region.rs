//! Flash regions an update pass can be restricted to.

use std::fmt;

use thiserror::Error;

use super::image::{FirmwareImage, ImageRecord};
use crate::crc::Crc16;
use crate::protocol::constants::{FLASH_APP_MAX, FLASH_APP_START, FLASH_NVM_MAX, FLASH_NVM_START};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid NVM block {0}, expected 0..=3")]
pub struct InvalidNvmBlock(pub u8);

/// One of the four 256-byte NVM pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NvmBlock {
    UserRegisters,
    UserCalibration,
    FactoryRegisters,
    FactoryCalibration,
}

impl NvmBlock {
    pub const ALL: [NvmBlock; 4] = [
        NvmBlock::UserRegisters,
        NvmBlock::UserCalibration,
        NvmBlock::FactoryRegisters,
        NvmBlock::FactoryCalibration,
    ];

    pub fn index(self) -> u8 {
        match self {
            NvmBlock::UserRegisters => 0,
            NvmBlock::UserCalibration => 1,
            NvmBlock::FactoryRegisters => 2,
            NvmBlock::FactoryCalibration => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            NvmBlock::UserRegisters => "User Registers",
            NvmBlock::UserCalibration => "User Calibration",
            NvmBlock::FactoryRegisters => "Factory Registers",
            NvmBlock::FactoryCalibration => "Factory Calibration",
        }
    }

    /// Factory pages are write-protected by the password.
    pub fn requires_password(self) -> bool {
        matches!(
            self,
            NvmBlock::FactoryRegisters | NvmBlock::FactoryCalibration
        )
    }

    /// Address range of this page in an NVM dump file.
    pub fn dump_window(self) -> AddressWindow {
        let start = u32::from(self.index()) << 8;
        AddressWindow::new(start, start + 0xFF)
    }

    /// Address range of this page in MCU flash (pages are stored reversed).
    pub fn flash_window(self) -> AddressWindow {
        let start = FLASH_NVM_START + (u32::from(3 - self.index()) << 8);
        AddressWindow::new(start, start + 0xFF)
    }
}

impl TryFrom<u8> for NvmBlock {
    type Error = InvalidNvmBlock;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        NvmBlock::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(InvalidNvmBlock(value))
    }
}

impl fmt::Display for NvmBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Inclusive address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressWindow {
    pub start: u32,
    pub max: u32,
}

impl AddressWindow {
    pub const fn new(start: u32, max: u32) -> Self {
        Self { start, max }
    }

    pub fn contains(&self, address: u32) -> bool {
        address >= self.start && address <= self.max
    }

    pub fn len(&self) -> u32 {
        self.max - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for AddressWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}..=0x{:04X}", self.start, self.max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// Application area of the MCU flash.
    App,
    /// The whole NVM window.
    Nvm,
    NvmBlock(NvmBlock),
    /// No address filter.
    All,
}

impl Region {
    /// Address window of this region, `None` for [`Region::All`].
    pub fn window(self) -> Option<AddressWindow> {
        match self {
            Region::App => Some(AddressWindow::new(FLASH_APP_START, FLASH_APP_MAX)),
            Region::Nvm => Some(AddressWindow::new(FLASH_NVM_START, FLASH_NVM_MAX)),
            Region::NvmBlock(block) => Some(block.flash_window()),
            Region::All => None,
        }
    }

    pub fn requires_password(self) -> bool {
        match self {
            Region::NvmBlock(block) => block.requires_password(),
            Region::Nvm | Region::All => true,
            Region::App => false,
        }
    }

    /// Records of `image` that fall in this region.
    ///
    /// Records below the window are skipped; selection stops at the first
    /// record past the window maximum.
    pub fn select<'a>(self, image: &'a FirmwareImage) -> Scope<'a> {
        let window = self.window();
        let mut records = Vec::new();
        for record in image.records() {
            if let Some(w) = window {
                if record.address > w.max {
                    break;
                }
                if record.address < w.start {
                    continue;
                }
            }
            records.push(record);
        }
        Scope { records }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::App => write!(f, "App"),
            Region::Nvm => write!(f, "NVM"),
            Region::NvmBlock(block) => write!(f, "NVM {} ({})", block.index(), block),
            Region::All => write!(f, "All"),
        }
    }
}

/// The in-scope records of an image for one region.
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    records: Vec<&'a ImageRecord>,
}

impl<'a> Scope<'a> {
    pub fn records(&self) -> &[&'a ImageRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records lying entirely inside `window`.
    pub fn within(&self, window: AddressWindow) -> Scope<'a> {
        Scope {
            records: self
                .records
                .iter()
                .copied()
                .filter(|r| r.address >= window.start && r.end() - 1 <= window.max)
                .collect(),
        }
    }

    /// Address of the first in-scope record.
    pub fn start(&self) -> Option<u32> {
        self.records.first().map(|r| r.address)
    }

    /// Sum of in-scope payload lengths.
    pub fn size(&self) -> u32 {
        self.records.iter().map(|r| r.len() as u32).sum()
    }

    /// `start + size`, exclusive.
    pub fn end(&self) -> Option<u32> {
        self.start().map(|s| s + self.size())
    }

    /// Whether the records cover `start..end` without gaps.
    pub fn is_contiguous(&self) -> bool {
        self.records
            .windows(2)
            .all(|pair| pair[0].end() == pair[1].address)
    }

    /// CRC-16 over in-scope payload bytes in order.
    pub fn crc(&self) -> u16 {
        let mut crc = Crc16::new();
        for record in &self.records {
            crc.feed(&record.payload);
        }
        crc.value()
    }
}
