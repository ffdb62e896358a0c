//! NVM read, dump and write-back.
//!
//! The main application exposes four 256-byte NVM pages through the NVM
//! read/write commands. Dumps use the image text format with page headers;
//! dump address `page << 8 | offset`.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::cancel::CancelToken;
use crate::device::RegisterClient;
use crate::payload::{FirmwareImage, ImageError, ImageRecord, NvmBlock};
use crate::protocol::constants::{NVM_LINE_SIZE, NVM_LINES_PER_PAGE, NVM_PAGE_COUNT, NVM_PAGE_SIZE};
use crate::transport::{I2cTransport, TransportError};

const SEPARATOR: &str = "////////////////////////////////////////////////////";
const RULER: &str = "//// 00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F";

/// Line holding the factory version bytes.
const FACTORY_VERSION_LINE: usize = 0x2E;
/// Line holding the user version bytes.
const USER_VERSION_LINE: usize = 0x0E;

#[derive(Error, Debug)]
pub enum NvmError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("image error: {0}")]
    Image(#[from] ImageError),

    #[error("block at 0x{address:04X} is outside the NVM dump range")]
    OutOfRange { address: u32 },

    #[error("cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Full copy of the four NVM pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NvmContents {
    pages: [[u8; NVM_PAGE_SIZE]; NVM_PAGE_COUNT as usize],
}

impl Default for NvmContents {
    fn default() -> Self {
        Self {
            pages: [[0u8; NVM_PAGE_SIZE]; NVM_PAGE_COUNT as usize],
        }
    }
}

impl NvmContents {
    /// Read all pages, one 16-byte line per transaction.
    #[instrument(level = "info", skip_all)]
    pub fn read<T: I2cTransport>(regs: &RegisterClient<T>) -> Result<Self, NvmError> {
        let mut contents = Self::default();
        for block in NvmBlock::ALL {
            let page = &mut contents.pages[usize::from(block.index())];
            for (n, line) in page.chunks_mut(NVM_LINE_SIZE).enumerate() {
                let addr = (n * NVM_LINE_SIZE) as u8;
                let data = regs.nvm_read(block.index(), addr, NVM_LINE_SIZE as u8)?;
                line.copy_from_slice(&data[..NVM_LINE_SIZE]);
            }
            debug!(page = block.index(), name = block.name(), "NVM page read");
        }
        Ok(contents)
    }

    pub fn page(&self, block: NvmBlock) -> &[u8; NVM_PAGE_SIZE] {
        &self.pages[usize::from(block.index())]
    }

    /// Line `index` (0..64) across all pages.
    pub fn line(&self, index: usize) -> &[u8] {
        let page = index / NVM_LINES_PER_PAGE;
        let offset = (index % NVM_LINES_PER_PAGE) * NVM_LINE_SIZE;
        &self.pages[page][offset..offset + NVM_LINE_SIZE]
    }

    fn version_at(&self, line: usize) -> (u8, u8) {
        let bytes = self.line(line);
        (bytes[0xF], bytes[0xE])
    }

    pub fn factory_version(&self) -> (u8, u8) {
        self.version_at(FACTORY_VERSION_LINE)
    }

    pub fn user_version(&self) -> (u8, u8) {
        self.version_at(USER_VERSION_LINE)
    }

    /// One 16-byte record per line at its dump address.
    pub fn to_image(&self) -> Result<FirmwareImage, ImageError> {
        let lines = usize::from(NVM_PAGE_COUNT) * NVM_LINES_PER_PAGE;
        let records = (0..lines)
            .map(|i| ImageRecord::new((i * NVM_LINE_SIZE) as u32, self.line(i).to_vec()))
            .collect();
        FirmwareImage::from_records(records)
    }

    /// Write a dump with header and page banners.
    pub fn write_dump<W: Write>(&self, mut w: W, timestamp: DateTime<Local>) -> io::Result<()> {
        let (fmaj, fmin) = self.factory_version();
        let (umaj, umin) = self.user_version();
        writeln!(w, "{}", SEPARATOR)?;
        writeln!(w, "// NVM Contents")?;
        writeln!(w, "// Date & Time: {}", timestamp.format("%d/%m/%Y %H:%M:%S"))?;
        writeln!(w, "// Factory version: {:3}.{}", fmaj, fmin)?;
        writeln!(w, "// User version:    {:3}.{}", umaj, umin)?;

        let lines = usize::from(NVM_PAGE_COUNT) * NVM_LINES_PER_PAGE;
        for i in 0..lines {
            if i % NVM_LINES_PER_PAGE == 0 {
                let page = (i / NVM_LINES_PER_PAGE) as u8;
                let name = NvmBlock::try_from(page).map(|b| b.name()).unwrap_or("?");
                writeln!(w, "{}", SEPARATOR)?;
                writeln!(w, "// Start of page: {} ({})", page, name)?;
                writeln!(w, "{}", RULER)?;
            }
            write!(w, "{:04X} ", i * NVM_LINE_SIZE)?;
            for byte in self.line(i) {
                write!(w, "{:02X} ", byte)?;
            }
            writeln!(w)?;
        }
        write!(w, "//")
    }

    pub fn save_dump(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        let mut file = File::create(path)?;
        self.write_dump(&mut file, Local::now())?;
        file.flush()?;
        info!(path = %path.display(), "NVM dump saved");
        Ok(())
    }

    /// Plain hex listing, a blank line after every page.
    pub fn print<W: Write>(&self, mut w: W) -> io::Result<()> {
        let lines = usize::from(NVM_PAGE_COUNT) * NVM_LINES_PER_PAGE;
        for i in 0..lines {
            for byte in self.line(i) {
                write!(w, "{:02X} ", byte)?;
            }
            writeln!(w)?;
            if (i + 1) % NVM_LINES_PER_PAGE == 0 {
                writeln!(w)?;
            }
        }
        Ok(())
    }
}

/// Write the records of an NVM dump back to the device.
///
/// With `block` set only that page is written. Records are split into
/// 16-byte NVM writes. Returns the number of bytes written.
#[instrument(level = "info", skip(regs, image, cancel))]
pub fn write_dump<T: I2cTransport>(
    regs: &RegisterClient<T>,
    image: &FirmwareImage,
    block: Option<NvmBlock>,
    cancel: &CancelToken,
) -> Result<usize, NvmError> {
    let page_size = NVM_PAGE_SIZE as u32;
    for record in image.records() {
        let page_end = (record.address / page_size + 1) * page_size;
        if record.end() > u32::from(NVM_PAGE_COUNT) * page_size || record.end() > page_end {
            return Err(NvmError::OutOfRange {
                address: record.address,
            });
        }
    }

    let mut written = 0;
    for record in image.records() {
        let page = (record.address / page_size) as u8;
        if let Some(block) = block
            && block.index() != page
        {
            continue;
        }
        let mut offset = (record.address % page_size) as u8;
        for chunk in record.payload.chunks(NVM_LINE_SIZE) {
            if cancel.is_cancelled() {
                return Err(NvmError::Cancelled);
            }
            regs.nvm_write(page, offset, chunk)?;
            offset = offset.wrapping_add(chunk.len() as u8);
            written += chunk.len();
        }
    }
    info!(bytes = written, "NVM written");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::sim::SimulatedDevice;
    use chrono::TimeZone;

    fn patterned() -> NvmContents {
        let mut contents = NvmContents::default();
        for (p, page) in contents.pages.iter_mut().enumerate() {
            for (i, b) in page.iter_mut().enumerate() {
                *b = (i as u8).wrapping_add(p as u8 * 0x40);
            }
        }
        contents
    }

    #[test]
    fn test_read_all_pages() {
        let sim = SimulatedDevice::new();
        let expected = patterned();
        sim.with(|s| s.nvm = expected.pages);
        let regs = RegisterClient::new(&sim);

        let contents = NvmContents::read(&regs).unwrap();
        assert_eq!(contents, expected);
        let reads = sim.frames(0x51);
        assert_eq!(reads.len(), 64);
        assert_eq!(reads[17], vec![0x51, 0x01, 0x10, 0x10]);
    }

    #[test]
    fn test_dump_format() {
        let mut contents = NvmContents::default();
        contents.pages[2][0xE0 + 0xF] = 3;
        contents.pages[2][0xE0 + 0xE] = 7;
        contents.pages[0][0xE0 + 0xF] = 12;
        contents.pages[0][0xE0 + 0xE] = 1;
        let ts = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();

        let mut out = Vec::new();
        contents.write_dump(&mut out, ts).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[1], "// NVM Contents");
        assert_eq!(lines[2], "// Date & Time: 09/03/2024 14:05:07");
        assert_eq!(lines[3], "// Factory version:   3.7");
        assert_eq!(lines[4], "// User version:     12.1");
        assert_eq!(lines[6], "// Start of page: 0 (User Registers)");
        assert_eq!(lines[7], RULER);
        assert!(lines[8].starts_with("0000 00 00 "));
        assert!(text.contains("// Start of page: 3 (Factory Calibration)"));
        assert!(text.ends_with("\n//"));
    }

    #[test]
    fn test_dump_reloads_as_image() {
        let contents = patterned();
        let mut out = Vec::new();
        contents.write_dump(&mut out, Local::now()).unwrap();

        let image = FirmwareImage::parse(std::str::from_utf8(&out).unwrap()).unwrap();
        assert_eq!(image, contents.to_image().unwrap());
        assert_eq!(image.total_size(), 1024);
        assert!(image.is_nvm_dump());
    }

    #[test]
    fn test_write_back_single_block() {
        let sim = SimulatedDevice::new();
        let regs = RegisterClient::new(&sim);
        let image = patterned().to_image().unwrap();

        let written = write_dump(
            &regs,
            &image,
            Some(NvmBlock::UserCalibration),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(written, 256);

        let writes = sim.frames(0x50);
        assert_eq!(writes.len(), 16);
        assert!(writes.iter().all(|w| w[1] == 1));
        sim.with(|s| {
            assert_eq!(s.nvm[1], patterned().pages[1]);
            assert_eq!(s.nvm[0], [0u8; NVM_PAGE_SIZE]);
        });
    }

    #[test]
    fn test_write_back_splits_long_records() {
        let sim = SimulatedDevice::new();
        let regs = RegisterClient::new(&sim);
        let image = FirmwareImage::parse(&format!("0210{}\n", " 5A".repeat(40))).unwrap();

        write_dump(&regs, &image, None, &CancelToken::new()).unwrap();
        let writes = sim.frames(0x50);
        let heads: Vec<&[u8]> = writes.iter().map(|w| &w[..3]).collect();
        assert_eq!(
            heads,
            vec![&[0x50, 2, 0x10][..], &[0x50, 2, 0x20], &[0x50, 2, 0x30]]
        );
        assert_eq!(writes[2].len(), 3 + 8);
    }

    #[test]
    fn test_write_back_rejects_out_of_range() {
        let sim = SimulatedDevice::new();
        let regs = RegisterClient::new(&sim);
        let image = FirmwareImage::parse("0400 01\n").unwrap();
        assert!(matches!(
            write_dump(&regs, &image, None, &CancelToken::new()),
            Err(NvmError::OutOfRange { address: 0x400 })
        ));
        assert!(sim.frames(0x50).is_empty());
    }
}
