//! Hex-dump firmware image parsing.
//!
//! The image format is plain text, one block per line:
//!
//! ```text
//! // comment lines are skipped
//! [TOTALSIZE 0x0030]
//! 1A00 00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F
//! ```
//!
//! The first token is the block address, the remaining tokens are payload
//! bytes, all hexadecimal without prefix. Comments of the form `// CRC 0x...`
//! and `// Size 0x...` are kept as metadata.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::crc::Crc16;
use crate::protocol::constants::{FLASH_NVM_SIZE, FLASH_NVM_START, MAX_BLOCK_SIZE};

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("line {line}: invalid hex token '{token}'")]
    InvalidToken { line: usize, token: String },

    #[error("line {line}: byte value '{token}' does not fit in 8 bits")]
    ByteOutOfRange { line: usize, token: String },

    #[error("line {line}: block at 0x{address:04X} has no payload")]
    EmptyPayload { line: usize, address: u32 },

    #[error("line {line}: block at 0x{address:04X} has {len} bytes, maximum is {max}")]
    BlockTooLarge {
        line: usize,
        address: u32,
        len: usize,
        max: usize,
    },

    #[error("line {line}: block at 0x{address:04X} overlaps previous block ending at 0x{prev_end:04X}")]
    Overlap {
        line: usize,
        address: u32,
        prev_end: u32,
    },

    #[error("line {line}: block at 0x{address:X} runs past the 32-bit address space")]
    AddressOverflow { line: usize, address: u32 },

    #[error("block at 0x{address:04X} crosses an NVM page boundary")]
    CrossesNvmPage { address: u32 },

    #[error("image contains no data blocks")]
    Empty,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// One block of the image: a start address and 1..=64 payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub address: u32,
    pub payload: Vec<u8>,
}

impl ImageRecord {
    pub fn new(address: u32, payload: Vec<u8>) -> Self {
        Self { address, payload }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// First address after this block. Saturates at `u32::MAX`; blocks in a
    /// [`FirmwareImage`] never reach it.
    pub fn end(&self) -> u32 {
        self.address.saturating_add(self.payload.len() as u32)
    }
}

/// Values announced in the image's comment header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageMetadata {
    /// `// CRC 0x....`
    pub crc: Option<u16>,
    /// `// Size 0x....`
    pub size: Option<u32>,
}

/// Parsed image, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    records: Vec<ImageRecord>,
    total_size: u32,
    metadata: ImageMetadata,
}

impl FirmwareImage {
    /// Build an image from records, enforcing block size and ordering rules.
    pub fn from_records(records: Vec<ImageRecord>) -> Result<Self, ImageError> {
        Self::build(
            records.into_iter().enumerate().map(|(i, r)| (i + 1, r)),
            ImageMetadata::default(),
        )
    }

    fn build(
        records: impl IntoIterator<Item = (usize, ImageRecord)>,
        metadata: ImageMetadata,
    ) -> Result<Self, ImageError> {
        let mut out: Vec<ImageRecord> = Vec::new();
        let mut total_size: u32 = 0;

        for (line, record) in records {
            if record.payload.is_empty() {
                return Err(ImageError::EmptyPayload {
                    line,
                    address: record.address,
                });
            }
            if record.payload.len() > MAX_BLOCK_SIZE {
                return Err(ImageError::BlockTooLarge {
                    line,
                    address: record.address,
                    len: record.payload.len(),
                    max: MAX_BLOCK_SIZE,
                });
            }
            if record
                .address
                .checked_add(record.payload.len() as u32)
                .is_none()
            {
                return Err(ImageError::AddressOverflow {
                    line,
                    address: record.address,
                });
            }
            if let Some(prev) = out.last()
                && record.address < prev.end()
            {
                return Err(ImageError::Overlap {
                    line,
                    address: record.address,
                    prev_end: prev.end(),
                });
            }
            total_size += record.payload.len() as u32;
            out.push(record);
        }

        if out.is_empty() {
            return Err(ImageError::Empty);
        }

        Ok(Self {
            records: out,
            total_size,
            metadata,
        })
    }

    /// Parse image text.
    pub fn parse(text: &str) -> Result<Self, ImageError> {
        Self::from_reader(text.as_bytes())
    }

    /// Parse an image from any buffered reader.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, ImageError> {
        let mut metadata = ImageMetadata::default();
        let mut records = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line?;

            if line.contains("TOTALSIZE") || line.contains("BLOCKSIZE") {
                continue;
            }
            if line.contains("//") {
                parse_metadata(&line, &mut metadata);
                continue;
            }

            let mut tokens = line.split_whitespace();
            let Some(addr_token) = tokens.next() else {
                continue;
            };
            let address = parse_hex(addr_token).ok_or_else(|| ImageError::InvalidToken {
                line: line_no,
                token: addr_token.to_string(),
            })?;

            let mut payload = Vec::new();
            for token in tokens {
                let value = parse_hex(token).ok_or_else(|| ImageError::InvalidToken {
                    line: line_no,
                    token: token.to_string(),
                })?;
                let byte = u8::try_from(value).map_err(|_| ImageError::ByteOutOfRange {
                    line: line_no,
                    token: token.to_string(),
                })?;
                payload.push(byte);
            }
            records.push((line_no, ImageRecord::new(address, payload)));
        }

        let image = Self::build(records, metadata)?;
        debug!(
            blocks = image.records.len(),
            total_size = image.total_size,
            "Image parsed"
        );
        Ok(image)
    }

    /// Load an image file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let image = Self::from_reader(BufReader::new(file))?;
        info!(
            path = %path.display(),
            blocks = image.records.len(),
            bytes = image.total_size,
            "Image loaded"
        );
        Ok(image)
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    /// Sum of all payload lengths.
    pub fn total_size(&self) -> u32 {
        self.total_size
    }

    pub fn metadata(&self) -> &ImageMetadata {
        &self.metadata
    }

    pub fn with_metadata(mut self, metadata: ImageMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// CRC-16 over every payload byte in order.
    pub fn crc(&self) -> u16 {
        let mut crc = Crc16::new();
        for record in &self.records {
            crc.feed(&record.payload);
        }
        crc.value()
    }

    /// Whether every block lies in the 1 KiB NVM dump address space.
    pub fn is_nvm_dump(&self) -> bool {
        self.records.iter().all(|r| r.end() <= FLASH_NVM_SIZE)
    }

    /// Map NVM dump addresses onto the NVM window of the MCU flash.
    ///
    /// Dumps number the pages 0..=3; the device stores them in reverse order
    /// starting at the NVM window base.
    pub fn relocate_nvm_dump(&self) -> Result<Self, ImageError> {
        let mut records = Vec::with_capacity(self.records.len());
        for record in &self.records {
            let offset = record.address & 0xFF;
            if offset + record.payload.len() as u32 > 0x100 {
                return Err(ImageError::CrossesNvmPage {
                    address: record.address,
                });
            }
            let page = (record.address >> 8) & 0x3;
            let address = FLASH_NVM_START + ((3 - page) << 8) + offset;
            records.push(ImageRecord::new(address, record.payload.clone()));
        }
        records.sort_by_key(|r| r.address);
        Ok(Self::from_records(records)?.with_metadata(self.metadata))
    }

    /// Serialise in the same text format `parse` accepts.
    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        if let Some(crc) = self.metadata.crc {
            writeln!(w, "// CRC 0x{:04X}", crc)?;
        }
        if let Some(size) = self.metadata.size {
            writeln!(w, "// Size 0x{:X}", size)?;
        }
        for record in &self.records {
            write!(w, "{:04X}", record.address)?;
            for byte in &record.payload {
                write!(w, " {:02X}", byte)?;
            }
            writeln!(w)?;
        }
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut file = File::create(path)?;
        self.write_to(&mut file)?;
        file.flush()
    }
}

/// Strict hex parse: digits only, no sign, no prefix.
fn parse_hex(token: &str) -> Option<u32> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(token, 16).ok()
}

fn parse_metadata(line: &str, metadata: &mut ImageMetadata) {
    let body = line.trim_start().trim_start_matches('/').trim();
    let value = || {
        let (_, hex) = body.split_once('x')?;
        let digits: String = hex.chars().take_while(|c| c.is_ascii_hexdigit()).collect();
        parse_hex(&digits)
    };
    if body.starts_with("CRC") {
        metadata.crc = value().and_then(|v| u16::try_from(v).ok());
    } else if body.starts_with("Size") {
        metadata.size = value();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "\
////////////////////////////////
// CRC 0xBEEF
// Size 0x30
[TOTALSIZE 0x30]
[BLOCKSIZE 0x10]
1A00 00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F
1A10 10 11 12 13 14 15 16 17 18 19 1A 1B 1C 1D 1E 1F

1A20 20 21 22 23 24 25 26 27 28 29 2A 2B 2C 2D 2E 2F
//
";

    #[test]
    fn test_parse_sample() {
        let image = FirmwareImage::parse(SAMPLE).unwrap();
        assert_eq!(image.len(), 3);
        assert_eq!(image.total_size(), 48);
        assert_eq!(image.records()[0].address, 0x1A00);
        assert_eq!(image.records()[2].payload[15], 0x2F);
        assert_eq!(image.metadata().crc, Some(0xBEEF));
        assert_eq!(image.metadata().size, Some(0x30));
        assert_eq!(image.crc(), crate::crc::compute(0xFFFF, &(0u8..48).collect::<Vec<_>>()));
    }

    #[test]
    fn test_reject_non_hex_token() {
        let err = FirmwareImage::parse("1A00 00 G1 02\n").unwrap_err();
        assert!(matches!(err, ImageError::InvalidToken { line: 1, .. }));

        let err = FirmwareImage::parse("0x1A00 00\n").unwrap_err();
        assert!(matches!(err, ImageError::InvalidToken { .. }));

        let err = FirmwareImage::parse("1A00 +1\n").unwrap_err();
        assert!(matches!(err, ImageError::InvalidToken { .. }));
    }

    #[test]
    fn test_reject_wide_byte() {
        let err = FirmwareImage::parse("1A00 100\n").unwrap_err();
        assert!(matches!(err, ImageError::ByteOutOfRange { .. }));
    }

    #[test]
    fn test_reject_empty_payload() {
        let err = FirmwareImage::parse("1A00 01\n1A01\n").unwrap_err();
        assert!(matches!(
            err,
            ImageError::EmptyPayload {
                line: 2,
                address: 0x1A01
            }
        ));
    }

    #[test]
    fn test_reject_oversized_block() {
        let line = format!("0000{}\n", " AA".repeat(65));
        let err = FirmwareImage::parse(&line).unwrap_err();
        assert!(matches!(err, ImageError::BlockTooLarge { len: 65, .. }));
    }

    #[test]
    fn test_reject_overlap() {
        let err = FirmwareImage::parse("0000 01 02 03\n0002 04\n").unwrap_err();
        assert!(matches!(err, ImageError::Overlap { prev_end: 3, .. }));
    }

    #[test]
    fn test_reject_block_past_address_space() {
        let mut text = String::from("FFFFFFF0");
        for b in 0..16 {
            text.push_str(&format!(" {:02X}", b));
        }
        text.push_str("\nFFFFFFFF 01\n");
        let err = FirmwareImage::parse(&text).unwrap_err();
        assert!(matches!(
            err,
            ImageError::AddressOverflow {
                line: 1,
                address: 0xFFFF_FFF0
            }
        ));

        let err = FirmwareImage::parse("FFFFFFFF 01 02\n").unwrap_err();
        assert!(matches!(err, ImageError::AddressOverflow { line: 1, .. }));

        let image = FirmwareImage::parse("FFFFFFFE 01\n").unwrap();
        assert_eq!(image.records()[0].end(), 0xFFFF_FFFF);
        assert!(!image.is_nvm_dump());
    }

    #[test]
    fn test_reject_empty_image() {
        let err = FirmwareImage::parse("// nothing here\n").unwrap_err();
        assert!(matches!(err, ImageError::Empty));
    }

    #[test]
    fn test_serialise_and_reload() {
        let image = FirmwareImage::parse(SAMPLE).unwrap();
        let mut out = Vec::new();
        image.write_to(&mut out).unwrap();

        let reloaded = FirmwareImage::parse(std::str::from_utf8(&out).unwrap()).unwrap();
        assert_eq!(reloaded, image);
    }

    #[test]
    fn test_save_and_load_file() {
        let image = FirmwareImage::parse("0000 DE AD\n0040 BE EF 01\n").unwrap();
        let file = NamedTempFile::new().unwrap();
        image.save(file.path()).unwrap();

        let loaded = FirmwareImage::load(file.path()).unwrap();
        assert_eq!(loaded.records(), image.records());
        assert_eq!(loaded.total_size(), 5);
    }

    #[test]
    fn test_nvm_dump_relocation() {
        let text = "0000 01\n0010 02\n0100 03\n0300 04\n";
        let image = FirmwareImage::parse(text).unwrap();
        assert!(image.is_nvm_dump());

        let relocated = image.relocate_nvm_dump().unwrap();
        let addrs: Vec<u32> = relocated.records().iter().map(|r| r.address).collect();
        // page 3 -> 0xF400, page 1 -> 0xF600, page 0 -> 0xF700
        assert_eq!(addrs, vec![0xF400, 0xF600, 0xF700, 0xF710]);
        assert_eq!(relocated.records()[0].payload, vec![0x04]);
        assert_eq!(relocated.records()[3].payload, vec![0x02]);
    }
}
