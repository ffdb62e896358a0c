//! CRC-16/CCITT-FALSE (poly 0x1021, no reflection, no final xor).
//!
//! The device runs the same bitwise algorithm over its flash, so host and
//! device values are directly comparable.

use crate::protocol::constants::{CRC_INITIAL, CRC_POLY};

/// Fold one byte into the running checksum.
pub fn update(acc: u16, byte: u8) -> u16 {
    let mut acc = acc ^ ((byte as u16) << 8);
    for _ in 0..8 {
        acc = if acc & 0x8000 != 0 {
            (acc << 1) ^ CRC_POLY
        } else {
            acc << 1
        };
    }
    acc
}

/// Checksum of `bytes` starting from `init`.
pub fn compute(init: u16, bytes: &[u8]) -> u16 {
    bytes.iter().fold(init, |acc, &b| update(acc, b))
}

/// Streaming accumulator, for hashing record by record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc16 {
    value: u16,
    len: usize,
}

impl Crc16 {
    pub fn new() -> Self {
        Self::with_init(CRC_INITIAL)
    }

    pub fn with_init(init: u16) -> Self {
        Self {
            value: init,
            len: 0,
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.value = compute(self.value, bytes);
        self.len += bytes.len();
    }

    pub fn value(&self) -> u16 {
        self.value
    }

    /// Number of bytes fed so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        assert_eq!(compute(0xFFFF, b"123456789"), 0x29B1);
    }

    #[test]
    fn test_single_zero_byte() {
        assert_eq!(compute(0xFFFF, &[0x00]), 0xE1F0);
        assert_eq!(update(0xFFFF, 0x00), 0xE1F0);
    }

    #[test]
    fn test_empty_input_returns_init() {
        assert_eq!(compute(0xFFFF, &[]), 0xFFFF);
        assert_eq!(compute(0x1234, &[]), 0x1234);
    }

    #[test]
    fn test_order_sensitive() {
        let a = compute(0xFFFF, &[0x01, 0x02]);
        let b = compute(0xFFFF, &[0x02, 0x01]);
        assert_eq!(a, 0x0E7C);
        assert_eq!(b, 0x6B4C);
        assert_ne!(a, b);
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let data: Vec<u8> = (0u8..48).collect();
        let mut crc = Crc16::new();
        for chunk in data.chunks(16) {
            crc.feed(chunk);
        }
        assert_eq!(crc.value(), compute(CRC_INITIAL, &data));
        assert_eq!(crc.value(), 0x116F);
        assert_eq!(crc.len(), 48);
    }
}
