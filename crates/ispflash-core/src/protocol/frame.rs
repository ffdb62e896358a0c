//! Request frame builders.
//!
//! Every builder returns the exact byte sequence written to the bus for one
//! transaction. Multi-byte values are little endian.

use byteorder::{ByteOrder, LittleEndian};

use super::constants::*;

fn u24(value: u32) -> [u8; 3] {
    let mut buf = [0u8; 3];
    LittleEndian::write_u24(&mut buf, value & ISP_MAX_ADDRESS);
    buf
}

fn u16le(value: u16) -> [u8; 2] {
    let mut buf = [0u8; 2];
    LittleEndian::write_u16(&mut buf, value);
    buf
}

// ============================================================================
// Registers
// ============================================================================

pub fn write_reg8(reg: u8, value: u8) -> Vec<u8> {
    vec![CMD_WRITE_REG8, reg, value]
}

pub fn write_reg16(reg: u8, value: u16) -> Vec<u8> {
    let mut frame = vec![CMD_WRITE_REG16, reg];
    frame.extend_from_slice(&u16le(value));
    frame
}

pub fn write_reg32(reg: u8, value: u32) -> Vec<u8> {
    let mut buf = [0u8; 4];
    LittleEndian::write_u32(&mut buf, value);
    let mut frame = vec![CMD_WRITE_REG32, reg];
    frame.extend_from_slice(&buf);
    frame
}

pub fn read_reg8(reg: u8) -> [u8; 2] {
    [CMD_READ_REG8, reg]
}

pub fn read_reg16(reg: u8) -> [u8; 2] {
    [CMD_READ_REG16, reg]
}

pub fn read_reg32(reg: u8) -> [u8; 2] {
    [CMD_READ_REG32, reg]
}

pub fn nvm_write(page: u8, addr: u8, data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(3 + data.len());
    frame.extend_from_slice(&[CMD_NVM_WRITE, page, addr]);
    frame.extend_from_slice(data);
    frame
}

pub fn nvm_read(page: u8, addr: u8, len: u8) -> [u8; 4] {
    [CMD_NVM_READ, page, addr, len]
}

// ============================================================================
// ISP upgrader
// ============================================================================

pub fn isp_write(address: u32, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.push(ISP_WRITE);
    frame.extend_from_slice(&u24(address));
    frame.extend_from_slice(payload);
    frame
}

pub fn isp_erase_page(address: u32) -> Vec<u8> {
    let mut frame = vec![ISP_ERASE_PAGE];
    frame.extend_from_slice(&u24(address));
    frame
}

/// CRC request over `first..=last` (both addresses inclusive on the wire).
pub fn isp_calc_crc(first: u32, last: u32) -> Vec<u8> {
    let mut frame = vec![ISP_CALC_CRC];
    frame.extend_from_slice(&u24(first));
    frame.extend_from_slice(&u24(last));
    frame
}

pub fn isp_spi_id(command: u8) -> [u8; 2] {
    [ISP_SPI_ID, command]
}

// ============================================================================
// MCU bootloader
// ============================================================================

pub fn bl_write(address: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(3 + payload.len());
    frame.push(BL_WRITE);
    frame.extend_from_slice(&u16le(address));
    frame.extend_from_slice(payload);
    frame
}

pub fn bl_read(address: u16, len: u8) -> Vec<u8> {
    let mut frame = vec![BL_READ];
    frame.extend_from_slice(&u16le(address));
    frame.push(len);
    frame
}

pub fn bl_erase_page(address: u16, len: u16) -> Vec<u8> {
    let mut frame = vec![BL_ERASE];
    frame.extend_from_slice(&u16le(address));
    frame.extend_from_slice(&u16le(len));
    frame
}
