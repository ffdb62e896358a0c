//! Simulated camera for session-level tests.
//!
//! Decodes register, NVM, ISP upgrader and MCU bootloader frames and keeps
//! enough state (flash contents, busy countdown, pending CRC) to run a full
//! update pass without hardware. One flash map backs both command sets.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use byteorder::{ByteOrder, LittleEndian};

use super::traits::{I2cTransport, TransportError};
use crate::crc;
use crate::protocol::constants::*;

#[derive(Debug)]
pub(crate) struct SimState {
    pub flash: BTreeMap<u32, u8>,
    pub regs: BTreeMap<u8, u8>,
    pub nvm: [[u8; NVM_PAGE_SIZE]; NVM_PAGE_COUNT as usize],
    pub password: u16,
    pub upgrader: bool,
    pub bootloader: bool,
    pub restarts: u32,
    /// Bootloader reboots into the application.
    pub reboots: u32,
    pub jedec: [u8; 3],
    /// Status reads that still report busy.
    pub busy_polls: u32,
    /// Busy status reads after erase-all.
    pub erase_busy: u32,
    /// Busy status reads after a write.
    pub program_busy: u32,
    pub stuck_busy: bool,
    /// Probes refused after a CRC request.
    pub crc_busy_probes: u32,
    pub unresponsive_probes: u32,
    /// Fixed CRC reported instead of the computed one.
    pub crc_override: Option<u16>,
    pub pending_crc: u16,
    pub writes: Vec<Vec<u8>>,
    pub status_reads: u32,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            flash: BTreeMap::new(),
            regs: BTreeMap::new(),
            nvm: [[0u8; NVM_PAGE_SIZE]; NVM_PAGE_COUNT as usize],
            password: 0,
            upgrader: false,
            bootloader: false,
            restarts: 0,
            reboots: 0,
            jedec: EXPECTED_JEDEC_ID,
            busy_polls: 0,
            erase_busy: 2,
            program_busy: 1,
            stuck_busy: false,
            crc_busy_probes: 1,
            unresponsive_probes: 0,
            crc_override: None,
            pending_crc: 0,
            writes: Vec::new(),
            status_reads: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SimulatedDevice {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut SimState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    /// Requests carrying the given opcode, in order.
    pub fn frames(&self, opcode: u8) -> Vec<Vec<u8>> {
        self.with(|s| {
            s.writes
                .iter()
                .filter(|w| w.first() == Some(&opcode))
                .cloned()
                .collect()
        })
    }

    fn reg_value(s: &SimState, reg: u8, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| *s.regs.get(&reg.wrapping_add(i as u8)).unwrap_or(&0))
            .collect()
    }

    fn flash_byte(s: &SimState, address: u32) -> u8 {
        *s.flash.get(&address).unwrap_or(&0xFF)
    }

    fn start_crc(s: &mut SimState, first: u32, last: u32) {
        let bytes: Vec<u8> = (first..=last).map(|a| Self::flash_byte(s, a)).collect();
        s.pending_crc = s
            .crc_override
            .unwrap_or_else(|| crc::compute(CRC_INITIAL, &bytes));
        s.unresponsive_probes = s.crc_busy_probes;
    }

    /// Application length the bootloader checksums: the stored size when
    /// present, else up to the highest programmed application byte.
    fn app_len(s: &SimState) -> u32 {
        let stored = (FLASH_APP_SIZE_ADDRESS..FLASH_APP_SIZE_ADDRESS + 2)
            .map(|a| s.flash.get(&a).copied())
            .collect::<Option<Vec<u8>>>();
        if let Some(size) = stored {
            return u32::from(LittleEndian::read_u16(&size));
        }
        s.flash
            .range(FLASH_APP_START..=FLASH_APP_MAX)
            .next_back()
            .map_or(0, |(a, _)| a - FLASH_APP_START + 1)
    }

    /// Bootloader command set; `None` for frames it does not own.
    fn handle_bootloader(
        s: &mut SimState,
        request: &[u8],
    ) -> Option<Result<Vec<u8>, TransportError>> {
        let bad = || TransportError::InvalidRequest(format!("sim: bad frame {:02X?}", request));
        let addr16 = |r: &[u8]| r.get(1..3).map(|b| u32::from(LittleEndian::read_u16(b)));

        let reply = match request[0] {
            BL_WRITE => addr16(request).ok_or_else(bad).map(|addr| {
                for (i, b) in request[3..].iter().enumerate() {
                    s.flash.insert(addr + i as u32, *b);
                }
                s.unresponsive_probes = s.program_busy;
                Vec::new()
            }),
            BL_READ => match (addr16(request), request.get(3)) {
                (Some(addr), Some(&len)) => Ok((addr..addr + u32::from(len))
                    .map(|a| Self::flash_byte(s, a))
                    .collect()),
                _ => Err(bad()),
            },
            _ if request == BL_CALC_CRC => {
                let len = Self::app_len(s);
                if len == 0 {
                    s.pending_crc = s.crc_override.unwrap_or(CRC_INITIAL);
                    s.unresponsive_probes = s.crc_busy_probes;
                } else {
                    Self::start_crc(s, FLASH_APP_START, FLASH_APP_START + len - 1);
                }
                Ok(Vec::new())
            }
            _ if request == BL_ERASE_ALL => {
                s.flash.clear();
                s.unresponsive_probes = s.erase_busy;
                Ok(Vec::new())
            }
            BL_ERASE => match (addr16(request), request.get(3..5)) {
                (Some(addr), Some(len)) => {
                    let end = addr + u32::from(LittleEndian::read_u16(len));
                    s.flash.retain(|a, _| *a < addr || *a >= end);
                    s.unresponsive_probes = s.erase_busy;
                    Ok(Vec::new())
                }
                _ => Err(bad()),
            },
            _ if request == BL_REBOOT => {
                s.bootloader = false;
                s.reboots += 1;
                Ok(Vec::new())
            }
            BL_BOOT_ID => Ok(BOOT_ID.to_le_bytes().to_vec()),
            _ => return None,
        };
        Some(reply)
    }

    fn handle(s: &mut SimState, request: &[u8], read_len: usize) -> Result<Vec<u8>, TransportError> {
        let bad = || TransportError::InvalidRequest(format!("sim: bad frame {:02X?}", request));

        if request.is_empty() {
            let mut out = vec![0u8; read_len];
            if read_len >= 2 {
                LittleEndian::write_u16(&mut out, s.pending_crc);
            }
            return Ok(out);
        }

        if s.bootloader {
            if let Some(reply) = Self::handle_bootloader(s, request) {
                return reply;
            }
        }

        match request[0] {
            CMD_WRITE_REG8 | CMD_WRITE_REG16 | CMD_WRITE_REG32 => {
                let reg = *request.get(1).ok_or_else(bad)?;
                for (i, b) in request[2..].iter().enumerate() {
                    s.regs.insert(reg.wrapping_add(i as u8), *b);
                }
                match (reg, request.get(2)) {
                    (REG_PASSWORD_LO, Some(v)) => s.password = (s.password & 0xFF00) | u16::from(*v),
                    (REG_PASSWORD_HI, Some(v)) => {
                        s.password = (s.password & 0x00FF) | (u16::from(*v) << 8)
                    }
                    (REG_UPGRADER, Some(&UPGRADER_ENABLE)) => s.upgrader = true,
                    (REG_MODE, Some(&MODE_ENTER_BOOTLOADER)) => s.bootloader = true,
                    (REG_MODE, Some(&MODE_RESTART)) => {
                        s.upgrader = false;
                        s.restarts += 1;
                    }
                    _ => {}
                }
                Ok(Vec::new())
            }
            CMD_READ_REG8 | CMD_READ_REG16 | CMD_READ_REG32 => {
                let reg = *request.get(1).ok_or_else(bad)?;
                Ok(Self::reg_value(s, reg, read_len))
            }
            CMD_NVM_READ => {
                let [page, addr, len] = [request[1], request[2], request[3]];
                let start = usize::from(addr);
                Ok(s.nvm[usize::from(page)][start..start + usize::from(len)].to_vec())
            }
            CMD_NVM_WRITE => {
                let [page, addr] = [request[1], request[2]];
                let start = usize::from(addr);
                let data = &request[3..];
                s.nvm[usize::from(page)][start..start + data.len()].copy_from_slice(data);
                Ok(Vec::new())
            }
            ISP_STATUS => {
                s.status_reads += 1;
                if s.stuck_busy || s.busy_polls > 0 {
                    s.busy_polls = s.busy_polls.saturating_sub(1);
                    Ok(vec![1, 1])
                } else {
                    Ok(vec![0, 0])
                }
            }
            ISP_SPI_ID => Ok(s.jedec.to_vec()),
            _ if request == ISP_ERASE_ALL => {
                s.flash.clear();
                s.busy_polls = s.erase_busy;
                Ok(Vec::new())
            }
            ISP_ERASE_PAGE => {
                let addr = LittleEndian::read_u24(&request[1..4]);
                s.flash.retain(|a, _| *a < addr || *a >= addr + FLASH_PAGE_SIZE);
                s.busy_polls = s.erase_busy;
                Ok(Vec::new())
            }
            ISP_WRITE => {
                let addr = LittleEndian::read_u24(&request[1..4]);
                for (i, b) in request[4..].iter().enumerate() {
                    s.flash.insert(addr + i as u32, *b);
                }
                s.busy_polls = s.program_busy;
                Ok(Vec::new())
            }
            ISP_CALC_CRC => {
                let first = LittleEndian::read_u24(&request[1..4]);
                let last = LittleEndian::read_u24(&request[4..7]);
                Self::start_crc(s, first, last);
                Ok(Vec::new())
            }
            _ => Err(bad()),
        }
    }
}

impl I2cTransport for SimulatedDevice {
    fn transfer(&self, request: &[u8], read_len: usize) -> Result<Vec<u8>, TransportError> {
        let mut s = self.state.lock().unwrap();
        if !request.is_empty() {
            s.writes.push(request.to_vec());
        }
        Self::handle(&mut s, request, read_len)
    }

    fn probe(&self) -> Result<(), TransportError> {
        let mut s = self.state.lock().unwrap();
        if s.unresponsive_probes > 0 {
            s.unresponsive_probes -= 1;
            return Err(TransportError::Nack {
                address: DEFAULT_I2C_ADDRESS,
            });
        }
        Ok(())
    }

    fn address(&self) -> u16 {
        DEFAULT_I2C_ADDRESS
    }
}
