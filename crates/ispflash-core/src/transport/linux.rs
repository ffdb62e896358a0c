//! Linux i2c-dev transport.
//!
//! Issues combined transactions through the `I2C_RDWR` ioctl so a write and
//! the following read share one repeated-start transfer.

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::Path;

use nix::errno::Errno;
use tracing::{debug, info, instrument};

use super::traits::{I2cTransport, TransportError, hex_bytes};

/// i2c-dev ioctl constants
mod ioctl {
    /// Combined read/write transfer (`I2C_RDWR`).
    pub const I2C_RDWR: u32 = 0x0707;
    /// Message flag: read from slave to master.
    pub const I2C_M_RD: u16 = 0x0001;

    /// Matches the kernel's `struct i2c_msg`.
    #[repr(C)]
    pub struct I2cMsg {
        pub addr: u16,
        pub flags: u16,
        pub len: u16,
        pub buf: *mut u8,
    }

    /// Matches the kernel's `struct i2c_rdwr_ioctl_data`.
    #[repr(C)]
    pub struct I2cRdwrIoctlData {
        pub msgs: *mut I2cMsg,
        pub nmsgs: u32,
    }

    nix::ioctl_write_ptr_bad!(i2c_rdwr, I2C_RDWR, I2cRdwrIoctlData);
}

use ioctl::{I2C_M_RD, I2cMsg, I2cRdwrIoctlData};

/// Transport over a Linux `/dev/i2c-N` (or udev link) device node.
pub struct LinuxI2c {
    file: File,
    path: String,
    address: u16,
}

impl LinuxI2c {
    /// Open the adapter at `path` for the peripheral at `address`.
    #[instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, address: u16) -> Result<Self, TransportError> {
        let path_str = path.as_ref().display().to_string();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())
            .map_err(|e| TransportError::OpenFailed {
                path: path_str.clone(),
                message: e.to_string(),
            })?;

        info!(
            path = %path_str,
            addr = %format!("0x{:02X}", address),
            "I2C adapter opened"
        );

        Ok(Self {
            file,
            path: path_str,
            address,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn rdwr(&self, msgs: &mut [I2cMsg]) -> Result<(), TransportError> {
        let data = I2cRdwrIoctlData {
            msgs: msgs.as_mut_ptr(),
            nmsgs: msgs.len() as u32,
        };
        // SAFETY: every message buffer outlives the call and its `len` matches
        // the allocation it points to.
        let res = unsafe { ioctl::i2c_rdwr(self.file.as_raw_fd(), &data) };
        match res {
            Ok(_) => Ok(()),
            Err(Errno::ENXIO) | Err(Errno::EREMOTEIO) => Err(TransportError::Nack {
                address: self.address,
            }),
            Err(e @ (Errno::EIO | Errno::EAGAIN | Errno::ETIMEDOUT)) => {
                Err(TransportError::Bus(e.to_string()))
            }
            Err(e) => Err(TransportError::Io(std::io::Error::from(e))),
        }
    }
}

impl I2cTransport for LinuxI2c {
    fn transfer(&self, request: &[u8], read_len: usize) -> Result<Vec<u8>, TransportError> {
        if request.len() > u16::MAX as usize || read_len > u16::MAX as usize {
            return Err(TransportError::InvalidRequest(format!(
                "transfer too long: write {} / read {}",
                request.len(),
                read_len
            )));
        }

        let mut wbuf = request.to_vec();
        let mut rbuf = vec![0u8; read_len];
        let mut msgs = Vec::with_capacity(2);

        if !wbuf.is_empty() {
            msgs.push(I2cMsg {
                addr: self.address,
                flags: 0,
                len: wbuf.len() as u16,
                buf: wbuf.as_mut_ptr(),
            });
        }
        if read_len > 0 {
            msgs.push(I2cMsg {
                addr: self.address,
                flags: I2C_M_RD,
                len: read_len as u16,
                buf: rbuf.as_mut_ptr(),
            });
        }
        if msgs.is_empty() {
            return Err(TransportError::InvalidRequest("empty transaction".into()));
        }

        self.rdwr(&mut msgs)?;
        debug!(request = %hex_bytes(request), reply = %hex_bytes(&rbuf), "i2c transfer");
        Ok(rbuf)
    }

    fn probe(&self) -> Result<(), TransportError> {
        let mut empty = [0u8; 1];
        let mut msgs = [I2cMsg {
            addr: self.address,
            flags: 0,
            len: 0,
            buf: empty.as_mut_ptr(),
        }];
        self.rdwr(&mut msgs)
    }

    fn address(&self) -> u16 {
        self.address
    }
}
