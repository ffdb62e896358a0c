//! I2C transport layer abstraction.
//!
//! Defines the `I2cTransport` trait for one bus transaction against the
//! camera MCU, allowing different implementations (i2c-dev, dry-run, mock).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to open {path}: {message}")]
    OpenFailed { path: String, message: String },

    #[error("No acknowledge from device 0x{address:02X}")]
    Nack { address: u16 },

    #[error("Bus error: {0}")]
    Bus(String),

    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Bus unavailable after {attempts} attempts: {last}")]
    Unavailable {
        attempts: u32,
        last: Box<TransportError>,
    },

    #[error("Transport closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether retrying the same transaction may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::Nack { .. }
                | TransportError::Bus(_)
                | TransportError::ShortRead { .. }
                | TransportError::Io(_)
        )
    }
}

/// Abstract I2C transport interface.
///
/// One call is one bus transaction against a fixed peripheral address.
/// Responses are correlated with requests by position only, so callers must
/// never interleave transactions on the same handle.
pub trait I2cTransport: Send + Sync {
    /// Write `request` then read `read_len` bytes (repeated start).
    ///
    /// An empty `request` performs a read-only transaction, `read_len == 0`
    /// a write-only one.
    fn transfer(&self, request: &[u8], read_len: usize) -> Result<Vec<u8>, TransportError>;

    /// Write-only transaction.
    fn write(&self, request: &[u8]) -> Result<(), TransportError> {
        self.transfer(request, 0).map(|_| ())
    }

    /// Read-only transaction.
    fn read(&self, len: usize) -> Result<Vec<u8>, TransportError> {
        self.transfer(&[], len)
    }

    /// Zero-length write; succeeds when the device acknowledges its address.
    fn probe(&self) -> Result<(), TransportError>;

    /// 7-bit peripheral address.
    fn address(&self) -> u16;
}

impl<T: I2cTransport + ?Sized> I2cTransport for &T {
    fn transfer(&self, request: &[u8], read_len: usize) -> Result<Vec<u8>, TransportError> {
        (**self).transfer(request, read_len)
    }

    fn probe(&self) -> Result<(), TransportError> {
        (**self).probe()
    }

    fn address(&self) -> u16 {
        (**self).address()
    }
}

impl<T: I2cTransport + ?Sized> I2cTransport for Box<T> {
    fn transfer(&self, request: &[u8], read_len: usize) -> Result<Vec<u8>, TransportError> {
        (**self).transfer(request, read_len)
    }

    fn probe(&self) -> Result<(), TransportError> {
        (**self).probe()
    }

    fn address(&self) -> u16 {
        (**self).address()
    }
}

/// Check that a read returned exactly `expected` bytes.
pub fn expect_len(data: Vec<u8>, expected: usize) -> Result<Vec<u8>, TransportError> {
    if data.len() < expected {
        return Err(TransportError::ShortRead {
            expected,
            actual: data.len(),
        });
    }
    Ok(data)
}

/// Render bytes as space separated hex for logs.
pub fn hex_bytes(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
