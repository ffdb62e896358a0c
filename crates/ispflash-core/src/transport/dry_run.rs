//! Transport that logs transactions instead of touching a bus.

use tracing::info;

use super::traits::{I2cTransport, TransportError, hex_bytes};

/// Dry-run transport: every write is logged, every read returns zeros and
/// every probe is acknowledged.
pub struct DryRunTransport {
    address: u16,
}

impl DryRunTransport {
    pub fn new(address: u16) -> Self {
        Self { address }
    }
}

impl I2cTransport for DryRunTransport {
    fn transfer(&self, request: &[u8], read_len: usize) -> Result<Vec<u8>, TransportError> {
        info!(
            addr = %format!("0x{:02X}", self.address),
            request = %hex_bytes(request),
            read_len,
            "dry-run transfer"
        );
        Ok(vec![0; read_len])
    }

    fn probe(&self) -> Result<(), TransportError> {
        Ok(())
    }

    fn address(&self) -> u16 {
        self.address
    }
}
