//! Mock I2C transport for testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::traits::{I2cTransport, TransportError};
use crate::protocol::constants::DEFAULT_I2C_ADDRESS;

/// One recorded bus transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub request: Vec<u8>,
    pub read_len: usize,
    /// Whether the mock answered this attempt with an injected failure.
    pub failed: bool,
}

/// Mock transport for unit testing protocol and session logic.
pub struct MockTransport {
    /// Queued replies for transactions that read.
    reply_queue: Arc<Mutex<VecDeque<Vec<u8>>>>,
    /// Reply used once the queue is drained.
    fallback_reply: Arc<Mutex<Option<Vec<u8>>>>,
    /// Queued probe results.
    probe_queue: Arc<Mutex<VecDeque<bool>>>,
    /// Probe result once the queue is drained.
    probe_default: Arc<Mutex<bool>>,
    /// Number of upcoming transfers that fail with a NACK.
    pending_failures: Arc<Mutex<u32>>,
    /// Captured transactions.
    log: Arc<Mutex<Vec<Transaction>>>,
    probe_count: Arc<Mutex<u32>>,
    /// Whether the bus is "connected".
    connected: Arc<Mutex<bool>>,
    address: u16,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            reply_queue: Arc::new(Mutex::new(VecDeque::new())),
            fallback_reply: Arc::new(Mutex::new(None)),
            probe_queue: Arc::new(Mutex::new(VecDeque::new())),
            probe_default: Arc::new(Mutex::new(true)),
            pending_failures: Arc::new(Mutex::new(0)),
            log: Arc::new(Mutex::new(Vec::new())),
            probe_count: Arc::new(Mutex::new(0)),
            connected: Arc::new(Mutex::new(true)),
            address: DEFAULT_I2C_ADDRESS,
        }
    }

    /// Queue the bytes returned by the next reading transaction.
    pub fn queue_reply(&self, bytes: &[u8]) {
        self.reply_queue.lock().unwrap().push_back(bytes.to_vec());
    }

    /// Reply returned for every read once the queue is empty.
    pub fn set_fallback_reply(&self, bytes: &[u8]) {
        *self.fallback_reply.lock().unwrap() = Some(bytes.to_vec());
    }

    /// Queue the result of the next probe.
    pub fn queue_probe(&self, ack: bool) {
        self.probe_queue.lock().unwrap().push_back(ack);
    }

    /// Probe result once the probe queue is empty.
    pub fn set_probe_default(&self, ack: bool) {
        *self.probe_default.lock().unwrap() = ack;
    }

    /// Make the next `count` transfers fail with a NACK.
    pub fn fail_next(&self, count: u32) {
        *self.pending_failures.lock().unwrap() = count;
    }

    /// All transfer attempts, including failed ones.
    pub fn get_transactions(&self) -> Vec<Transaction> {
        self.log.lock().unwrap().clone()
    }

    /// Request bytes of every successful transaction that wrote something.
    pub fn get_writes(&self) -> Vec<Vec<u8>> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|t| !t.failed && !t.request.is_empty())
            .map(|t| t.request.clone())
            .collect()
    }

    /// Clear captured transactions.
    pub fn clear_writes(&self) {
        self.log.lock().unwrap().clear();
    }

    pub fn probe_count(&self) -> u32 {
        *self.probe_count.lock().unwrap()
    }

    /// Simulate the adapter going away.
    pub fn disconnect(&self) {
        *self.connected.lock().unwrap() = false;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cTransport for MockTransport {
    fn transfer(&self, request: &[u8], read_len: usize) -> Result<Vec<u8>, TransportError> {
        if !*self.connected.lock().unwrap() {
            return Err(TransportError::Closed);
        }

        let mut failures = self.pending_failures.lock().unwrap();
        let failed = *failures > 0;
        if failed {
            *failures -= 1;
        }
        drop(failures);

        self.log.lock().unwrap().push(Transaction {
            request: request.to_vec(),
            read_len,
            failed,
        });

        if failed {
            return Err(TransportError::Nack {
                address: self.address,
            });
        }
        if read_len == 0 {
            return Ok(Vec::new());
        }

        let reply = self.reply_queue.lock().unwrap().pop_front();
        reply
            .or_else(|| self.fallback_reply.lock().unwrap().clone())
            .ok_or_else(|| TransportError::InvalidRequest("no reply queued".into()))
    }

    fn probe(&self) -> Result<(), TransportError> {
        if !*self.connected.lock().unwrap() {
            return Err(TransportError::Closed);
        }
        *self.probe_count.lock().unwrap() += 1;
        let ack = self
            .probe_queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(*self.probe_default.lock().unwrap());
        if ack {
            Ok(())
        } else {
            Err(TransportError::Nack {
                address: self.address,
            })
        }
    }

    fn address(&self) -> u16 {
        self.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_reply_queue() {
        let mock = MockTransport::new();
        mock.queue_reply(&[0x01, 0x00]);
        mock.set_fallback_reply(&[0x00, 0x00]);

        assert_eq!(mock.transfer(&[0x45], 2).unwrap(), vec![0x01, 0x00]);
        assert_eq!(mock.transfer(&[0x45], 2).unwrap(), vec![0x00, 0x00]);
    }

    #[test]
    fn test_mock_empty_queue_is_an_error() {
        let mock = MockTransport::new();
        assert!(mock.transfer(&[0x31, 0xFF], 1).is_err());
    }

    #[test]
    fn test_mock_write_capture() {
        let mock = MockTransport::new();
        mock.write(&[0x30, 0xFC, 0x54]).unwrap();
        mock.write(&[0x30, 0xFD, 0x05]).unwrap();

        let writes = mock.get_writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0], vec![0x30, 0xFC, 0x54]);
        assert_eq!(writes[1], vec![0x30, 0xFD, 0x05]);
    }

    #[test]
    fn test_mock_probe_queue() {
        let mock = MockTransport::new();
        mock.queue_probe(false);
        assert!(mock.probe().is_err());
        assert!(mock.probe().is_ok());
        assert_eq!(mock.probe_count(), 2);
    }

    #[test]
    fn test_mock_disconnect() {
        let mock = MockTransport::new();
        mock.disconnect();
        assert!(matches!(mock.write(&[0x00]), Err(TransportError::Closed)));
        assert!(mock.probe().is_err());
    }
}
