//! Byte-level transport contract consumed by register reads and writes.
//!
//! Platform adapters (SPI, I2C, bit-banged shift registers) implement
//! [`RegisterBus`] outside this crate. Retries and timeouts are theirs.

use std::collections::VecDeque;

use thiserror::Error;

use crate::diag::{Diagnostic, DiagnosticSink};

/// Transport failure categories reported by a [`RegisterBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum BusError {
    /// Adapter could not complete a write.
    #[error("bus write failed")]
    WriteFailed,
    /// Adapter could not complete a read.
    #[error("bus read failed")]
    ReadFailed,
    /// Adapter returned a different number of bytes than requested.
    #[error("bus returned {actual} bytes, expected {expected}")]
    ShortRead {
        /// Requested length.
        expected: usize,
        /// Length actually returned.
        actual: usize,
    },
}

/// Write/read capability of a device connection.
pub trait RegisterBus {
    /// Sends one register's big-endian bytes to the device.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::WriteFailed`] when the adapter cannot complete the write.
    fn write(&mut self, bytes: &[u8]) -> Result<(), BusError>;

    /// Reads `len` raw bytes from the device.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ReadFailed`] when the adapter cannot complete the read.
    fn read(&mut self, len: usize) -> Result<Vec<u8>, BusError>;
}

/// Loopback bus with no device behind it.
///
/// Every write is recorded and replaces the read-back buffer, so a read
/// returns the last word written. Reads past the buffered data return zeros.
#[derive(Debug, Clone)]
pub struct VirtualBus {
    writes: Vec<Vec<u8>>,
    pending: VecDeque<u8>,
}

impl VirtualBus {
    /// Creates a virtual bus, announcing to `sink` that data may not be real.
    #[must_use]
    pub fn new(sink: &mut dyn DiagnosticSink) -> Self {
        sink.on_diagnostic(Diagnostic::VirtualDevice);
        Self {
            writes: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    /// Every write in order.
    #[must_use]
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// Drains the write history.
    pub fn take_writes(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.writes)
    }

    /// Queues bytes for subsequent reads.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.pending.extend(bytes);
    }
}

impl RegisterBus for VirtualBus {
    fn write(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        self.writes.push(bytes.to_vec());
        self.pending.clear();
        self.pending.extend(bytes);
        Ok(())
    }

    fn read(&mut self, len: usize) -> Result<Vec<u8>, BusError> {
        Ok((0..len)
            .map(|_| self.pending.pop_front().unwrap_or(0))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{RegisterBus, VirtualBus};
    use crate::diag::{Diagnostic, LogSink};

    #[test]
    fn virtual_bus_announces_itself() {
        let mut seen = Vec::new();
        let _bus = VirtualBus::new(&mut |d| seen.push(d));
        assert_eq!(seen, vec![Diagnostic::VirtualDevice]);
    }

    #[test]
    fn virtual_bus_loops_writes_back() {
        let mut bus = VirtualBus::new(&mut LogSink);
        bus.write(&[0x12, 0x34]).expect("write");
        assert_eq!(bus.writes(), &[vec![0x12, 0x34]]);
        assert_eq!(bus.read(3).expect("read"), vec![0x12, 0x34, 0x00]);
        assert_eq!(bus.read(1).expect("read"), vec![0x00]);
    }

    #[test]
    fn unread_writes_do_not_accumulate() {
        let mut bus = VirtualBus::new(&mut LogSink);
        for word in 0..1000_u16 {
            bus.write(&word.to_be_bytes()).expect("write");
        }
        assert_eq!(bus.read(3).expect("read"), vec![0x03, 0xE7, 0x00]);
        assert_eq!(bus.take_writes().len(), 1000);
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn fed_bytes_are_read_in_order() {
        let mut bus = VirtualBus::new(&mut LogSink);
        bus.feed(&[1, 2, 3]);
        assert_eq!(bus.read(2).expect("read"), vec![1, 2]);
        assert_eq!(bus.read(1).expect("read"), vec![3]);
    }
}
