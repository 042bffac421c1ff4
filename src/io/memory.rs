use core::fmt;

use embedded_nal::nb;
use heapless::Vec;

use super::{Read, Write};

/// A fixed-capacity in-memory byte pipe: bytes written to it are read back in the same order.
///
/// Writes are all-or-nothing; a write that doesn't fit in the free space fails with
/// [`MemoryError::Full`] without storing anything. Reading past the written data reports the end of
/// data.
#[derive(Debug, Default)]
pub struct MemoryChannel<const N: usize> {
    data: Vec<u8, N>,
    read_pos: usize,
    flushes: usize,
}

impl<const N: usize> MemoryChannel<N> {
    pub const fn new() -> Self {
        Self {
            data: Vec::new(),
            read_pos: 0,
            flushes: 0,
        }
    }

    /// Bytes written but not read yet.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.read_pos..]
    }

    pub fn len(&self) -> usize {
        self.data.len() - self.read_pos
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many flush requests the channel has received.
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    /// Drop the already read prefix to make room for more writes.
    fn compact(&mut self) {
        if self.read_pos == 0 {
            return;
        }
        let len = self.len();
        self.data.copy_within(self.read_pos.., 0);
        self.data.truncate(len);
        self.read_pos = 0;
    }
}

impl<const N: usize> Read for MemoryChannel<N> {
    type Error = MemoryError;

    fn read(&mut self, buffer: &mut [u8]) -> nb::Result<usize, Self::Error> {
        let available = self.as_slice();
        let amt = buffer.len().min(available.len());
        buffer[..amt].copy_from_slice(&available[..amt]);
        self.read_pos += amt;
        Ok(amt)
    }
}

impl<const N: usize> Write for MemoryChannel<N> {
    type Error = MemoryError;

    fn write(&mut self, buffer: &[u8]) -> nb::Result<usize, Self::Error> {
        if N - self.data.len() < buffer.len() {
            self.compact();
        }

        let full = MemoryError::Full {
            requested: buffer.len(),
            free: N - self.data.len(),
        };
        self.data
            .extend_from_slice(buffer)
            .map_err(|_| nb::Error::Other(full))?;
        Ok(buffer.len())
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        self.flushes += 1;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryError {
    Full { requested: usize, free: usize },
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full { requested, free } => write!(
                f,
                "memory channel full: {} bytes written, {} free",
                requested, free
            ),
        }
    }
}

impl core::error::Error for MemoryError {}
