use core::{convert::Infallible, fmt::Debug};

use embedded_nal::nb::{self, block};

mod memory;
pub use memory::*;

mod read;
pub use read::*;

mod stream;
pub use stream::*;

mod write;
pub use write::*;

/// A byte source. `Ok(0)` from [`Read::read`] means the end of data has been reached.
pub trait Read {
    type Error: Debug;

    fn read(&mut self, buffer: &mut [u8]) -> nb::Result<usize, Self::Error>;

    /// Read until `buffer` is full or the end of data is met, returning the number of bytes read.
    /// Only returns fewer bytes than requested at the end of data.
    fn read_full(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        let mut filled = 0;
        while filled < buffer.len() {
            match block!(self.read(&mut buffer[filled..]))? {
                0 => break,
                amt => filled += amt,
            }
        }
        Ok(filled)
    }
}

/// A byte sink.
pub trait Write {
    type Error: Debug;

    fn write(&mut self, buffer: &[u8]) -> nb::Result<usize, Self::Error>;

    /// Push everything accepted so far towards its final destination.
    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        Ok(())
    }

    fn write_all(&mut self, mut buffer: &[u8]) -> Result<(), WriteError<Self::Error>> {
        while !buffer.is_empty() {
            let written = block!(self.write(buffer)).map_err(WriteError::WriterError)?;
            if written == 0 {
                return Err(WriteError::WriteZero);
            }
            buffer = &buffer[written..];
        }
        Ok(())
    }
}

impl Read for &[u8] {
    type Error = Infallible;

    fn read(&mut self, buffer: &mut [u8]) -> nb::Result<usize, Self::Error> {
        let amt = buffer.len().min(self.len());
        let (head, tail) = self.split_at(amt);
        buffer[..amt].copy_from_slice(head);
        *self = tail;
        Ok(amt)
    }
}
