use core::{fmt, mem::ManuallyDrop};

use embedded_nal::nb::block;

use super::Write;
use crate::{
    budget::{Budget, BudgetConfig, ConfigError, Underflow},
    scalar::Scalar,
};

/// Buffered writer staging bytes before pushing them to a [`Write`] channel.
///
/// Writes that fit in the free space of the buffer never touch the channel. Once the buffer runs
/// full it is pushed as a whole, and data at least as large as the buffer goes straight to the
/// channel. Staged bytes are flushed when the writer is dropped.
///
/// A constrained writer rejects any write that would push more bytes than its budget allows, before
/// the channel sees anything.
pub struct BufWriter<'a, W, B>
where
    W: Write,
    B: AsRef<[u8]> + AsMut<[u8]>,
{
    writer: &'a mut W,
    buffer: B,
    filled: usize,
    budget: Option<Budget>,
}

impl<'a, W, B> BufWriter<'a, W, B>
where
    W: Write,
    B: AsRef<[u8]> + AsMut<[u8]>,
{
    pub fn new(writer: &'a mut W, buffer: B) -> Self {
        Self::from_budget(writer, buffer, None)
    }

    /// Writer allowed to push at most `budget` bytes to the channel.
    pub fn constrained(writer: &'a mut W, buffer: B, budget: usize) -> Self {
        Self::from_budget(writer, buffer, Some(Budget::new(budget)))
    }

    pub fn with_config(
        writer: &'a mut W,
        buffer: B,
        config: BudgetConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self::from_budget(writer, buffer, config.build()?))
    }

    fn from_budget(writer: &'a mut W, buffer: B, budget: Option<Budget>) -> Self {
        Self {
            writer,
            buffer,
            filled: 0,
            budget,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.as_ref().len()
    }

    /// Bytes staged and not flushed yet.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer.as_ref()[..self.filled]
    }

    /// Bytes the channel may still receive, or `None` for an unconstrained writer.
    pub fn num_bytes_remaining(&self) -> Option<usize> {
        self.budget.map(|budget| budget.remaining())
    }

    /// Write one [`Scalar`] in native byte order.
    pub fn put<T: Scalar>(&mut self, value: T) -> Result<(), WriteError<W::Error>> {
        self.write(value.to_bytes().as_ref())
    }

    pub fn write(&mut self, data: &[u8]) -> Result<(), WriteError<W::Error>> {
        let capacity = self.capacity();
        let free = capacity - self.filled;
        if data.len() <= free {
            self.write_to_buffer(data);
            return Ok(());
        }

        if let Some(budget) = &self.budget {
            let requested = self.filled.saturating_add(data.len());
            if !budget.covers(0, requested) {
                let available = budget.remaining();
                tracing::warn!(requested, available, "write exceeds byte budget");
                return Err(WriteError::CapacityExceeded {
                    requested,
                    available,
                });
            }
        }

        let (head, tail) = data.split_at(free);
        self.write_to_buffer(head);
        self.flush_buffer()?;

        if tail.len() >= capacity {
            tracing::trace!(amt = tail.len(), "writing past the buffer");
            self.writer.write_all(tail)?;
            self.charge(tail.len())?;
        } else {
            self.write_to_buffer(tail);
        }
        Ok(())
    }

    /// Push staged bytes to the channel, then ask the channel to flush. Nothing is pushed when no bytes
    /// are staged, so calling it repeatedly is harmless.
    pub fn flush(&mut self) -> Result<(), WriteError<W::Error>> {
        self.flush_buffer()?;
        block!(self.writer.flush()).map_err(WriteError::WriterError)
    }

    /// Flush and give back the buffer, reporting the error a drop would have swallowed.
    pub fn finish(self) -> Result<B, WriteError<W::Error>> {
        let mut me = ManuallyDrop::new(self);
        let result = me.flush();
        // SAFETY: `me` is never touched again and its destructor never runs, so the buffer is moved
        // out exactly once.
        let buffer = unsafe { core::ptr::read(&me.buffer) };
        result.map(|()| buffer)
    }

    fn write_to_buffer(&mut self, data: &[u8]) {
        self.buffer.as_mut()[self.filled..self.filled + data.len()].copy_from_slice(data);
        self.filled += data.len();
    }

    fn flush_buffer(&mut self) -> Result<(), WriteError<W::Error>> {
        if self.filled == 0 {
            return Ok(());
        }

        if let Some(budget) = &self.budget {
            if !budget.covers(0, self.filled) {
                tracing::warn!(
                    requested = self.filled,
                    available = budget.remaining(),
                    "flush exceeds byte budget"
                );
                return Err(WriteError::CapacityExceeded {
                    requested: self.filled,
                    available: budget.remaining(),
                });
            }
        }

        tracing::trace!(amt = self.filled, "flushing write buffer");
        self.writer.write_all(&self.buffer.as_ref()[..self.filled])?;
        self.charge(self.filled)?;
        self.filled = 0;
        Ok(())
    }

    fn charge(&mut self, amt: usize) -> Result<(), Underflow> {
        match &mut self.budget {
            Some(budget) => budget.take(amt),
            None => Ok(()),
        }
    }
}

impl<'a, W, B> Drop for BufWriter<'a, W, B>
where
    W: Write,
    B: AsRef<[u8]> + AsMut<[u8]>,
{
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = ?e, "flush on drop failed, staged bytes are lost");
        }
    }
}

impl<'a, W, B> fmt::Write for BufWriter<'a, W, B>
where
    W: Write,
    B: AsRef<[u8]> + AsMut<[u8]>,
{
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write(s.as_bytes()).map_err(|_| fmt::Error)
    }
}

#[derive(Debug, PartialEq)]
pub enum WriteError<E>
where
    E: fmt::Debug,
{
    WriterError(E),
    /// The channel stopped accepting bytes.
    WriteZero,
    /// The write would push more than the byte budget allows. The channel was not touched.
    CapacityExceeded { requested: usize, available: usize },
    BudgetUnderflow(Underflow),
}

impl<E> From<Underflow> for WriteError<E>
where
    E: fmt::Debug,
{
    fn from(value: Underflow) -> Self {
        Self::BudgetUnderflow(value)
    }
}

impl<E> fmt::Display for WriteError<E>
where
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriterError(e) => write!(f, "write to channel failed: {:?}", e),
            Self::WriteZero => write!(f, "channel accepted no bytes"),
            Self::CapacityExceeded {
                requested,
                available,
            } => write!(
                f,
                "not enough bytes remaining to write the entire data: requested {}, {} available",
                requested, available
            ),
            Self::BudgetUnderflow(e) => write!(f, "{}", e),
        }
    }
}

impl<E> core::error::Error for WriteError<E> where E: fmt::Debug {}
