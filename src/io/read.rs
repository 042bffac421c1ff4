use core::{fmt, ops::Range};

use embedded_nal::nb::block;

use super::Read;
use crate::{
    budget::{Budget, BudgetConfig, ConfigError, Underflow},
    scalar::Scalar,
};

/// Buffered reader pulling fixed-size blocks out of a [`Read`] channel.
///
/// Bytes are fetched a whole buffer at a time and handed out from there, so many small reads cost a
/// single channel access. Requests at least as large as the buffer skip it and go straight from the
/// channel into the destination.
///
/// A constrained reader also tracks how many bytes may still be pulled from the channel. Any read
/// that can't be served within that budget fails before anything is copied, which is how truncated
/// input is caught before it reaches the caller.
pub struct BufReader<'a, R, B>
where
    R: Read,
    B: AsRef<[u8]> + AsMut<[u8]>,
{
    reader: &'a mut R,
    buf: B,
    filled: Range<usize>,
    budget: Option<Budget>,
}

impl<'a, R, B> BufReader<'a, R, B>
where
    R: Read,
    B: AsRef<[u8]> + AsMut<[u8]>,
{
    /// Unconstrained reader using `buf` as its buffer.
    pub fn new(reader: &'a mut R, buf: B) -> Self {
        Self::from_budget(reader, buf, None)
    }

    /// Reader allowed to pull at most `budget` bytes from the channel until raised.
    pub fn constrained(reader: &'a mut R, buf: B, budget: usize) -> Self {
        Self::from_budget(reader, buf, Some(Budget::new(budget)))
    }

    pub fn with_config(
        reader: &'a mut R,
        buf: B,
        config: BudgetConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self::from_budget(reader, buf, config.build()?))
    }

    fn from_budget(reader: &'a mut R, buf: B, budget: Option<Budget>) -> Self {
        Self {
            reader,
            buf,
            filled: 0..0,
            budget,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.as_ref().len()
    }

    /// Bytes already pulled from the channel and not read yet.
    pub fn buffered(&self) -> &[u8] {
        &self.buf.as_ref()[self.filled.clone()]
    }

    /// Bytes the channel may still deliver, or `None` for an unconstrained reader.
    pub fn num_bytes_remaining(&self) -> Option<usize> {
        self.budget.map(|budget| budget.remaining())
    }

    /// Allow `amt` more bytes to be pulled, e.g. after decoding a length prefix. No-op when
    /// unconstrained.
    pub fn increase_num_bytes_constraint(&mut self, amt: usize) {
        if let Some(budget) = &mut self.budget {
            budget.increase(amt);
        }
    }

    /// Give back the buffer along with the range of its unread bytes.
    pub fn into_parts(self) -> (B, Range<usize>) {
        (self.buf, self.filled)
    }

    /// Read one [`Scalar`] in native byte order.
    pub fn get<T: Scalar>(&mut self) -> Result<T, ReadError<R::Error>> {
        let mut bytes = T::Bytes::default();
        self.read(bytes.as_mut())?;
        Ok(T::from_bytes(bytes))
    }

    /// Fill the whole of `dest`.
    ///
    /// A short pull from the channel is fine as long as it covers what's missing from `dest`, so
    /// reading the last bytes of a stream never asks for more than the stream has.
    pub fn read(&mut self, dest: &mut [u8]) -> Result<(), ReadError<R::Error>> {
        if self.filled.len() >= dest.len() {
            dest.copy_from_slice(self.consume(dest.len()));
            return Ok(());
        }

        if let Some(budget) = &self.budget {
            if !budget.covers(self.filled.len(), dest.len()) {
                let available = self.filled.len().saturating_add(budget.remaining());
                tracing::warn!(requested = dest.len(), available, "read exceeds byte budget");
                return Err(ReadError::InsufficientData {
                    requested: dest.len(),
                    available,
                });
            }
        }

        let already_read = self.filled.len();
        let (head, tail) = dest.split_at_mut(already_read);
        head.copy_from_slice(self.consume(already_read));

        let to_read = tail.len();
        let capacity = self.capacity();

        if to_read >= capacity {
            tracing::trace!(amt = to_read, "reading past the buffer");
            let received = pull(&mut *self.reader, tail, &mut self.budget)?;
            if received < to_read {
                return Err(ReadError::UnexpectedEof {
                    needed: to_read,
                    received,
                });
            }
        } else {
            let request = self
                .budget
                .map_or(capacity, |budget| budget.remaining().min(capacity));
            tracing::trace!(request, needed = to_read, "refilling read buffer");

            let received = self.fill_buf(request)?;
            if received < to_read {
                self.filled = 0..0;
                return Err(ReadError::UnexpectedEof {
                    needed: to_read,
                    received,
                });
            }

            tail.copy_from_slice(&self.buf.as_ref()[..to_read]);
            self.filled = to_read..received;
        }

        Ok(())
    }

    /// Consume `amt` amount of bytes and return the consumed block.
    fn consume(&mut self, amt: usize) -> &[u8] {
        let consumed = &self.buf.as_ref()[self.filled.start..self.filled.start + amt];
        self.filled.start += amt;
        if self.filled.is_empty() {
            self.filled = 0..0
        }
        consumed
    }

    /// Refill the buffer from its start with up to `request` bytes, returning how many arrived.
    fn fill_buf(&mut self, request: usize) -> Result<usize, ReadError<R::Error>> {
        self.filled = 0..0;
        let buf = &mut self.buf.as_mut()[..request];
        let received = pull(&mut *self.reader, buf, &mut self.budget)?;
        self.filled = 0..received;
        Ok(received)
    }
}

/// Pull until `buffer` is full or the channel ends. Every byte received is charged to `budget`, also
/// when a later pull fails.
fn pull<R: Read>(
    reader: &mut R,
    buffer: &mut [u8],
    budget: &mut Option<Budget>,
) -> Result<usize, ReadError<R::Error>> {
    let mut received = 0;
    let result = loop {
        if received == buffer.len() {
            break Ok(());
        }
        match block!(reader.read(&mut buffer[received..])) {
            Ok(0) => break Ok(()),
            Ok(amt) => received += amt,
            Err(e) => break Err(ReadError::ReaderError(e)),
        }
    };

    if let Some(budget) = budget {
        budget.take(received)?;
    }
    result.map(|()| received)
}

#[derive(Debug, PartialEq)]
pub enum ReadError<E>
where
    E: fmt::Debug,
{
    ReaderError(E),
    /// The channel ended before delivering the bytes needed.
    UnexpectedEof { needed: usize, received: usize },
    /// The read asks for more than the byte budget allows. Nothing was consumed.
    InsufficientData { requested: usize, available: usize },
    BudgetUnderflow(Underflow),
}

impl<E> From<Underflow> for ReadError<E>
where
    E: fmt::Debug,
{
    fn from(value: Underflow) -> Self {
        Self::BudgetUnderflow(value)
    }
}

impl<E> fmt::Display for ReadError<E>
where
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReaderError(e) => write!(f, "read from channel failed: {:?}", e),
            Self::UnexpectedEof { needed, received } => write!(
                f,
                "channel ended after {} of {} needed bytes",
                received, needed
            ),
            Self::InsufficientData {
                requested,
                available,
            } => write!(
                f,
                "not enough bytes remaining to read the entire data: requested {}, {} available",
                requested, available
            ),
            Self::BudgetUnderflow(e) => write!(f, "{}", e),
        }
    }
}

impl<E> core::error::Error for ReadError<E> where E: fmt::Debug {}
