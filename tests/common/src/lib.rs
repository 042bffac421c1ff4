use bufio_nal::io::{BufReader, BufWriter, Read, ReadError, Write, WriteError};
use embedded_nal::nb;
use proptest::prelude::*;

/// Failure injected by [`ScriptedChannel`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelFault;

/// In-memory channel with a configurable personality: it can move at most `chunk` bytes per call,
/// answer every other call with `WouldBlock`, and fail once a number of bytes went through.
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    data: Vec<u8>,
    read_pos: usize,
    chunk: Option<usize>,
    stall: bool,
    stalled: bool,
    fail_after: Option<usize>,
    moved: usize,
    pub pulls: Vec<usize>,
    pub pushes: Vec<usize>,
    pub flushes: usize,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    pub fn chunked(mut self, chunk: usize) -> Self {
        self.chunk = Some(chunk.max(1));
        self
    }

    pub fn stalling(mut self) -> Self {
        self.stall = true;
        self
    }

    pub fn failing_after(mut self, bytes: usize) -> Self {
        self.fail_after = Some(bytes);
        self
    }

    /// Every byte written to or preloaded into the channel.
    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    pub fn unread(&self) -> &[u8] {
        &self.data[self.read_pos..]
    }

    fn poll_ready(&mut self) -> nb::Result<(), ChannelFault> {
        if self.stall {
            self.stalled = !self.stalled;
            if self.stalled {
                return Err(nb::Error::WouldBlock);
            }
        }
        Ok(())
    }

    /// How much of `want` bytes the channel lets through on this call.
    fn allowance(&self, want: usize) -> nb::Result<usize, ChannelFault> {
        if want == 0 {
            return Ok(0);
        }
        let mut amt = want.min(self.chunk.unwrap_or(usize::MAX));
        if let Some(limit) = self.fail_after {
            if self.moved >= limit {
                return Err(nb::Error::Other(ChannelFault));
            }
            amt = amt.min(limit - self.moved);
        }
        Ok(amt)
    }
}

impl Read for ScriptedChannel {
    type Error = ChannelFault;

    fn read(&mut self, buffer: &mut [u8]) -> nb::Result<usize, Self::Error> {
        self.pulls.push(buffer.len());
        self.poll_ready()?;

        let amt = self.allowance(buffer.len().min(self.unread().len()))?;
        buffer[..amt].copy_from_slice(&self.data[self.read_pos..self.read_pos + amt]);
        self.read_pos += amt;
        self.moved += amt;
        Ok(amt)
    }
}

impl Write for ScriptedChannel {
    type Error = ChannelFault;

    fn write(&mut self, buffer: &[u8]) -> nb::Result<usize, Self::Error> {
        self.pushes.push(buffer.len());
        self.poll_ready()?;

        let amt = self.allowance(buffer.len())?;
        self.data.extend_from_slice(&buffer[..amt]);
        self.moved += amt;
        Ok(amt)
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        self.flushes += 1;
        Ok(())
    }
}

/// One value sent through the adapters, read back with the same type and size.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    U8(u8),
    U16(u16),
    I32(i32),
    Usize(usize),
    I64(i64),
    /// Bit pattern of an `f64`, so NaNs still compare equal.
    F64(u64),
    Block(Vec<u8>),
}

impl Op {
    pub fn len(&self) -> usize {
        match self {
            Self::U8(_) => 1,
            Self::U16(_) => 2,
            Self::I32(_) => 4,
            Self::Usize(_) => core::mem::size_of::<usize>(),
            Self::I64(_) | Self::F64(_) => 8,
            Self::Block(block) => block.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn write_to<W, B>(
        &self,
        writer: &mut BufWriter<'_, W, B>,
    ) -> Result<(), WriteError<W::Error>>
    where
        W: Write,
        B: AsRef<[u8]> + AsMut<[u8]>,
    {
        match self {
            Self::U8(v) => writer.put(*v),
            Self::U16(v) => writer.put(*v),
            Self::I32(v) => writer.put(*v),
            Self::Usize(v) => writer.put(*v),
            Self::I64(v) => writer.put(*v),
            Self::F64(bits) => writer.put(f64::from_bits(*bits)),
            Self::Block(block) => writer.write(block),
        }
    }

    /// Read a value shaped like `self` back from `reader`.
    pub fn read_from<R, B>(
        &self,
        reader: &mut BufReader<'_, R, B>,
    ) -> Result<Op, ReadError<R::Error>>
    where
        R: Read,
        B: AsRef<[u8]> + AsMut<[u8]>,
    {
        Ok(match self {
            Self::U8(_) => Self::U8(reader.get()?),
            Self::U16(_) => Self::U16(reader.get()?),
            Self::I32(_) => Self::I32(reader.get()?),
            Self::Usize(_) => Self::Usize(reader.get()?),
            Self::I64(_) => Self::I64(reader.get()?),
            Self::F64(_) => Self::F64(reader.get::<f64>()?.to_bits()),
            Self::Block(block) => {
                let mut read = vec![0; block.len()];
                reader.read(&mut read)?;
                Self::Block(read)
            }
        })
    }
}

pub fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<u8>().prop_map(Op::U8),
        any::<u16>().prop_map(Op::U16),
        any::<i32>().prop_map(Op::I32),
        any::<usize>().prop_map(Op::Usize),
        any::<i64>().prop_map(Op::I64),
        any::<u64>().prop_map(Op::F64),
        proptest::collection::vec(any::<u8>(), 0..48).prop_map(Op::Block),
    ]
}

/// Deterministic payload of `len` bytes.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}
