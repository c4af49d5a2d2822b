//! Big-endian cursors over class file bytes.

use crate::classfile::errors::{ClassFileResult, MalformedInputError};

#[derive(Debug, Clone)]
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn offset(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn bytes(&mut self, len: usize) -> ClassFileResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(MalformedInputError::Truncated {
                offset: self.pos,
                needed: len - self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub(crate) fn skip(&mut self, len: usize) -> ClassFileResult<()> {
        self.bytes(len).map(|_| ())
    }

    fn array<const N: usize>(&mut self) -> ClassFileResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> ClassFileResult<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub(crate) fn i8(&mut self) -> ClassFileResult<i8> {
        Ok(self.u8()? as i8)
    }

    pub(crate) fn u16(&mut self) -> ClassFileResult<u16> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub(crate) fn i16(&mut self) -> ClassFileResult<i16> {
        Ok(i16::from_be_bytes(self.array()?))
    }

    pub(crate) fn u32(&mut self) -> ClassFileResult<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    pub(crate) fn i32(&mut self) -> ClassFileResult<i32> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    pub(crate) fn u64(&mut self) -> ClassFileResult<u64> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    /// Fails unless every byte has been consumed.
    pub(crate) fn finish(&self, context: &'static str) -> ClassFileResult<()> {
        match self.remaining() {
            0 => Ok(()),
            count => Err(MalformedInputError::TrailingBytes { context, count }),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub(crate) struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub(crate) fn u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub(crate) fn i16(&mut self, value: i16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub(crate) fn u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub(crate) fn i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub(crate) fn u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub(crate) fn bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Writes a `u16` count, rejecting counts the format cannot express.
    pub(crate) fn count(&mut self, what: &'static str, count: usize) -> ClassFileResult<()> {
        let value =
            u16::try_from(count).map_err(|_| MalformedInputError::TooMany { what, count })?;
        self.u16(value);
        Ok(())
    }

    /// Writes a nested block prefixed by its `u32` length.
    pub(crate) fn length_prefixed(&mut self, block: ByteWriter) -> ClassFileResult<()> {
        let len = u32::try_from(block.len()).map_err(|_| MalformedInputError::TooMany {
            what: "attribute byte",
            count: block.len(),
        })?;
        self.u32(len);
        self.buf.extend_from_slice(&block.buf);
        Ok(())
    }

    pub(crate) fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}
