use crate::error::{BinaryError, Result};

/// Growable in-memory byte buffer with a read cursor.
///
/// Writes always append at the end of the buffer. Reads start at the cursor and advance
/// it. All multi-byte values are little-endian.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryStream {
    buf: Vec<u8>,
    pos: usize,
}

impl BinaryStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an existing byte sequence for reading, cursor at 0.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            buf: bytes.into(),
            pos: 0,
        }
    }

    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn seek_to(&mut self, pos: usize) {
        self.pos = pos.min(self.buf.len());
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.buf.truncate(len);
        self.pos = self.pos.min(len);
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    /// Append `bytes` as-is, without a length prefix.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write `bytes` behind a u16 length prefix. Nothing is written if it does not fit.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let len: u16 = bytes
            .len()
            .try_into()
            .map_err(|_| BinaryError::Truncation { len: bytes.len() })?;
        self.write_u16(len);
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    pub fn write_string(&mut self, s: &str) -> Result<()> {
        self.write_bytes(s.as_bytes())
    }

    fn take(&mut self, needed: usize) -> Result<&[u8]> {
        let remaining = self.remaining();
        if remaining < needed {
            return Err(BinaryError::Underflow { needed, remaining });
        }
        let start = self.pos;
        self.pos += needed;
        Ok(&self.buf[start..start + needed])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.take_array().map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.take_array().map(u32::from_le_bytes)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.take_array().map(i32::from_le_bytes)
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.take_array().map(f64::from_le_bytes)
    }

    /// Strict boolean: any byte other than 0 or 1 is corrupt.
    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(BinaryError::Corrupt("boolean byte is neither 0 nor 1")),
        }
    }

    /// Read exactly `len` bytes that carry no length prefix.
    pub fn read_raw(&mut self, len: usize) -> Result<&[u8]> {
        self.take(len)
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = usize::from(self.read_u16()?);
        Ok(self.take(len)?.to_vec())
    }

    pub fn read_string(&mut self) -> Result<String> {
        String::from_utf8(self.read_bytes()?).map_err(|_| BinaryError::InvalidUtf8)
    }
}
