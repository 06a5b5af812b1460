//! Little-endian payload encoding primitives.
//!
//! Variable-length data is a `u32` count followed by the elements.

use crate::models::error::CaptureError;

use super::marshal::Marshal;

/// Growable output buffer for one chunk payload.
#[derive(Debug, Default, Clone)]
pub struct PayloadWriter {
    buf: Vec<u8>,
}

impl PayloadWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(value as u8);
    }

    /// Element count prefix for a variable-length sequence.
    ///
    /// Sequences longer than `u32::MAX` cannot come out of the API, whose
    /// own count fields are 32-bit.
    pub fn write_count(&mut self, count: usize) {
        self.write_u32(count as u32);
    }

    /// Length-prefixed raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_count(bytes.len());
        self.buf.extend_from_slice(bytes);
    }

    /// Length-prefixed UTF-8.
    pub fn write_str(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    pub fn put<T: Marshal>(&mut self, value: &T) {
        value.encode(self);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Bounds-checked cursor over an encoded payload.
///
/// Every read fails with `MalformedPayload` instead of reading past the end.
#[derive(Debug, Clone)]
pub struct PayloadReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Fail unless at least `len` bytes remain.
    pub fn require(&self, len: usize, what: &str) -> Result<(), CaptureError> {
        if self.remaining() < len {
            return Err(CaptureError::malformed(format!(
                "{} needs {} bytes, {} remain at offset {}",
                what,
                len,
                self.remaining(),
                self.pos
            )));
        }
        Ok(())
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8], CaptureError> {
        self.require(len, "read")?;
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], CaptureError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CaptureError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, CaptureError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CaptureError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, CaptureError> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, CaptureError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, CaptureError> {
        Ok(f32::from_le_bytes(self.take_array()?))
    }

    pub fn read_bool(&mut self) -> Result<bool, CaptureError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CaptureError::malformed(format!("invalid bool byte {}", other))),
        }
    }

    /// Read a count prefix whose elements each need at least
    /// `min_element_size` bytes, rejecting counts the buffer cannot hold.
    pub fn read_count(&mut self, min_element_size: usize) -> Result<usize, CaptureError> {
        let count = self.read_u32()? as usize;
        let needed = count.saturating_mul(min_element_size.max(1));
        if needed > self.remaining() {
            return Err(CaptureError::malformed(format!(
                "count {} implies at least {} bytes, {} remain",
                count,
                needed,
                self.remaining()
            )));
        }
        Ok(count)
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>, CaptureError> {
        let len = self.read_count(1)?;
        Ok(self.take(len)?.to_vec())
    }

    pub fn read_string(&mut self) -> Result<String, CaptureError> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|e| CaptureError::malformed(format!("invalid utf-8: {}", e)))
    }

    pub fn get<T: Marshal>(&mut self) -> Result<T, CaptureError> {
        T::decode(self)
    }

    /// Fail if anything is left unread.
    pub fn finish(&self) -> Result<(), CaptureError> {
        if self.remaining() != 0 {
            return Err(CaptureError::malformed(format!(
                "{} trailing bytes after offset {}",
                self.remaining(),
                self.pos
            )));
        }
        Ok(())
    }
}
