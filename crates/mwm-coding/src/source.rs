use crate::error::{CodingError, Result};
use crate::varint;

/// Forward-only cursor over an immutable byte slice.
#[derive(Debug, Clone)]
pub struct ArraySource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ArraySource<'a> {
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Cursor positioned at `pos`; fails if `pos` is past the end.
    #[inline]
    pub fn at(data: &'a [u8], pos: usize) -> Result<Self> {
        if pos > data.len() {
            return Err(CodingError::UnexpectedEof(format!(
                "offset {pos} past end of {} bytes",
                data.len()
            )));
        }
        Ok(Self { data, pos })
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    #[inline]
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| CodingError::UnexpectedEof(format!("u8 at {}", self.pos)))?;
        self.pos += 1;
        Ok(b)
    }

    #[inline]
    pub fn read_i8(&mut self) -> Result<i8> {
        self.read_u8().map(|b| b as i8)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                CodingError::UnexpectedEof(format!("{n} bytes at {}", self.pos))
            })?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    #[inline]
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        let b = self.read_bytes(8)?;
        let mut a = [0u8; 8];
        a.copy_from_slice(b);
        Ok(u64::from_le_bytes(a))
    }

    #[inline]
    pub fn read_var_u32(&mut self) -> Result<u32> {
        let (v, n) = varint::read_var_u32(self.remaining())?;
        self.pos += n;
        Ok(v)
    }

    #[inline]
    pub fn read_var_u64(&mut self) -> Result<u64> {
        let (v, n) = varint::read_var_u64(self.remaining())?;
        self.pos += n;
        Ok(v)
    }

    /// Varint length followed by that many UTF-8 bytes.
    pub fn read_string(&mut self) -> Result<&'a str> {
        let len = self.read_var_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes)
            .map_err(|e| CodingError::InvalidData(format!("string at {}: {e}", self.pos)))
    }
}

/// Counterpart of [`ArraySource::read_string`].
pub fn write_string(out: &mut Vec<u8>, s: &str) {
    varint::write_var_u32(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}
