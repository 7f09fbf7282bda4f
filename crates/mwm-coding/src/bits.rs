use crate::error::{CodingError, Result};

/// Sub-byte reader over an immutable slice.
///
/// Bits are consumed least-significant first within each byte; the cursor
/// moves to the next byte once all 8 bits of the current one are used.
/// A value may straddle a byte boundary.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    byte: usize,
    bit: u8,
}

impl<'a> BitReader<'a> {
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte: 0,
            bit: 0,
        }
    }

    /// Reader starting at byte `byte` of `data`.
    #[inline]
    pub fn at(data: &'a [u8], byte: usize) -> Self {
        Self { data, byte, bit: 0 }
    }

    /// Reads `count` (1..=8) bits.
    pub fn read_bits(&mut self, count: u8) -> Result<u8> {
        debug_assert!((1..=8).contains(&count), "bit count {count}");

        let mut v: u16 = 0;
        let mut got = 0u8;
        while got < count {
            let byte = *self.data.get(self.byte).ok_or_else(|| {
                CodingError::UnexpectedEof(format!("bits at byte {}", self.byte))
            })?;

            let take = (8 - self.bit).min(count - got);
            let bits = ((byte >> self.bit) as u16) & ((1u16 << take) - 1);
            v |= bits << got;

            got += take;
            self.bit += take;
            if self.bit == 8 {
                self.byte += 1;
                self.bit = 0;
            }
        }
        Ok(v as u8)
    }

    /// Skips the unread remainder of a partially consumed byte and returns
    /// the byte position the next byte-oriented read starts at.
    #[inline]
    pub fn align_to_byte(&mut self) -> usize {
        if self.bit > 0 {
            self.byte += 1;
            self.bit = 0;
        }
        self.byte
    }

    #[inline]
    pub fn byte_pos(&self) -> usize {
        self.byte
    }
}

/// Writer counterpart of [`BitReader`], appending into a byte buffer.
pub struct BitWriter<'a> {
    out: &'a mut Vec<u8>,
    bit: u8,
}

impl<'a> BitWriter<'a> {
    pub fn new(out: &'a mut Vec<u8>) -> Self {
        Self { out, bit: 0 }
    }

    pub fn write_bits(&mut self, v: u8, count: u8) {
        debug_assert!((1..=8).contains(&count), "bit count {count}");
        debug_assert!(count == 8 || v < (1 << count), "{v} does not fit {count} bits");

        let mut left = count;
        let mut v = v as u16;
        while left > 0 {
            if self.bit == 0 {
                self.out.push(0);
            }
            let take = (8 - self.bit).min(left);
            let chunk = (v & ((1u16 << take) - 1)) as u8;
            if let Some(last) = self.out.last_mut() {
                *last |= chunk << self.bit;
            }
            v >>= take;
            left -= take;
            self.bit = (self.bit + take) % 8;
        }
    }
}
