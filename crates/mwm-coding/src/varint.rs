use crate::error::{CodingError, Result};

const MAX_UVARINT_LEN_64: usize = 10;
const MAX_UVARINT_LEN_32: usize = 5;

/// Decodes a LEB128 unsigned varint from the front of `buf`.
/// Returns the value and the number of bytes consumed.
pub fn read_var_u64(buf: &[u8]) -> Result<(u64, usize)> {
    let mut x: u64 = 0;
    let mut shift: u32 = 0;

    for (i, &byte) in buf.iter().enumerate() {
        if i >= MAX_UVARINT_LEN_64 {
            return Err(CodingError::VarintOverflow("uvarint overflow".to_string()));
        }

        if byte < 0x80 {
            if i == MAX_UVARINT_LEN_64 - 1 && byte > 1 {
                return Err(CodingError::VarintOverflow("uvarint overflow".to_string()));
            }
            x |= (byte as u64) << shift;
            return Ok((x, i + 1));
        }

        x |= ((byte & 0x7f) as u64) << shift;
        shift += 7;
    }

    Err(CodingError::UnexpectedEof(
        "EOF while reading uvarint".to_string(),
    ))
}

/// Same as [`read_var_u64`] but rejects values that do not fit 32 bits.
pub fn read_var_u32(buf: &[u8]) -> Result<(u32, usize)> {
    let (v, n) = read_var_u64(buf)?;
    if n > MAX_UVARINT_LEN_32 || v > u32::MAX as u64 {
        return Err(CodingError::VarintOverflow(format!("{v} does not fit u32")));
    }
    Ok((v as u32, n))
}

#[inline]
pub fn write_var_u64(out: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        out.push((v as u8) | 0x80);
        v >>= 7;
    }
    out.push(v as u8);
}

#[inline]
pub fn write_var_u32(out: &mut Vec<u8>, v: u32) {
    write_var_u64(out, v as u64)
}

#[inline(always)]
pub const fn zigzag_encode(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

#[inline(always)]
pub const fn zigzag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn small_values_take_one_byte() {
        let mut out = Vec::new();
        write_var_u32(&mut out, 127);
        assert_eq!(out, vec![0x7f]);
        assert_eq!(read_var_u32(&out).unwrap(), (127, 1));
    }

    #[test]
    fn truncated_varint_is_eof() {
        let err = read_var_u64(&[0x80, 0x80]).unwrap_err();
        assert!(matches!(err, CodingError::UnexpectedEof(_)));
    }

    #[test]
    fn overlong_u32_is_rejected() {
        let mut out = Vec::new();
        write_var_u64(&mut out, u32::MAX as u64 + 1);
        assert!(matches!(
            read_var_u32(&out),
            Err(CodingError::VarintOverflow(_))
        ));
    }

    #[test]
    fn eleven_byte_varint_overflows() {
        let buf = [0xffu8; 11];
        assert!(matches!(
            read_var_u64(&buf),
            Err(CodingError::VarintOverflow(_))
        ));
    }

    proptest! {
        #[test]
        fn var_u64_survives_encoding(v in any::<u64>()) {
            let mut out = Vec::new();
            write_var_u64(&mut out, v);
            prop_assert_eq!(read_var_u64(&out).unwrap(), (v, out.len()));
        }

        #[test]
        fn zigzag_is_reversible(v in any::<i64>()) {
            prop_assert_eq!(zigzag_decode(zigzag_encode(v)), v);
        }
    }
}
