//! Zig-zag and LEB128 variable-length integers.

use kwire_core::DecodingError;

/// Longest encoding of a 64-bit varint.
pub const MAX_VARINT_LEN: usize = 10;

pub fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

pub fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Number of bytes `value` occupies as an unsigned varint.
pub fn uvarint_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Number of bytes `value` occupies as a zig-zag varint.
pub fn varint_len(value: i64) -> usize {
    uvarint_len(zigzag(value))
}

/// Encode `value` into `buf`, returning the number of bytes used.
pub fn put_uvarint(buf: &mut [u8; MAX_VARINT_LEN], mut value: u64) -> usize {
    let mut i = 0;
    while value >= 0x80 {
        buf[i] = (value as u8) | 0x80;
        value >>= 7;
        i += 1;
    }
    buf[i] = value as u8;
    i + 1
}

/// Decode an unsigned varint from the front of `buf`.
///
/// Returns the value and the number of bytes consumed.
pub fn read_uvarint(buf: &[u8]) -> Result<(u64, usize), DecodingError> {
    let mut value = 0u64;
    for (i, &byte) in buf.iter().enumerate().take(MAX_VARINT_LEN) {
        if i == MAX_VARINT_LEN - 1 && byte > 1 {
            return Err(DecodingError::VarintOverflow);
        }
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }

    if buf.len() >= MAX_VARINT_LEN {
        Err(DecodingError::VarintOverflow)
    } else {
        Err(DecodingError::insufficient(buf.len() + 1, buf.len()))
    }
}

/// Decode a zig-zag varint from the front of `buf`.
pub fn read_varint(buf: &[u8]) -> Result<(i64, usize), DecodingError> {
    let (value, len) = read_uvarint(buf)?;
    Ok((unzigzag(value), len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zigzag() {
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(-1), 1);
        assert_eq!(zigzag(1), 2);
        assert_eq!(zigzag(-2), 3);
        assert_eq!(zigzag(i64::MAX), u64::MAX - 1);
        assert_eq!(zigzag(i64::MIN), u64::MAX);

        for value in [0, 1, -1, 63, -64, 300, i64::MAX, i64::MIN] {
            assert_eq!(unzigzag(zigzag(value)), value);
        }
    }

    #[test]
    fn test_uvarint_len() {
        assert_eq!(uvarint_len(0), 1);
        assert_eq!(uvarint_len(127), 1);
        assert_eq!(uvarint_len(128), 2);
        assert_eq!(uvarint_len(16_383), 2);
        assert_eq!(uvarint_len(16_384), 3);
        assert_eq!(uvarint_len(u64::MAX), MAX_VARINT_LEN);
        assert_eq!(varint_len(-1), 1);
        assert_eq!(varint_len(i64::MIN), MAX_VARINT_LEN);
    }

    #[test]
    fn test_put_uvarint() {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let len = put_uvarint(&mut buf, 300);
        assert_eq!(&buf[..len], &[0xac, 0x02]);

        let len = put_uvarint(&mut buf, u64::MAX);
        assert_eq!(len, MAX_VARINT_LEN);
        assert_eq!(buf[9], 0x01);
    }

    #[test]
    fn test_read_uvarint() {
        assert_eq!(read_uvarint(&[0xac, 0x02, 0xff]).unwrap(), (300, 2));
        assert_eq!(read_varint(&[0x01]).unwrap(), (-1, 1));
    }

    #[test]
    fn test_read_uvarint_truncated() {
        assert_eq!(
            read_uvarint(&[0x80, 0x80]),
            Err(DecodingError::insufficient(3, 2))
        );
        assert_eq!(read_uvarint(&[]), Err(DecodingError::insufficient(1, 0)));
    }

    #[test]
    fn test_read_uvarint_overflow() {
        let too_long = [0xff; 11];
        assert_eq!(read_uvarint(&too_long), Err(DecodingError::VarintOverflow));

        let mut tenth_byte_too_big = [0xff; 10];
        tenth_byte_too_big[9] = 0x02;
        assert_eq!(
            read_uvarint(&tenth_byte_too_big),
            Err(DecodingError::VarintOverflow)
        );
    }
}
