//! Fixed-width primitive codecs.
//!
//! Values are written little endian at a byte offset inside a frame's
//! content. Offsets are `const` running sums of the widths below, starting
//! at a header size constant:
//!
//! ```
//! use gridwire::codec::fixed_size::{BOOLEAN_SIZE_IN_BYTES, INT_SIZE_IN_BYTES};
//! use gridwire::protocol::REQUEST_HEADER_SIZE;
//!
//! const REPLICA_COUNT_OFFSET: usize = REQUEST_HEADER_SIZE;
//! const ENABLED_OFFSET: usize = REPLICA_COUNT_OFFSET + INT_SIZE_IN_BYTES;
//! const INITIAL_FRAME_SIZE: usize = ENABLED_OFFSET + BOOLEAN_SIZE_IN_BYTES;
//! assert_eq!(INITIAL_FRAME_SIZE, 21);
//! ```
//!
//! Encoders write into buffers sized from those same constants and panic on
//! a short buffer (a codec bug). Decoders read untrusted bytes and return
//! [`DecodeError::FrameTooShort`] instead.

use crate::error::DecodeError;

/// Width of a byte.
pub const BYTE_SIZE_IN_BYTES: usize = 1;
/// Width of a boolean.
pub const BOOLEAN_SIZE_IN_BYTES: usize = 1;
/// Width of a short.
pub const SHORT_SIZE_IN_BYTES: usize = 2;
/// Width of an int.
pub const INT_SIZE_IN_BYTES: usize = 4;
/// Width of a long.
pub const LONG_SIZE_IN_BYTES: usize = 8;
/// Width of a nullable UUID: null flag plus two longs.
pub const UUID_SIZE_IN_BYTES: usize = BOOLEAN_SIZE_IN_BYTES + 2 * LONG_SIZE_IN_BYTES;

#[inline]
fn field<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N], DecodeError> {
    buf.get(offset..offset + N)
        .and_then(|s| s.try_into().ok())
        .ok_or(DecodeError::FrameTooShort {
            offset,
            needed: N,
            len: buf.len(),
        })
}

/// Write a byte at `offset`.
#[inline]
pub fn encode_byte(buf: &mut [u8], offset: usize, value: u8) {
    buf[offset] = value;
}

/// Read a byte at `offset`.
#[inline]
pub fn decode_byte(buf: &[u8], offset: usize) -> Result<u8, DecodeError> {
    Ok(field::<1>(buf, offset)?[0])
}

/// Write a boolean at `offset` (1 = true, 0 = false).
#[inline]
pub fn encode_boolean(buf: &mut [u8], offset: usize, value: bool) {
    buf[offset] = u8::from(value);
}

/// Read a boolean at `offset`. Any non-zero byte is `true`.
#[inline]
pub fn decode_boolean(buf: &[u8], offset: usize) -> Result<bool, DecodeError> {
    Ok(decode_byte(buf, offset)? != 0)
}

/// Write a short at `offset`.
#[inline]
pub fn encode_short(buf: &mut [u8], offset: usize, value: i16) {
    buf[offset..offset + SHORT_SIZE_IN_BYTES].copy_from_slice(&value.to_le_bytes());
}

/// Read a short at `offset`.
#[inline]
pub fn decode_short(buf: &[u8], offset: usize) -> Result<i16, DecodeError> {
    Ok(i16::from_le_bytes(field(buf, offset)?))
}

/// Write an int at `offset`.
#[inline]
pub fn encode_int(buf: &mut [u8], offset: usize, value: i32) {
    buf[offset..offset + INT_SIZE_IN_BYTES].copy_from_slice(&value.to_le_bytes());
}

/// Read an int at `offset`.
#[inline]
pub fn decode_int(buf: &[u8], offset: usize) -> Result<i32, DecodeError> {
    Ok(i32::from_le_bytes(field(buf, offset)?))
}

/// Write a long at `offset`.
#[inline]
pub fn encode_long(buf: &mut [u8], offset: usize, value: i64) {
    buf[offset..offset + LONG_SIZE_IN_BYTES].copy_from_slice(&value.to_le_bytes());
}

/// Read a long at `offset`.
#[inline]
pub fn decode_long(buf: &[u8], offset: usize) -> Result<i64, DecodeError> {
    Ok(i64::from_le_bytes(field(buf, offset)?))
}

/// Write a nullable UUID at `offset`: null flag, most significant long,
/// least significant long.
pub fn encode_uuid(buf: &mut [u8], offset: usize, value: Option<u128>) {
    encode_boolean(buf, offset, value.is_none());
    let value = value.unwrap_or_default();
    let offset = offset + BOOLEAN_SIZE_IN_BYTES;
    encode_long(buf, offset, (value >> 64) as i64);
    encode_long(buf, offset + LONG_SIZE_IN_BYTES, value as i64);
}

/// Read a nullable UUID at `offset`.
pub fn decode_uuid(buf: &[u8], offset: usize) -> Result<Option<u128>, DecodeError> {
    // Bounds first, so a short frame is reported even for a null UUID.
    field::<UUID_SIZE_IN_BYTES>(buf, offset)?;
    if decode_boolean(buf, offset)? {
        return Ok(None);
    }
    let offset = offset + BOOLEAN_SIZE_IN_BYTES;
    let most = decode_long(buf, offset)? as u64 as u128;
    let least = decode_long(buf, offset + LONG_SIZE_IN_BYTES)? as u64 as u128;
    Ok(Some((most << 64) | least))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_little_endian_layout() {
        let mut buf = [0u8; 8];
        encode_int(&mut buf, 2, 0x0102_0304);
        assert_eq!(&buf[2..6], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(decode_int(&buf, 2).unwrap(), 0x0102_0304);
    }

    #[test]
    fn test_boundary_values() {
        let mut buf = [0u8; 8];
        for value in [0i64, -1, i64::MIN, i64::MAX] {
            encode_long(&mut buf, 0, value);
            assert_eq!(decode_long(&buf, 0).unwrap(), value);
        }
        for value in [0i32, -1, i32::MIN, i32::MAX] {
            encode_int(&mut buf, 4, value);
            assert_eq!(decode_int(&buf, 4).unwrap(), value);
        }
        for value in [0i16, -1, i16::MIN, i16::MAX] {
            encode_short(&mut buf, 6, value);
            assert_eq!(decode_short(&buf, 6).unwrap(), value);
        }
    }

    #[test]
    fn test_boolean() {
        let mut buf = [0u8; 2];
        encode_boolean(&mut buf, 1, true);
        assert_eq!(buf, [0, 1]);
        assert!(decode_boolean(&buf, 1).unwrap());
        assert!(!decode_boolean(&buf, 0).unwrap());
    }

    #[test]
    fn test_uuid_null_and_value() {
        let mut buf = [0u8; UUID_SIZE_IN_BYTES];
        encode_uuid(&mut buf, 0, None);
        assert_eq!(decode_uuid(&buf, 0).unwrap(), None);

        let id = 0xDEAD_BEEF_0000_0001_8000_0000_0000_00FFu128;
        encode_uuid(&mut buf, 0, Some(id));
        assert_eq!(decode_uuid(&buf, 0).unwrap(), Some(id));
    }

    #[test]
    fn test_decode_past_end_is_frame_too_short() {
        let buf = [0u8; 13];
        let err = decode_int(&buf, 12).unwrap_err();
        assert_eq!(
            err,
            DecodeError::FrameTooShort {
                offset: 12,
                needed: 4,
                len: 13
            }
        );
        assert!(decode_long(&buf, 8).is_err());
        assert!(decode_byte(&buf, 13).is_err());
        assert!(decode_uuid(&buf, 0).is_err());
    }
}
