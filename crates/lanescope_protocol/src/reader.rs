//! # Byte Reader
//!
//! Bounds-checked little-endian cursor over a borrowed frame buffer.
//!
//! Every read either succeeds and advances, or fails with
//! [`WireError::UnexpectedEof`] and leaves the position untouched.

use crate::error::{WireError, WireResult};

/// Cursor over a frame buffer.
pub struct ByteReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader positioned at the start of `buffer`.
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Current read offset.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Returns the number of bytes remaining.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// True when every byte has been consumed.
    #[inline]
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    #[inline]
    fn ensure(&self, needed: usize) -> WireResult<()> {
        if needed > self.remaining() {
            return Err(WireError::UnexpectedEof {
                offset: self.position,
                needed,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    /// Borrows the next `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> WireResult<&'a [u8]> {
        self.ensure(len)?;
        let slice = &self.buffer[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    /// Reads a fixed-size byte array.
    #[inline]
    pub fn read_array<const N: usize>(&mut self) -> WireResult<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> WireResult<u8> {
        self.read_array::<1>().map(|b| b[0])
    }

    /// Reads a u16 in little-endian format.
    #[inline]
    pub fn read_u16(&mut self) -> WireResult<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    /// Reads a u32 in little-endian format.
    #[inline]
    pub fn read_u32(&mut self) -> WireResult<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    /// Reads a u64 in little-endian format.
    #[inline]
    pub fn read_u64(&mut self) -> WireResult<u64> {
        self.read_array().map(u64::from_le_bytes)
    }

    /// Reads a f32 in little-endian format.
    #[inline]
    pub fn read_f32(&mut self) -> WireResult<f32> {
        self.read_array().map(f32::from_le_bytes)
    }

    /// Reads a f64 in little-endian format.
    #[inline]
    pub fn read_f64(&mut self) -> WireResult<f64> {
        self.read_array().map(f64::from_le_bytes)
    }

    /// Reads three consecutive f32 values.
    pub fn read_vec3(&mut self) -> WireResult<[f32; 3]> {
        self.ensure(12)?;
        Ok([self.read_f32()?, self.read_f32()?, self.read_f32()?])
    }

    /// Reads a `u16`-length-prefixed UTF-8 string capped at `limit` bytes.
    ///
    /// An over-long string is rejected. If its declared bytes are present they
    /// are skipped so the cursor stays aligned with the next field; nothing
    /// past the end of the buffer is ever touched.
    pub fn read_string(&mut self, limit: usize) -> WireResult<String> {
        let prefix_offset = self.position;
        let len = usize::from(self.read_u16()?);
        if len > limit {
            if len <= self.remaining() {
                self.position += len;
            }
            return Err(WireError::StringTooLong {
                offset: prefix_offset,
                len,
                limit,
            });
        }
        let data_offset = self.position;
        let bytes = match self.read_bytes(len) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.position = prefix_offset;
                return Err(e);
            }
        };
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| WireError::InvalidUtf8 {
                offset: data_offset,
            })
    }

    /// Rejects a declared element count that cannot fit in the remaining
    /// bytes, given the minimum encoded size of one element.
    pub fn check_count(&self, what: &'static str, count: u64, min_element_size: usize) -> WireResult<()> {
        let remaining = self.remaining();
        let fits = usize::try_from(count)
            .ok()
            .and_then(|c| c.checked_mul(min_element_size))
            .is_some_and(|needed| needed <= remaining);
        if fits {
            Ok(())
        } else {
            Err(WireError::CountExceedsBuffer {
                what,
                count,
                remaining,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_primitives_little_endian() {
        let mut data = Vec::new();
        data.push(7u8);
        data.extend_from_slice(&0x1234u16.to_le_bytes());
        data.extend_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        data.extend_from_slice(&42u64.to_le_bytes());
        data.extend_from_slice(&1.5f32.to_le_bytes());
        data.extend_from_slice(&(-2.25f64).to_le_bytes());

        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_u8().unwrap(), 7);
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(reader.read_u64().unwrap(), 42);
        assert_eq!(reader.read_f32().unwrap(), 1.5);
        assert_eq!(reader.read_f64().unwrap(), -2.25);
        assert!(reader.is_exhausted());
    }

    #[test]
    fn test_eof_does_not_advance() {
        let data = [1u8, 2, 3];
        let mut reader = ByteReader::new(&data);
        let err = reader.read_u32().unwrap_err();
        assert_eq!(
            err,
            WireError::UnexpectedEof {
                offset: 0,
                needed: 4,
                remaining: 3
            }
        );
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_read_string() {
        let mut data = Vec::new();
        data.extend_from_slice(&5u16.to_le_bytes());
        data.extend_from_slice(b"lanes");
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_string(10_000).unwrap(), "lanes");
    }

    #[test]
    fn test_oversized_string_rejected_without_overread() {
        // Claims 50000 bytes, only 4 follow.
        let mut data = Vec::new();
        data.extend_from_slice(&50_000u16.to_le_bytes());
        data.extend_from_slice(b"abcd");
        let mut reader = ByteReader::new(&data);
        let err = reader.read_string(10_000).unwrap_err();
        assert!(matches!(err, WireError::StringTooLong { len: 50_000, .. }));
        assert!(reader.position() <= data.len());
    }

    #[test]
    fn test_truncated_string_restores_position() {
        let mut data = Vec::new();
        data.extend_from_slice(&8u16.to_le_bytes());
        data.extend_from_slice(b"abc");
        let mut reader = ByteReader::new(&data);
        assert!(matches!(
            reader.read_string(10_000),
            Err(WireError::UnexpectedEof { .. })
        ));
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_invalid_utf8() {
        let data = [2u8, 0, 0xFF, 0xFE];
        let mut reader = ByteReader::new(&data);
        assert_eq!(
            reader.read_string(10_000),
            Err(WireError::InvalidUtf8 { offset: 2 })
        );
    }

    #[test]
    fn test_check_count() {
        let data = [0u8; 24];
        let reader = ByteReader::new(&data);
        assert!(reader.check_count("layer", 2, 12).is_ok());
        assert!(reader.check_count("layer", 3, 12).is_err());
        assert!(reader.check_count("layer", u64::MAX, 12).is_err());
    }
}
