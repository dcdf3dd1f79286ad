//! # Geometry Sub-decoder
//!
//! Decodes the point list trailing every object.
//!
//! ## Layout
//!
//! ```text
//! ┌────────┬─────────┬──────────────┬────────────────┬──────────────────┐
//! │ fmt u8 │ cnt u32 │ raw_len u32  │ packed_len u32 │ packed bytes ... │
//! └────────┴─────────┴──────────────┴────────────────┴──────────────────┘
//! ```
//!
//! `raw_len` is advisory and only sizes the output allocation (capped).
//! The packed bytes are zlib, or raw deflate from older producers. A blob
//! that inflates with neither framing yields an empty list instead of an
//! error so the rest of the frame survives.
//!
//! Inflation stops once `cnt` points are produced; bytes past that are never
//! decompressed. `cnt` itself is bounded by a byte cap, and a payload that
//! overruns the cap is a decompression failure.

use std::io::Read;

use bytemuck::PodCastError;
use flate2::read::{DeflateDecoder, ZlibDecoder};

use crate::error::{ProtocolError, WireResult};
use crate::model::{PointFormat, PointList};
use crate::reader::ByteReader;

/// Upper bound on the preallocation taken from the untrusted size hint.
const MAX_PREALLOC_BYTES: usize = 16 * 1024 * 1024;

/// Default cap on the inflated size of one point list.
pub const DEFAULT_MAX_POINT_BYTES: usize = 64 * 1024 * 1024;

/// Size of the fixed point list header.
pub const POINT_LIST_HEADER_LEN: usize = 13;

/// Decompression backend for point payloads.
pub trait Inflate {
    /// Inflates at most `limit` bytes of `compressed`, using `size_hint`
    /// only as a capacity hint.
    ///
    /// # Errors
    ///
    /// Returns the decompressor's message when no supported framing matches.
    fn inflate(&self, compressed: &[u8], size_hint: usize, limit: usize) -> Result<Vec<u8>, String>;
}

/// zlib first, raw deflate second.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlateInflater;

impl Inflate for FlateInflater {
    fn inflate(&self, compressed: &[u8], size_hint: usize, limit: usize) -> Result<Vec<u8>, String> {
        let capacity = size_hint.min(limit).min(MAX_PREALLOC_BYTES);
        let limit = u64::try_from(limit).unwrap_or(u64::MAX);

        let mut out = Vec::with_capacity(capacity);
        match ZlibDecoder::new(compressed).take(limit).read_to_end(&mut out) {
            Ok(_) => return Ok(out),
            Err(e) => tracing::trace!("zlib inflate failed ({e}), retrying raw deflate"),
        }

        out.clear();
        DeflateDecoder::new(compressed)
            .take(limit)
            .read_to_end(&mut out)
            .map(|_| out)
            .map_err(|e| e.to_string())
    }
}

/// Result of decoding one point list.
#[derive(Debug)]
pub struct GeometryDecode {
    /// Decoded points, empty on decompression failure.
    pub points: PointList,
    /// Point count from the header.
    pub declared_count: usize,
    /// Set when the payload could not be inflated.
    pub failure: Option<ProtocolError>,
}

impl GeometryDecode {
    /// False only for the "no geometry" encoding: zero count, no payload.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.declared_count > 0 || !self.points.is_empty() || self.failure.is_some()
    }

    fn empty(format: PointFormat, declared_count: usize, failure: Option<ProtocolError>) -> Self {
        Self {
            points: PointList::empty(format),
            declared_count,
            failure,
        }
    }
}

/// Decodes a point list at the reader position with the default inflater
/// and [`DEFAULT_MAX_POINT_BYTES`].
///
/// # Errors
///
/// Fails only when the header or the packed slice runs past the buffer.
/// Decompression failures are reported in [`GeometryDecode::failure`].
pub fn decode_point_list(reader: &mut ByteReader<'_>) -> WireResult<GeometryDecode> {
    decode_point_list_with(reader, &FlateInflater, DEFAULT_MAX_POINT_BYTES)
}

/// Decodes a point list at the reader position, inflating at most
/// `max_bytes` of point data.
///
/// # Errors
///
/// Fails only when the header or the packed slice runs past the buffer.
pub fn decode_point_list_with<I: Inflate + ?Sized>(
    reader: &mut ByteReader<'_>,
    inflater: &I,
    max_bytes: usize,
) -> WireResult<GeometryDecode> {
    let format = PointFormat::from_wire(reader.read_u8()?);
    let declared_count = reader.read_u32()? as usize;
    let size_hint = reader.read_u32()? as usize;
    let compressed_len = reader.read_u32()? as usize;

    if compressed_len == 0 {
        return Ok(GeometryDecode::empty(format, declared_count, None));
    }

    let compressed = reader.read_bytes(compressed_len)?;

    let scalar_len = if format.is_f64() { 8 } else { 4 };
    let declared_bytes = declared_count.saturating_mul(format.stride() * scalar_len);
    let over_cap = declared_bytes > max_bytes;
    // One byte past the cap distinguishes an overrun from an exact fit.
    let limit = if over_cap { max_bytes.saturating_add(1) } else { declared_bytes };

    let reason = match inflater.inflate(compressed, size_hint, limit) {
        Ok(raw) if over_cap && raw.len() > max_bytes => {
            format!("inflated point data exceeds {max_bytes} bytes")
        }
        Ok(raw) => return Ok(points_from_raw(format, declared_count, &raw)),
        Err(reason) => reason,
    };

    tracing::warn!(compressed_len, %reason, "point list failed to inflate, using empty list");
    Ok(GeometryDecode::empty(
        format,
        declared_count,
        Some(ProtocolError::GeometryDecompressionFailure {
            compressed_len,
            reason,
        }),
    ))
}

fn points_from_raw(format: PointFormat, declared_count: usize, raw: &[u8]) -> GeometryDecode {
    let mut points = if format.is_f64() {
        PointList::from_f64(format, bytes_to_f64(raw))
    } else {
        PointList::from_f32(format, bytes_to_f32(raw))
    };

    if points.count > declared_count {
        truncate_points(&mut points, declared_count);
    } else if points.count < declared_count {
        tracing::debug!(
            declared_count,
            decoded = points.count,
            "point payload shorter than declared count"
        );
    }

    GeometryDecode {
        points,
        declared_count,
        failure: None,
    }
}

fn truncate_points(points: &mut PointList, count: usize) {
    let len = count * points.stride();
    match &mut points.values {
        crate::model::PointValues::F32(v) => v.truncate(len),
        crate::model::PointValues::F64(v) => v.truncate(len),
    }
    points.count = count;
}

/// Reinterprets little-endian bytes as f32 values.
///
/// A trailing partial value is ignored. The inflated buffer carries no
/// alignment guarantee: an aligned buffer is cast in place, a misaligned one
/// is copied into a fresh `Vec<f32>` element by element.
#[must_use]
pub fn bytes_to_f32(bytes: &[u8]) -> Vec<f32> {
    let usable = &bytes[..bytes.len() - bytes.len() % 4];
    #[allow(unused_mut)]
    let mut values: Vec<f32> = match bytemuck::try_cast_slice::<u8, f32>(usable) {
        Ok(aligned) => aligned.to_vec(),
        Err(PodCastError::TargetAlignmentGreaterAndInputNotAligned) => {
            bytemuck::pod_collect_to_vec::<u8, f32>(usable)
        }
        Err(e) => {
            tracing::debug!(?e, "f32 cast failed, decoding per element");
            usable
                .chunks_exact(4)
                .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                .collect()
        }
    };
    #[cfg(target_endian = "big")]
    for v in &mut values {
        *v = f32::from_bits(v.to_bits().swap_bytes());
    }
    values
}

/// Reinterprets little-endian bytes as f64 values. See [`bytes_to_f32`].
#[must_use]
pub fn bytes_to_f64(bytes: &[u8]) -> Vec<f64> {
    let usable = &bytes[..bytes.len() - bytes.len() % 8];
    #[allow(unused_mut)]
    let mut values: Vec<f64> = match bytemuck::try_cast_slice::<u8, f64>(usable) {
        Ok(aligned) => aligned.to_vec(),
        Err(PodCastError::TargetAlignmentGreaterAndInputNotAligned) => {
            bytemuck::pod_collect_to_vec::<u8, f64>(usable)
        }
        Err(e) => {
            tracing::debug!(?e, "f64 cast failed, decoding per element");
            usable
                .chunks_exact(8)
                .map(|c| f64::from_ne_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect()
        }
    };
    #[cfg(target_endian = "big")]
    for v in &mut values {
        *v = f64::from_bits(v.to_bits().swap_bytes());
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{compress_points, Compression};
    use std::cell::Cell;

    struct CountingInflater {
        calls: Cell<usize>,
        produced: Cell<usize>,
    }

    impl CountingInflater {
        fn new() -> Self {
            Self {
                calls: Cell::new(0),
                produced: Cell::new(0),
            }
        }
    }

    impl Inflate for CountingInflater {
        fn inflate(&self, compressed: &[u8], size_hint: usize, limit: usize) -> Result<Vec<u8>, String> {
            self.calls.set(self.calls.get() + 1);
            let out = FlateInflater.inflate(compressed, size_hint, limit)?;
            self.produced.set(self.produced.get() + out.len());
            Ok(out)
        }
    }

    fn header(format: u8, count: u32, raw: u32, packed: &[u8]) -> Vec<u8> {
        let mut data = vec![format];
        data.extend_from_slice(&count.to_le_bytes());
        data.extend_from_slice(&raw.to_le_bytes());
        data.extend_from_slice(&(packed.len() as u32).to_le_bytes());
        data.extend_from_slice(packed);
        data
    }

    #[test]
    fn test_zero_compressed_size_skips_inflate() {
        let data = header(0xFF, 12, 144, &[]);
        let inflater = CountingInflater::new();
        let mut reader = ByteReader::new(&data);

        let decoded = decode_point_list_with(&mut reader, &inflater, DEFAULT_MAX_POINT_BYTES).unwrap();

        assert_eq!(decoded.points.count, 0);
        assert_eq!(decoded.points.stride(), 3);
        assert!(decoded.failure.is_none());
        assert_eq!(inflater.calls.get(), 0);
        assert_eq!(reader.position(), POINT_LIST_HEADER_LEN);
    }

    #[test]
    fn test_zlib_xyz_points() {
        let values: Vec<f32> = (0..36).map(|i| i as f32 * 0.5).collect();
        let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let packed = compress_points(&raw, Compression::Zlib);
        let data = header(1, 12, raw.len() as u32, &packed);

        let mut reader = ByteReader::new(&data);
        let decoded = decode_point_list(&mut reader).unwrap();

        assert_eq!(decoded.points.count, 12);
        assert_eq!(decoded.points.stride(), 3);
        assert_eq!(decoded.points.as_f32().unwrap(), values.as_slice());
        assert!(reader.is_exhausted());
    }

    #[test]
    fn test_raw_deflate_fallback() {
        let values = [1.0f32, 2.0, 3.0, 4.0];
        let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let packed = compress_points(&raw, Compression::RawDeflate);
        let data = header(0, 2, raw.len() as u32, &packed);

        let decoded = decode_point_list(&mut ByteReader::new(&data)).unwrap();

        assert_eq!(decoded.points.count, 2);
        assert_eq!(decoded.points.as_f32().unwrap(), &values);
    }

    #[test]
    fn test_garbage_payload_yields_empty_list() {
        let data = header(1, 4, 48, &[0xde, 0xad, 0xbe, 0xef, 0x01]);
        let mut reader = ByteReader::new(&data);

        let decoded = decode_point_list(&mut reader).unwrap();

        assert!(decoded.points.is_empty());
        assert!(matches!(
            decoded.failure,
            Some(ProtocolError::GeometryDecompressionFailure { compressed_len: 5, .. })
        ));
        // Cursor still moves past the blob so siblings can be read.
        assert!(reader.is_exhausted());
    }

    #[test]
    fn test_packed_slice_past_end_is_an_error() {
        let mut data = header(1, 4, 48, &[]);
        let len_at = data.len() - 4;
        data[len_at..].copy_from_slice(&100u32.to_le_bytes());
        assert!(decode_point_list(&mut ByteReader::new(&data)).is_err());
    }

    #[test]
    fn test_declared_count_caps_points() {
        let values: Vec<f32> = (0..9).map(|i| i as f32).collect();
        let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let packed = compress_points(&raw, Compression::Zlib);
        let data = header(1, 2, raw.len() as u32, &packed);

        let decoded = decode_point_list(&mut ByteReader::new(&data)).unwrap();

        assert_eq!(decoded.points.count, 2);
        assert_eq!(decoded.points.values.len(), 6);
    }

    #[test]
    fn test_inflation_stops_at_declared_count() {
        // 8 MiB of zeros packs into a few KiB.
        let raw = vec![0u8; 8 * 1024 * 1024];
        let packed = compress_points(&raw, Compression::Zlib);
        let data = header(1, 1, 12, &packed);
        let inflater = CountingInflater::new();

        let decoded =
            decode_point_list_with(&mut ByteReader::new(&data), &inflater, DEFAULT_MAX_POINT_BYTES).unwrap();

        assert_eq!(decoded.points.count, 1);
        assert!(decoded.failure.is_none());
        assert_eq!(inflater.produced.get(), 12);
    }

    #[test]
    fn test_payload_over_byte_cap_fails() {
        let raw = vec![0u8; 4096];
        let packed = compress_points(&raw, Compression::Zlib);
        let data = header(1, u32::MAX, 0, &packed);
        let inflater = CountingInflater::new();

        let decoded = decode_point_list_with(&mut ByteReader::new(&data), &inflater, 1024).unwrap();

        assert!(decoded.points.is_empty());
        assert!(decoded.is_present());
        assert!(matches!(
            decoded.failure,
            Some(ProtocolError::GeometryDecompressionFailure { .. })
        ));
        assert_eq!(inflater.produced.get(), 1025);
    }

    #[test]
    fn test_payload_within_byte_cap_decodes() {
        let values: Vec<f32> = (0..6).map(|i| i as f32).collect();
        let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let packed = compress_points(&raw, Compression::Zlib);
        let data = header(1, u32::MAX, 0, &packed);

        let decoded = decode_point_list_with(&mut ByteReader::new(&data), &FlateInflater, 1024).unwrap();

        assert!(decoded.failure.is_none());
        assert_eq!(decoded.points.count, 2);
    }

    #[test]
    fn test_absent_geometry_is_not_present() {
        let absent = decode_point_list(&mut ByteReader::new(&header(1, 0, 0, &[]))).unwrap();
        assert!(!absent.is_present());

        let declared = decode_point_list(&mut ByteReader::new(&header(0, 5, 0, &[]))).unwrap();
        assert!(declared.is_present());
        assert_eq!(declared.points.format, PointFormat::XyF32);
    }

    #[test]
    fn test_misaligned_bytes_are_copied() {
        let values = [1.25f32, -3.5, 8.0];
        let mut storage = vec![0u8];
        storage.extend(values.iter().flat_map(|v| v.to_le_bytes()));
        // Offset by one byte guarantees the slice is not 4-byte aligned
        // whenever the backing allocation is.
        let decoded = bytes_to_f32(&storage[1..]);
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_trailing_partial_value_ignored() {
        let mut bytes: Vec<u8> = 2.0f32.to_le_bytes().to_vec();
        bytes.push(0xAA);
        assert_eq!(bytes_to_f32(&bytes), vec![2.0]);
    }

    #[test]
    fn test_f64_points() {
        let values = [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0];
        let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let packed = compress_points(&raw, Compression::Zlib);
        let data = header(4, 2, raw.len() as u32, &packed);

        let decoded = decode_point_list(&mut ByteReader::new(&data)).unwrap();

        assert_eq!(decoded.points.format, PointFormat::XyzF64);
        assert_eq!(decoded.points.count, 2);
        assert_eq!(decoded.points.as_f64().unwrap(), &values);
    }
}
