//! # LANESCOPE Protocol
//!
//! Binary scene-frame protocol between the playback server and the viewer.
//!
//! ## Architecture
//!
//! ```text
//! bytes ──► FrameDecoder ──► Frame ──► (admission / scene store)
//!               │
//!               └──► geometry::decode_point_list (zlib / raw deflate)
//! ```
//!
//! The decoder is stateless and never panics on wire input. Header damage
//! rejects the whole frame; damage inside a layer or topic only drops that
//! subtree and is listed in the [`DecodeReport`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use lanescope_protocol::{DecoderLimits, FrameDecoder};
//!
//! let decoder = FrameDecoder::new(DecoderLimits::default());
//! let (frame, report) = decoder.decode_with_report(&message)?;
//! ```

#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod geometry;
pub mod model;
pub mod reader;

pub use decoder::{DecodeReport, DecoderLimits, FrameDecoder, MAGIC};
pub use encoder::{Compression, FrameEncoder};
pub use error::{ProtocolError, ProtocolResult, WireError, WireResult};
pub use geometry::{decode_point_list, FlateInflater, GeometryDecode, Inflate};
pub use model::{
    CoordinateSystem, Frame, Group, Layer, Node, NodeBase, Object, ObjectType, PointFormat,
    PointList, PointValues, Topic,
};
pub use reader::ByteReader;
