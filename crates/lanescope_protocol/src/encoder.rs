//! # Reference Encoder
//!
//! Writes frames in the exact layout the decoder reads.
//!
//! Used by the synthetic producer, tests and benchmarks. Strings longer
//! than `u16::MAX` bytes are truncated at the prefix limit; the decoder's
//! own cap is much lower, so such frames exercise the rejection path.

use std::io::Write;

use flate2::write::{DeflateEncoder, ZlibEncoder};

use crate::decoder::MAGIC;
use crate::model::{Frame, Layer, Node, NodeBase, Object, PointFormat, PointList, PointValues, Topic};

/// Framing used for point payloads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Compression {
    /// zlib header and adler32 trailer.
    #[default]
    Zlib,
    /// Bare deflate stream, as emitted by older producers.
    RawDeflate,
}

/// Compresses a raw point payload.
#[must_use]
pub fn compress_points(raw: &[u8], compression: Compression) -> Vec<u8> {
    let level = flate2::Compression::fast();
    match compression {
        Compression::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.len() / 2), level);
            encoder
                .write_all(raw)
                .and_then(|()| encoder.finish())
                .expect("in-memory zlib stream cannot fail")
        }
        Compression::RawDeflate => {
            let mut encoder = DeflateEncoder::new(Vec::with_capacity(raw.len() / 2), level);
            encoder
                .write_all(raw)
                .and_then(|()| encoder.finish())
                .expect("in-memory deflate stream cannot fail")
        }
    }
}

/// Growable little-endian writer.
#[derive(Default)]
struct WireWriter {
    buffer: Vec<u8>,
}

impl WireWriter {
    #[inline]
    fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    #[inline]
    fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    #[inline]
    fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    #[inline]
    fn write_u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    #[inline]
    fn write_f64(&mut self, value: f64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    fn write_vec3(&mut self, value: [f32; 3]) {
        for v in value {
            self.buffer.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn write_count(&mut self, count: usize) {
        self.write_u32(u32::try_from(count).unwrap_or(u32::MAX));
    }

    fn write_string(&mut self, value: &str) {
        let bytes = value.as_bytes();
        let len = u16::try_from(bytes.len()).unwrap_or(u16::MAX);
        self.write_u16(len);
        self.buffer.extend_from_slice(&bytes[..usize::from(len)]);
    }
}

/// Frame encoder.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameEncoder {
    compression: Compression,
}

impl FrameEncoder {
    /// Creates an encoder emitting zlib point payloads.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            compression: Compression::Zlib,
        }
    }

    /// Creates an encoder with the given point payload framing.
    #[must_use]
    pub const fn with_compression(compression: Compression) -> Self {
        Self { compression }
    }

    /// Encodes a whole frame.
    #[must_use]
    pub fn encode(&self, frame: &Frame) -> Vec<u8> {
        let mut w = WireWriter::default();
        w.buffer.extend_from_slice(&MAGIC);
        w.write_u64(frame.id);
        w.write_f64(frame.timestamp);
        w.write_u8(frame.coordinate_system as u8);
        w.write_count(frame.layers.len());
        for layer in &frame.layers {
            self.write_layer(&mut w, layer);
        }
        w.buffer
    }

    /// Encodes one layer on its own.
    #[must_use]
    pub fn encode_layer(&self, layer: &Layer) -> Vec<u8> {
        let mut w = WireWriter::default();
        self.write_layer(&mut w, layer);
        w.buffer
    }

    /// Encodes one point list section, header included.
    #[must_use]
    pub fn encode_points(&self, points: Option<&PointList>) -> Vec<u8> {
        let mut w = WireWriter::default();
        self.write_points(&mut w, points);
        w.buffer
    }

    fn write_layer(&self, w: &mut WireWriter, layer: &Layer) {
        Self::write_base(w, &layer.base);
        w.write_count(layer.topics.len());
        for topic in &layer.topics {
            self.write_topic(w, topic);
        }
    }

    fn write_topic(&self, w: &mut WireWriter, topic: &Topic) {
        w.write_string(&topic.id);
        w.write_u64(topic.frame_id);
        match &topic.root {
            Some(node) => {
                w.write_u8(1);
                w.write_u8(node.tag());
                self.write_node(w, node);
            }
            None => w.write_u8(0),
        }
    }

    fn write_node(&self, w: &mut WireWriter, node: &Node) {
        match node {
            Node::Group(group) => {
                Self::write_base(w, &group.base);
                w.write_count(group.children.len());
                for child in &group.children {
                    w.write_u8(child.tag());
                    self.write_node(w, child);
                }
            }
            Node::Object(object) => self.write_object(w, object),
        }
    }

    fn write_object(&self, w: &mut WireWriter, object: &Object) {
        Self::write_base(w, &object.base);
        w.write_u8(object.object_type as u8);
        w.write_u32(object.sub_type);
        w.write_vec3(object.position);
        w.write_vec3(object.rotation);
        w.write_vec3(object.size);
        w.buffer.extend_from_slice(&object.color);
        self.write_points(w, object.points.as_ref());
    }

    fn write_points(&self, w: &mut WireWriter, points: Option<&PointList>) {
        let Some(points) = points.filter(|p| !p.is_empty()) else {
            w.write_u8(points.map_or(PointFormat::XyzF32, |p| p.format).to_wire());
            w.write_u32(0);
            w.write_u32(0);
            w.write_u32(0);
            return;
        };

        let raw: Vec<u8> = match &points.values {
            PointValues::F32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            PointValues::F64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        };
        let packed = compress_points(&raw, self.compression);

        w.write_u8(points.format.to_wire());
        w.write_count(points.count);
        w.write_count(raw.len());
        w.write_count(packed.len());
        w.buffer.extend_from_slice(&packed);
    }

    fn write_base(w: &mut WireWriter, base: &NodeBase) {
        w.write_string(&base.id);
        w.write_string(&base.name);
        w.write_u8(u8::from(base.visible));
        w.write_u8(base.view_mask);
        w.write_u16(u16::try_from(base.properties.len()).unwrap_or(u16::MAX));
        for (key, value) in base.properties.iter().take(usize::from(u16::MAX)) {
            w.write_string(key);
            w.write_string(value);
        }
    }
}
