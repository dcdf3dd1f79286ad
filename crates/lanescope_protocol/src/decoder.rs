//! # Binary Frame Decoder
//!
//! Recursive-descent decoder turning one binary message into a [`Frame`].
//!
//! ## Frame Structure
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header                                                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Magic (2) │ FrameId (8) │ Timestamp (8) │ Coord (1) │ N (4)  │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Layer × N                                                    │
//! │   NodeBase │ TopicCount (4) │ Topic × M                      │
//! │     Topic: Id │ FrameId (8) │ HasRoot (1) │ [Tag (1) Node]   │
//! └──────────────────────────────────────────────────────────────┘
//!
//! NodeBase: Id │ Name │ Visible (1) │ ViewMask (1) │ PropCount (2) │ (K,V)*
//! Group:    NodeBase │ ChildCount (4) │ (Tag (1) Node)*
//! Object:   NodeBase │ Type (1) │ SubType (4) │ Pos/Rot/Size (36) │ RGBA (4) │ PointList
//! ```
//!
//! ## Failure Scopes
//!
//! - Header failures abort with [`ProtocolError::MalformedFrame`].
//! - A failing layer or topic is logged, recorded in the [`DecodeReport`],
//!   and skipped; decoding resumes with the next sibling.
//! - Geometry that fails to inflate leaves its object with an empty list.

use crate::error::{ProtocolError, ProtocolResult, WireError, WireResult};
use crate::geometry::{
    decode_point_list_with, FlateInflater, Inflate, DEFAULT_MAX_POINT_BYTES, POINT_LIST_HEADER_LEN,
};
use crate::model::{CoordinateSystem, Frame, Group, Layer, Node, NodeBase, Object, ObjectType, Topic};
use crate::reader::ByteReader;

/// Protocol magic at the start of every frame.
pub const MAGIC: [u8; 2] = *b"LS";

/// Default bound on scene tree nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Default cap on any single string on the wire.
pub const DEFAULT_MAX_STRING_LEN: usize = 10_000;

/// Smallest possible NodeBase: two empty strings, flags, zero properties.
const MIN_NODE_BASE_LEN: usize = 2 + 2 + 1 + 1 + 2;
const MIN_PROPERTY_LEN: usize = 2 + 2;
const MIN_LAYER_LEN: usize = MIN_NODE_BASE_LEN + 4;
const MIN_TOPIC_LEN: usize = 2 + 8 + 1;
const MIN_GROUP_LEN: usize = MIN_NODE_BASE_LEN + 4;
/// Tag plus the smaller of the two node kinds.
const MIN_CHILD_LEN: usize = 1 + MIN_GROUP_LEN;
/// Object payload after its NodeBase.
pub const OBJECT_FIXED_LEN: usize = 1 + 4 + 36 + 4 + POINT_LIST_HEADER_LEN;

/// Structural limits applied while decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecoderLimits {
    /// Maximum nesting of nodes below a topic.
    pub max_depth: usize,
    /// Maximum byte length of any string.
    pub max_string_len: usize,
    /// Maximum inflated size of one point list.
    pub max_point_bytes: usize,
}

impl Default for DecoderLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_string_len: DEFAULT_MAX_STRING_LEN,
            max_point_bytes: DEFAULT_MAX_POINT_BYTES,
        }
    }
}

/// Non-fatal problems encountered while decoding one frame.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DecodeReport {
    /// Every partial failure in decode order.
    pub issues: Vec<ProtocolError>,
    /// Layers dropped entirely.
    pub layers_dropped: u32,
    /// Topics dropped inside otherwise healthy layers.
    pub topics_dropped: u32,
    /// Point lists replaced by empty lists.
    pub geometry_failures: u32,
}

impl DecodeReport {
    /// True when the frame decoded without any loss.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Stateless frame decoder.
///
/// Holds only configuration; one instance can decode any number of frames
/// and be shared across threads.
#[derive(Clone, Debug)]
pub struct FrameDecoder<I = FlateInflater> {
    limits: DecoderLimits,
    inflater: I,
}

impl FrameDecoder<FlateInflater> {
    /// Creates a decoder with the flate2 inflater.
    #[must_use]
    pub fn new(limits: DecoderLimits) -> Self {
        Self {
            limits,
            inflater: FlateInflater,
        }
    }
}

impl Default for FrameDecoder<FlateInflater> {
    fn default() -> Self {
        Self::new(DecoderLimits::default())
    }
}

impl<I: Inflate> FrameDecoder<I> {
    /// Creates a decoder with a custom inflater.
    pub fn with_inflater(limits: DecoderLimits, inflater: I) -> Self {
        Self { limits, inflater }
    }

    /// Returns the configured limits.
    #[must_use]
    pub const fn limits(&self) -> &DecoderLimits {
        &self.limits
    }

    /// Decodes a frame, discarding the partial-failure report.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::MalformedFrame`] when the header is unreadable.
    pub fn decode(&self, buffer: &[u8]) -> ProtocolResult<Frame> {
        self.decode_with_report(buffer).map(|(frame, _)| frame)
    }

    /// Decodes a frame and reports which subtrees were dropped.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::MalformedFrame`] when the header is unreadable.
    pub fn decode_with_report(&self, buffer: &[u8]) -> ProtocolResult<(Frame, DecodeReport)> {
        let mut reader = ByteReader::new(buffer);
        let mut report = DecodeReport::default();

        let (mut frame, layer_count) =
            Self::decode_header(&mut reader).map_err(ProtocolError::MalformedFrame)?;
        frame.layers.reserve(layer_count);

        for index in 0..layer_count {
            if reader.is_exhausted() {
                report.layers_dropped += u32::try_from(layer_count - index).unwrap_or(u32::MAX);
                report.issues.push(ProtocolError::PartialDecode {
                    scope: format!("layer[{index}..{layer_count}]"),
                    source: WireError::UnexpectedEof {
                        offset: reader.position(),
                        needed: MIN_LAYER_LEN,
                        remaining: 0,
                    },
                });
                break;
            }
            match self.decode_layer(&mut reader, &mut report) {
                Ok(layer) => frame.layers.push(layer),
                Err(source) => {
                    tracing::warn!(frame_id = frame.id, layer = index, %source, "dropping layer");
                    report.layers_dropped += 1;
                    report.issues.push(ProtocolError::PartialDecode {
                        scope: format!("layer[{index}]"),
                        source,
                    });
                }
            }
        }

        if !report.is_complete() {
            tracing::debug!(
                frame_id = frame.id,
                issues = report.issues.len(),
                layers_dropped = report.layers_dropped,
                topics_dropped = report.topics_dropped,
                "frame decoded partially"
            );
        }

        Ok((frame, report))
    }

    fn decode_header(reader: &mut ByteReader<'_>) -> WireResult<(Frame, usize)> {
        let magic = reader.read_array::<2>()?;
        if magic != MAGIC {
            return Err(WireError::BadMagic {
                expected: MAGIC,
                found: magic,
            });
        }

        let id = reader.read_u64()?;
        let timestamp = reader.read_f64()?;
        let mut frame = Frame::new(id, timestamp);

        // Producers predating the coordinate field stop right here.
        if reader.is_exhausted() {
            return Ok((frame, 0));
        }

        let coord = reader.read_u8()?;
        frame.coordinate_system = CoordinateSystem::from_wire(coord).unwrap_or_else(|| {
            tracing::warn!(frame_id = id, coord, "unknown coordinate system, using default");
            CoordinateSystem::default()
        });

        // Only the pre-coordinate layout may stop early. Once the coordinate
        // byte is present the layer count is mandatory.
        let layer_count = reader.read_u32()?;
        reader.check_count("layer", u64::from(layer_count), MIN_LAYER_LEN)?;

        Ok((frame, layer_count as usize))
    }

    fn decode_layer(&self, reader: &mut ByteReader<'_>, report: &mut DecodeReport) -> WireResult<Layer> {
        let base = self.decode_base(reader)?;
        let topic_count = reader.read_u32()?;
        reader.check_count("topic", u64::from(topic_count), MIN_TOPIC_LEN)?;

        let mut topics = Vec::with_capacity(topic_count as usize);
        for index in 0..topic_count {
            if reader.is_exhausted() {
                report.topics_dropped += topic_count - index;
                break;
            }
            match self.decode_topic(reader, report) {
                Ok(topic) => topics.push(topic),
                Err(source) => {
                    tracing::warn!(layer = %base.id, topic = index, %source, "dropping topic");
                    report.topics_dropped += 1;
                    report.issues.push(ProtocolError::PartialDecode {
                        scope: format!("layer {:?} topic[{index}]", base.id),
                        source,
                    });
                }
            }
        }

        Ok(Layer { base, topics })
    }

    fn decode_topic(&self, reader: &mut ByteReader<'_>, report: &mut DecodeReport) -> WireResult<Topic> {
        let id = reader.read_string(self.limits.max_string_len)?;
        let frame_id = reader.read_u64()?;
        let has_root = reader.read_u8()? != 0;

        let root = if has_root {
            let tag = reader.read_u8()?;
            Some(self.decode_node(reader, tag, 1, report)?)
        } else {
            None
        };

        Ok(Topic { id, frame_id, root })
    }

    fn decode_node(
        &self,
        reader: &mut ByteReader<'_>,
        tag: u8,
        depth: usize,
        report: &mut DecodeReport,
    ) -> WireResult<Node> {
        if depth > self.limits.max_depth {
            return Err(WireError::DepthExceeded {
                limit: self.limits.max_depth,
            });
        }

        let tag_offset = reader.position().saturating_sub(1);
        match tag {
            Node::TAG_GROUP => {
                let base = self.decode_base(reader)?;
                let child_count = reader.read_u32()?;
                reader.check_count("child", u64::from(child_count), MIN_CHILD_LEN)?;

                let mut children = Vec::with_capacity(child_count as usize);
                for _ in 0..child_count {
                    let child_tag = reader.read_u8()?;
                    children.push(self.decode_node(reader, child_tag, depth + 1, report)?);
                }
                Ok(Node::Group(Group { base, children }))
            }
            Node::TAG_OBJECT => self.decode_object(reader, report).map(Node::Object),
            other => Err(WireError::UnknownNodeTag {
                tag: other,
                offset: tag_offset,
            }),
        }
    }

    fn decode_object(&self, reader: &mut ByteReader<'_>, report: &mut DecodeReport) -> WireResult<Object> {
        let base = self.decode_base(reader)?;
        let object_type = ObjectType::from_wire(reader.read_u8()?);
        let sub_type = reader.read_u32()?;
        let position = reader.read_vec3()?;
        let rotation = reader.read_vec3()?;
        let size = reader.read_vec3()?;
        let color = reader.read_array::<4>()?;

        let geometry = decode_point_list_with(reader, &self.inflater, self.limits.max_point_bytes)?;
        let present = geometry.is_present();
        if let Some(failure) = geometry.failure {
            tracing::debug!(object = %base.id, %failure, "object geometry dropped");
            report.geometry_failures += 1;
            report.issues.push(failure);
        }
        let points = present.then_some(geometry.points);

        Ok(Object {
            base,
            object_type,
            sub_type,
            position,
            rotation,
            size,
            color,
            points,
        })
    }

    fn decode_base(&self, reader: &mut ByteReader<'_>) -> WireResult<NodeBase> {
        let limit = self.limits.max_string_len;
        let id = reader.read_string(limit)?;
        let name = reader.read_string(limit)?;
        let visible = reader.read_u8()? != 0;
        let view_mask = reader.read_u8()?;
        let property_count = reader.read_u16()?;
        reader.check_count("property", u64::from(property_count), MIN_PROPERTY_LEN)?;

        let mut properties = Vec::with_capacity(usize::from(property_count));
        for _ in 0..property_count {
            let key = reader.read_string(limit)?;
            let value = reader.read_string(limit)?;
            properties.push((key, value));
        }

        Ok(NodeBase {
            id,
            name,
            visible,
            view_mask,
            properties,
        })
    }
}
