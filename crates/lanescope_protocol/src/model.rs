//! # Frame Data Model
//!
//! Typed scene tree produced by the decoder.
//!
//! ```text
//! Frame
//!  └── Layer*            (toggleable bucket)
//!       └── Topic*        (named data source, optional root)
//!            └── Node     (Group | Object)
//!                 ├── Group  → children: Node*
//!                 └── Object → PointList?
//! ```
//!
//! Frames are immutable once decoded. They are moved, never cloned, on
//! their way from the decoder through admission into the scene store.

/// Coordinate convention declared by the producer for a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CoordinateSystem {
    /// X forward, Y left, Z up (vehicle / ROS convention).
    #[default]
    RightHandedZUp = 0,
    /// X right, Y up, Z towards the viewer (OpenGL convention).
    RightHandedYUp = 1,
    /// X right, Y up, Z away from the viewer.
    LeftHandedYUp = 2,
    /// X forward, Y right, Z up.
    LeftHandedZUp = 3,
}

impl CoordinateSystem {
    /// Maps a wire byte to a convention.
    #[must_use]
    pub const fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::RightHandedZUp),
            1 => Some(Self::RightHandedYUp),
            2 => Some(Self::LeftHandedYUp),
            3 => Some(Self::LeftHandedZUp),
            _ => None,
        }
    }
}

/// Kind of renderable carried by an [`Object`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObjectType {
    /// Unrecognized or unset.
    #[default]
    Unknown = 0,
    /// Raw point cloud.
    PointCloud = 1,
    /// Disjoint line segments (pairs of points).
    LineList = 2,
    /// Connected line strip.
    Polyline = 3,
    /// Closed polygon outline.
    Polygon = 4,
    /// Oriented box.
    Cube = 5,
    /// Sphere.
    Sphere = 6,
    /// Text label.
    Text = 7,
    /// Triangle mesh.
    Mesh = 8,
    /// Image billboard.
    Image = 9,
}

impl ObjectType {
    /// Maps a wire byte to an object type. Unknown values map to [`ObjectType::Unknown`].
    #[must_use]
    pub const fn from_wire(value: u8) -> Self {
        match value {
            1 => Self::PointCloud,
            2 => Self::LineList,
            3 => Self::Polyline,
            4 => Self::Polygon,
            5 => Self::Cube,
            6 => Self::Sphere,
            7 => Self::Text,
            8 => Self::Mesh,
            9 => Self::Image,
            _ => Self::Unknown,
        }
    }
}

/// Numeric layout of a point buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointFormat {
    /// `[x, y]` as f32.
    XyF32,
    /// `[x, y, z]` as f32.
    XyzF32,
    /// `[x, y, z, intensity]` as f32.
    XyziF32,
    /// `[x, y]` as f64.
    XyF64,
    /// `[x, y, z]` as f64.
    XyzF64,
    /// Format byte this client does not know. Decoded as f32 with stride 3.
    Unknown(u8),
}

impl PointFormat {
    /// Maps a wire byte to a format.
    #[must_use]
    pub const fn from_wire(value: u8) -> Self {
        match value {
            0 => Self::XyF32,
            1 => Self::XyzF32,
            2 => Self::XyziF32,
            3 => Self::XyF64,
            4 => Self::XyzF64,
            other => Self::Unknown(other),
        }
    }

    /// Wire byte for this format.
    #[must_use]
    pub const fn to_wire(self) -> u8 {
        match self {
            Self::XyF32 => 0,
            Self::XyzF32 => 1,
            Self::XyziF32 => 2,
            Self::XyF64 => 3,
            Self::XyzF64 => 4,
            Self::Unknown(other) => other,
        }
    }

    /// Number of scalars per point.
    #[must_use]
    pub const fn stride(self) -> usize {
        match self {
            Self::XyF32 | Self::XyF64 => 2,
            Self::XyziF32 => 4,
            Self::XyzF32 | Self::XyzF64 | Self::Unknown(_) => 3,
        }
    }

    /// True for the double precision layouts.
    #[must_use]
    pub const fn is_f64(self) -> bool {
        matches!(self, Self::XyF64 | Self::XyzF64)
    }
}

/// Flat scalar storage of a point list.
#[derive(Clone, Debug, PartialEq)]
pub enum PointValues {
    /// Single precision scalars.
    F32(Vec<f32>),
    /// Double precision scalars.
    F64(Vec<f64>),
}

impl PointValues {
    /// Number of scalars.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    /// True when no scalars are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Geometry of an object: `count` points of `format.stride()` scalars each.
#[derive(Clone, Debug, PartialEq)]
pub struct PointList {
    /// Layout of the values.
    pub format: PointFormat,
    /// Number of complete points in `values`.
    pub count: usize,
    /// Flat scalar buffer, `count * stride` long.
    pub values: PointValues,
}

impl PointList {
    /// Creates an empty list of the given format.
    #[must_use]
    pub fn empty(format: PointFormat) -> Self {
        let values = if format.is_f64() {
            PointValues::F64(Vec::new())
        } else {
            PointValues::F32(Vec::new())
        };
        Self {
            format,
            count: 0,
            values,
        }
    }

    /// Builds a single precision list. Trailing scalars that do not form a
    /// complete point are dropped.
    #[must_use]
    pub fn from_f32(format: PointFormat, mut values: Vec<f32>) -> Self {
        let stride = format.stride();
        let count = values.len() / stride;
        values.truncate(count * stride);
        Self {
            format,
            count,
            values: PointValues::F32(values),
        }
    }

    /// Builds a double precision list.
    #[must_use]
    pub fn from_f64(format: PointFormat, mut values: Vec<f64>) -> Self {
        let stride = format.stride();
        let count = values.len() / stride;
        values.truncate(count * stride);
        Self {
            format,
            count,
            values: PointValues::F64(values),
        }
    }

    /// Scalars per point.
    #[inline]
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.format.stride()
    }

    /// True when the list holds no points.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Single precision view of the scalars, if stored as f32.
    #[must_use]
    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.values {
            PointValues::F32(v) => Some(v),
            PointValues::F64(_) => None,
        }
    }

    /// Double precision view of the scalars, if stored as f64.
    #[must_use]
    pub fn as_f64(&self) -> Option<&[f64]> {
        match &self.values {
            PointValues::F64(v) => Some(v),
            PointValues::F32(_) => None,
        }
    }
}

/// Fields shared by layers, groups and objects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeBase {
    /// Identifier, unique within the producer's scene.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Producer-side visibility.
    pub visible: bool,
    /// Bit per view the node is drawn in.
    pub view_mask: u8,
    /// Free-form string properties in wire order.
    pub properties: Vec<(String, String)>,
}

impl NodeBase {
    /// Creates a visible node shown in every view.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            visible: true,
            view_mask: u8::MAX,
            properties: Vec::new(),
        }
    }

    /// Looks up a property value by key.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl Default for NodeBase {
    fn default() -> Self {
        Self::new(String::new(), String::new())
    }
}

/// Interior node of the scene tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Group {
    /// Shared fields.
    pub base: NodeBase,
    /// Children in wire order.
    pub children: Vec<Node>,
}

/// Leaf node carrying a renderable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Object {
    /// Shared fields.
    pub base: NodeBase,
    /// Renderable kind.
    pub object_type: ObjectType,
    /// Lane style or dynamic-object category, producer defined.
    pub sub_type: u32,
    /// Translation.
    pub position: [f32; 3],
    /// Euler rotation.
    pub rotation: [f32; 3],
    /// Extent.
    pub size: [f32; 3],
    /// RGBA color.
    pub color: [u8; 4],
    /// Geometry, absent when the producer sent no points.
    pub points: Option<PointList>,
}

impl Object {
    /// Object id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.base.id
    }
}

/// A node of the scene tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    /// Interior node.
    Group(Group),
    /// Leaf node.
    Object(Object),
}

impl Node {
    /// Wire tag of a group node.
    pub const TAG_GROUP: u8 = 0;
    /// Wire tag of an object node.
    pub const TAG_OBJECT: u8 = 1;

    /// Shared fields of either variant.
    #[must_use]
    pub fn base(&self) -> &NodeBase {
        match self {
            Self::Group(g) => &g.base,
            Self::Object(o) => &o.base,
        }
    }

    /// Wire tag of this node.
    #[must_use]
    pub const fn tag(&self) -> u8 {
        match self {
            Self::Group(_) => Self::TAG_GROUP,
            Self::Object(_) => Self::TAG_OBJECT,
        }
    }

    /// Number of objects in this subtree.
    #[must_use]
    pub fn object_count(&self) -> usize {
        match self {
            Self::Group(g) => g.children.iter().map(Node::object_count).sum(),
            Self::Object(_) => 1,
        }
    }
}

/// Named data source inside a layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Topic {
    /// Topic id.
    pub id: String,
    /// Frame the topic data belongs to.
    pub frame_id: u64,
    /// Data for this frame, absent when the source was silent.
    pub root: Option<Node>,
}

/// Independently toggleable bucket of topics.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Layer {
    /// Shared fields.
    pub base: NodeBase,
    /// Topics in wire order.
    pub topics: Vec<Topic>,
}

/// One decoded scene snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    /// Monotonic frame id.
    pub id: u64,
    /// Producer timestamp in seconds.
    pub timestamp: f64,
    /// Coordinate convention of every transform in the frame.
    pub coordinate_system: CoordinateSystem,
    /// Layers in wire order.
    pub layers: Vec<Layer>,
}

impl Frame {
    /// Creates an empty frame.
    #[must_use]
    pub fn new(id: u64, timestamp: f64) -> Self {
        Self {
            id,
            timestamp,
            coordinate_system: CoordinateSystem::default(),
            layers: Vec::new(),
        }
    }

    /// Total number of objects across all layers.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.layers
            .iter()
            .flat_map(|layer| layer.topics.iter())
            .filter_map(|topic| topic.root.as_ref())
            .map(Node::object_count)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_format_stride() {
        assert_eq!(PointFormat::XyF32.stride(), 2);
        assert_eq!(PointFormat::XyzF32.stride(), 3);
        assert_eq!(PointFormat::XyziF32.stride(), 4);
        assert_eq!(PointFormat::XyF64.stride(), 2);
        assert_eq!(PointFormat::XyzF64.stride(), 3);
        assert_eq!(PointFormat::from_wire(200).stride(), 3);
    }

    #[test]
    fn test_point_format_wire_values_are_stable() {
        for byte in 0..=255u8 {
            assert_eq!(PointFormat::from_wire(byte).to_wire(), byte);
        }
    }

    #[test]
    fn test_from_f32_drops_incomplete_point() {
        let list = PointList::from_f32(PointFormat::XyzF32, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(list.count, 1);
        assert_eq!(list.as_f32().unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_frame_object_count() {
        let mut frame = Frame::new(1, 0.0);
        frame.layers.push(Layer {
            base: NodeBase::new("lanes", "Lanes"),
            topics: vec![Topic {
                id: "t".into(),
                frame_id: 1,
                root: Some(Node::Group(Group {
                    base: NodeBase::new("g", "g"),
                    children: vec![
                        Node::Object(Object::default()),
                        Node::Object(Object::default()),
                    ],
                })),
            }],
        });
        assert_eq!(frame.object_count(), 2);
    }

    #[test]
    fn test_unknown_coordinate_system() {
        assert_eq!(CoordinateSystem::from_wire(2), Some(CoordinateSystem::LeftHandedYUp));
        assert_eq!(CoordinateSystem::from_wire(4), None);
    }
}
