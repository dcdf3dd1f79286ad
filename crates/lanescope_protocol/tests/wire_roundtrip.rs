//! # Wire Round-Trip Tests
//!
//! Encodes synthetic frames with the reference encoder and checks the
//! decoder reproduces them.

use lanescope_protocol::{
    Compression, CoordinateSystem, Frame, FrameDecoder, FrameEncoder, Group, Layer, Node,
    NodeBase, Object, ObjectType, PointFormat, PointList, ProtocolError, Topic, WireError, MAGIC,
};

fn lane(id: &str, points: usize) -> Node {
    let values: Vec<f32> = (0..points * 3).map(|i| i as f32 * 0.1).collect();
    Node::Object(Object {
        base: NodeBase::new(id, format!("lane {id}")),
        object_type: ObjectType::LineList,
        sub_type: 3,
        position: [0.0, 1.0, 0.0],
        rotation: [0.0, 0.0, 1.57],
        size: [1.0, 1.0, 1.0],
        color: [255, 255, 0, 200],
        points: Some(PointList::from_f32(PointFormat::XyzF32, values)),
    })
}

fn sample_frame() -> Frame {
    let mut frame = Frame::new(1234, 17.125);
    frame.coordinate_system = CoordinateSystem::RightHandedYUp;

    let mut lanes = Layer {
        base: NodeBase::new("lanes", "Lane Lines"),
        topics: Vec::new(),
    };
    lanes.base.properties.push(("source".into(), "hdmap".into()));
    lanes.topics.push(Topic {
        id: "/perception/lanes".into(),
        frame_id: 1234,
        root: Some(Node::Group(Group {
            base: NodeBase::new("ego-lanes", "Ego lanes"),
            children: vec![lane("l0", 12), lane("l1", 5)],
        })),
    });
    lanes.topics.push(Topic {
        id: "/perception/silent".into(),
        frame_id: 1233,
        root: None,
    });

    let mut hidden = NodeBase::new("debug", "Debug");
    hidden.visible = false;
    hidden.view_mask = 0b10;
    let cloud = Node::Object(Object {
        base: NodeBase::new("cloud", "cloud"),
        object_type: ObjectType::PointCloud,
        points: Some(PointList::from_f32(
            PointFormat::XyziF32,
            vec![1.0, 2.0, 3.0, 0.5, 4.0, 5.0, 6.0, 0.25],
        )),
        ..Object::default()
    });
    frame.layers.push(lanes);
    frame.layers.push(Layer {
        base: hidden,
        topics: vec![Topic {
            id: "/lidar".into(),
            frame_id: 1234,
            root: Some(cloud),
        }],
    });
    frame
}

#[test]
fn roundtrip_zlib_frame() {
    let frame = sample_frame();
    let bytes = FrameEncoder::new().encode(&frame);

    let (decoded, report) = FrameDecoder::default().decode_with_report(&bytes).unwrap();

    assert!(report.is_complete(), "unexpected issues: {:?}", report.issues);
    assert_eq!(decoded, frame);
}

#[test]
fn roundtrip_raw_deflate_frame() {
    let frame = sample_frame();
    let bytes = FrameEncoder::with_compression(Compression::RawDeflate).encode(&frame);

    let decoded = FrameDecoder::default().decode(&bytes).unwrap();

    assert_eq!(decoded.id, frame.id);
    let Some(Node::Group(group)) = &decoded.layers[0].topics[0].root else {
        panic!("expected group root");
    };
    let Node::Object(l0) = &group.children[0] else {
        panic!("expected object");
    };
    let points = l0.points.as_ref().unwrap();
    assert_eq!(points.count, 12);
    for (i, v) in points.as_f32().unwrap().iter().enumerate() {
        assert!((v - i as f32 * 0.1).abs() < 1e-6);
    }
}

#[test]
fn string_length_of_50000_is_rejected() {
    let mut bytes = MAGIC.to_vec();
    bytes.extend_from_slice(&1u64.to_le_bytes());
    bytes.extend_from_slice(&0.0f64.to_le_bytes());
    bytes.push(0);
    bytes.extend_from_slice(&1u32.to_le_bytes());
    // Layer id claims 50000 bytes; the buffer holds far fewer.
    bytes.extend_from_slice(&50_000u16.to_le_bytes());
    bytes.extend_from_slice(&[b'a'; 16]);

    let (frame, report) = FrameDecoder::default().decode_with_report(&bytes).unwrap();

    assert!(frame.layers.is_empty());
    assert!(matches!(
        report.issues.as_slice(),
        [ProtocolError::PartialDecode {
            source: WireError::StringTooLong { len: 50_000, limit: 10_000, .. },
            ..
        }]
    ));
}

#[test]
fn truncated_frames_never_panic() {
    let bytes = FrameEncoder::new().encode(&sample_frame());
    let decoder = FrameDecoder::default();
    for cut in 0..bytes.len() {
        match decoder.decode_with_report(&bytes[..cut]) {
            Ok((frame, _)) => assert_eq!(frame.id, 1234),
            Err(err) => assert!(err.is_fatal()),
        }
    }
}
