//! # Decode Benchmark
//!
//! Measures frame decode throughput for typical perception frames:
//! a dense lidar cloud plus a few hundred lane and box objects.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lanescope_protocol::{
    Frame, FrameDecoder, FrameEncoder, Group, Layer, Node, NodeBase, Object, ObjectType,
    PointFormat, PointList, Topic,
};

fn build_frame(objects: usize, cloud_points: usize) -> Frame {
    let mut frame = Frame::new(1, 0.0);

    let children = (0..objects)
        .map(|i| {
            let values: Vec<f32> = (0..60).map(|v| (i * 60 + v) as f32).collect();
            Node::Object(Object {
                base: NodeBase::new(format!("obj-{i}"), "lane"),
                object_type: ObjectType::Polyline,
                points: Some(PointList::from_f32(PointFormat::XyzF32, values)),
                ..Object::default()
            })
        })
        .collect();

    frame.layers.push(Layer {
        base: NodeBase::new("lanes", "Lanes"),
        topics: vec![Topic {
            id: "/lanes".into(),
            frame_id: 1,
            root: Some(Node::Group(Group {
                base: NodeBase::new("all", "all"),
                children,
            })),
        }],
    });

    let cloud: Vec<f32> = (0..cloud_points * 4).map(|v| v as f32 * 0.01).collect();
    frame.layers.push(Layer {
        base: NodeBase::new("lidar", "Lidar"),
        topics: vec![Topic {
            id: "/lidar/top".into(),
            frame_id: 1,
            root: Some(Node::Object(Object {
                base: NodeBase::new("cloud", "cloud"),
                object_type: ObjectType::PointCloud,
                points: Some(PointList::from_f32(PointFormat::XyziF32, cloud)),
                ..Object::default()
            })),
        }],
    });

    frame
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode");
    let decoder = FrameDecoder::default();

    for (objects, cloud_points) in [(50, 10_000), (300, 60_000), (1_000, 120_000)] {
        let bytes = FrameEncoder::new().encode(&build_frame(objects, cloud_points));
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("objects", objects),
            &bytes,
            |b, bytes| {
                b.iter(|| decoder.decode(black_box(bytes)));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
