//! # Synthetic Producer
//!
//! Deterministic stand-in for a playback server. Emits encoded frames with
//! three layers:
//!
//! ```text
//! lanes    /perception/lanes   group "ego"      Polyline × lanes   (XYZ)
//! objects  /perception/tracks  group "tracked"  Cube × boxes
//! lidar    /lidar/points       root object      PointCloud (XYZI)
//! ```
//!
//! The lidar layer is only sent every `lidar_every` frames, so most frames
//! are partial and rely on the store keeping the last cloud.

use lanescope_playback::TransportMessage;
use lanescope_protocol::{
    Compression, Frame, FrameEncoder, Group, Layer, Node, NodeBase, Object, ObjectType,
    PointFormat, PointList, Topic,
};

/// Shape of the generated stream.
#[derive(Clone, Copy, Debug)]
pub struct ProducerConfig {
    /// Lane lines per frame.
    pub lanes: usize,
    /// Points per lane line.
    pub points_per_lane: usize,
    /// Tracked boxes per frame.
    pub boxes: usize,
    /// Points in the lidar cloud.
    pub cloud_points: usize,
    /// Send the lidar layer every N frames; 0 never sends it.
    pub lidar_every: u64,
    /// Replace every N-th message with garbage; 0 disables.
    pub corrupt_every: u64,
    /// Simulated stream rate, used for timestamps.
    pub rate_hz: u32,
    /// Point payload framing.
    pub compression: Compression,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            lanes: 4,
            points_per_lane: 12,
            boxes: 6,
            cloud_points: 2048,
            lidar_every: 5,
            corrupt_every: 0,
            rate_hz: 60,
            compression: Compression::Zlib,
        }
    }
}

/// Frame generator.
#[derive(Debug)]
pub struct SyntheticProducer {
    config: ProducerConfig,
    encoder: FrameEncoder,
    next_id: u64,
}

impl SyntheticProducer {
    /// Creates a producer starting at frame 1.
    #[must_use]
    pub const fn new(config: ProducerConfig) -> Self {
        Self {
            encoder: FrameEncoder::with_compression(config.compression),
            config,
            next_id: 1,
        }
    }

    /// Id the next frame will carry.
    #[must_use]
    pub const fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Jumps the stream, as a server does after a seek.
    pub fn seek_to(&mut self, frame_id: u64) {
        self.next_id = frame_id;
    }

    /// Builds the next frame without encoding it.
    pub fn next_frame(&mut self) -> Frame {
        let id = self.next_id;
        self.next_id += 1;
        self.build(id)
    }

    /// Builds and encodes the next frame.
    pub fn next_message(&mut self) -> TransportMessage {
        let id = self.next_id;
        if self.config.corrupt_every != 0 && id % self.config.corrupt_every == 0 {
            self.next_id += 1;
            let mut bytes = b"corrupt".to_vec();
            bytes.extend_from_slice(&id.to_le_bytes());
            return TransportMessage::Binary(bytes);
        }
        let frame = self.next_frame();
        TransportMessage::Binary(self.encoder.encode(&frame))
    }

    fn build(&self, id: u64) -> Frame {
        let t = id as f64 / f64::from(self.config.rate_hz.max(1));
        let mut frame = Frame::new(id, t);
        frame.layers.push(self.lane_layer(id, t as f32));
        frame.layers.push(self.object_layer(id, t as f32));
        if self.config.lidar_every != 0 && id % self.config.lidar_every == 1 % self.config.lidar_every {
            frame.layers.push(self.lidar_layer(id, t as f32));
        }
        frame
    }

    fn lane_layer(&self, id: u64, t: f32) -> Layer {
        let lanes = (0..self.config.lanes)
            .map(|lane| {
                let offset = lane as f32 * 3.5 - 5.25;
                let values = (0..self.config.points_per_lane)
                    .flat_map(|i| {
                        let x = i as f32 * 2.0;
                        [x, offset + 0.2 * (x * 0.1 + t).sin(), 0.0]
                    })
                    .collect();
                let dashed = lane % 2 == 1;
                let mut base = NodeBase::new(format!("lane-{lane}"), format!("Lane {lane}"));
                let style = if dashed { "dashed" } else { "solid" };
                base.properties.push(("style".into(), style.into()));
                Node::Object(Object {
                    base,
                    object_type: ObjectType::Polyline,
                    sub_type: u32::from(dashed),
                    color: [255, 255, 255, 255],
                    size: [0.15, 0.0, 0.0],
                    points: Some(PointList::from_f32(PointFormat::XyzF32, values)),
                    ..Object::default()
                })
            })
            .collect();

        layer("lanes", "Lane Lines", "/perception/lanes", id, group("ego", lanes))
    }

    fn object_layer(&self, id: u64, t: f32) -> Layer {
        let boxes = (0..self.config.boxes)
            .map(|i| {
                let phase = i as f32 * 1.3;
                Node::Object(Object {
                    base: NodeBase::new(format!("track-{i}"), format!("Track {i}")),
                    object_type: ObjectType::Cube,
                    sub_type: 1,
                    position: [10.0 + 8.0 * i as f32 + 2.0 * t, 3.0 * (t + phase).sin(), 0.8],
                    rotation: [0.0, 0.0, 0.1 * (t + phase).cos()],
                    size: [4.5, 1.9, 1.6],
                    color: [0, 160, 255, 180],
                    ..Object::default()
                })
            })
            .collect();

        layer("objects", "Objects", "/perception/tracks", id, group("tracked", boxes))
    }

    fn lidar_layer(&self, id: u64, t: f32) -> Layer {
        let n = self.config.cloud_points;
        let values = (0..n)
            .flat_map(|i| {
                let a = i as f32 / n.max(1) as f32 * std::f32::consts::TAU;
                let r = 20.0 + 5.0 * (a * 7.0 + t).sin();
                [r * a.cos(), r * a.sin(), 0.5 * (a * 3.0).sin(), (i % 256) as f32 / 255.0]
            })
            .collect();
        let cloud = Node::Object(Object {
            base: NodeBase::new("lidar-cloud", "Lidar"),
            object_type: ObjectType::PointCloud,
            color: [200, 200, 200, 255],
            points: Some(PointList::from_f32(PointFormat::XyziF32, values)),
            ..Object::default()
        });

        let mut lidar = layer("lidar", "Lidar", "/lidar/points", id, cloud);
        lidar.base.view_mask = 0b01;
        lidar
    }
}

fn group(id: &str, children: Vec<Node>) -> Node {
    Node::Group(Group {
        base: NodeBase::new(id, id),
        children,
    })
}

fn layer(id: &str, name: &str, topic: &str, frame_id: u64, root: Node) -> Layer {
    Layer {
        base: NodeBase::new(id, name),
        topics: vec![Topic {
            id: topic.to_owned(),
            frame_id,
            root: Some(root),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanescope_protocol::FrameDecoder;

    #[test]
    fn test_lidar_cadence() {
        let mut producer = SyntheticProducer::new(ProducerConfig {
            lidar_every: 3,
            ..ProducerConfig::default()
        });
        let layer_counts: Vec<usize> = (0..6).map(|_| producer.next_frame().layers.len()).collect();
        assert_eq!(layer_counts, [3, 2, 2, 3, 2, 2]);
    }

    #[test]
    fn test_messages_decode() {
        let mut producer = SyntheticProducer::new(ProducerConfig::default());
        let TransportMessage::Binary(bytes) = producer.next_message() else {
            panic!("expected binary");
        };
        let frame = FrameDecoder::default().decode(&bytes).unwrap();
        assert_eq!(frame.id, 1);
        assert_eq!(frame.object_count(), 4 + 6 + 1);
    }

    #[test]
    fn test_corrupt_every() {
        let mut producer = SyntheticProducer::new(ProducerConfig {
            corrupt_every: 2,
            ..ProducerConfig::default()
        });
        let decoder = FrameDecoder::default();
        let ok: Vec<bool> = (0..4)
            .map(|_| match producer.next_message() {
                TransportMessage::Binary(bytes) => decoder.decode(&bytes).is_ok(),
                TransportMessage::Control(_) => false,
            })
            .collect();
        assert_eq!(ok, [true, false, true, false]);
    }
}
