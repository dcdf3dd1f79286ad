//! # Frame Intake
//!
//! Arrival side of the viewer. Transport messages come in on whatever
//! thread the connection runs on and leave as decoded frames on a bounded
//! channel read by the render tick.
//!
//! ```text
//! inline:  on_message ──decode──► [decoded channel] ──► render tick
//!
//! worker:  on_message ──► [raw channel] ──► DecodeWorker ──decode──►
//!                                           [decoded channel] ──► render tick
//! ```
//!
//! Neither side ever blocks: a full channel drops the message with a
//! warning.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use lanescope_protocol::{DecodeReport, DecoderLimits, Frame, FrameDecoder, ProtocolResult};
use parking_lot::Mutex;

use crate::error::{PlaybackError, PlaybackResult};

/// Default depth of the intake channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 8;

/// A message from the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportMessage {
    /// Encoded scene frame.
    Binary(Vec<u8>),
    /// Text control traffic; not interpreted here.
    Control(String),
}

/// A decode attempt handed to the render tick.
#[derive(Debug)]
pub struct DecodedMessage {
    /// When the bytes arrived.
    pub received_at: Instant,
    /// Decoded frame and its partial-failure report, or the header error.
    pub result: ProtocolResult<(Frame, DecodeReport)>,
}

/// Intake configuration.
#[derive(Clone, Copy, Debug)]
pub struct IntakeConfig {
    /// Decode on a dedicated thread instead of the arrival thread.
    pub use_worker: bool,
    /// Depth of each bounded channel.
    pub channel_capacity: usize,
    /// Decoder limits.
    pub limits: DecoderLimits,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            use_worker: true,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            limits: DecoderLimits::default(),
        }
    }
}

/// Intake counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IntakeStats {
    /// Binary messages received.
    pub received: u64,
    /// Control messages ignored.
    pub control_ignored: u64,
    /// Messages decoded.
    pub decoded: u64,
    /// Messages dropped on a full or closed channel.
    pub dropped: u64,
}

type SharedStats = Arc<Mutex<IntakeStats>>;

enum Mode {
    Inline {
        decoder: FrameDecoder,
        output: Sender<DecodedMessage>,
    },
    Worker(DecodeWorker),
}

/// Producer-side endpoint.
pub struct FrameIntake {
    mode: Mode,
    stats: SharedStats,
}

impl FrameIntake {
    /// Builds an intake and the receiver the render tick drains.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::ZeroCapacity`] for a zero channel capacity,
    /// [`PlaybackError::WorkerSpawn`] when the worker thread cannot start.
    pub fn new(config: IntakeConfig) -> PlaybackResult<(Self, Receiver<DecodedMessage>)> {
        if config.channel_capacity == 0 {
            return Err(PlaybackError::ZeroCapacity { what: "intake channel" });
        }
        let (output, decoded) = bounded(config.channel_capacity);
        let stats = SharedStats::default();
        let decoder = FrameDecoder::new(config.limits);

        let mode = if config.use_worker {
            Mode::Worker(DecodeWorker::spawn(
                decoder,
                config.channel_capacity,
                output,
                Arc::clone(&stats),
            )?)
        } else {
            Mode::Inline { decoder, output }
        };

        Ok((Self { mode, stats }, decoded))
    }

    /// Handles one transport message. Returns true when a binary message
    /// was accepted for decoding.
    pub fn on_message(&self, message: TransportMessage) -> bool {
        let bytes = match message {
            TransportMessage::Binary(bytes) => bytes,
            TransportMessage::Control(text) => {
                tracing::trace!(len = text.len(), "control message ignored");
                self.stats.lock().control_ignored += 1;
                return false;
            }
        };
        self.stats.lock().received += 1;

        match &self.mode {
            Mode::Inline { decoder, output } => {
                let message = decode(decoder, &bytes, Instant::now());
                self.stats.lock().decoded += 1;
                forward(output, message, &self.stats)
            }
            Mode::Worker(worker) => worker.submit(bytes, &self.stats),
        }
    }

    /// True when decoding happens on a worker thread.
    #[must_use]
    pub const fn uses_worker(&self) -> bool {
        matches!(self.mode, Mode::Worker(_))
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> IntakeStats {
        *self.stats.lock()
    }
}

/// Dedicated decode thread.
///
/// Dropping the worker closes its input and joins the thread once the
/// backlog is decoded.
pub struct DecodeWorker {
    input: Option<Sender<(Instant, Vec<u8>)>>,
    handle: Option<JoinHandle<()>>,
}

impl DecodeWorker {
    fn spawn(
        decoder: FrameDecoder,
        capacity: usize,
        output: Sender<DecodedMessage>,
        stats: SharedStats,
    ) -> PlaybackResult<Self> {
        let (input, raw) = bounded::<(Instant, Vec<u8>)>(capacity);
        let handle = thread::Builder::new()
            .name("lanescope-decode".into())
            .spawn(move || Self::run(&decoder, &raw, &output, &stats))?;

        Ok(Self {
            input: Some(input),
            handle: Some(handle),
        })
    }

    fn run(
        decoder: &FrameDecoder,
        raw: &Receiver<(Instant, Vec<u8>)>,
        output: &Sender<DecodedMessage>,
        stats: &SharedStats,
    ) {
        tracing::debug!("decode worker started");
        for (received_at, bytes) in raw {
            let message = decode(decoder, &bytes, received_at);
            stats.lock().decoded += 1;
            forward(output, message, stats);
        }
        tracing::debug!("decode worker stopped");
    }

    fn submit(&self, bytes: Vec<u8>, stats: &SharedStats) -> bool {
        let Some(input) = &self.input else {
            return false;
        };
        match input.try_send((Instant::now(), bytes)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                stats.lock().dropped += 1;
                tracing::warn!("decode worker backlog full, frame dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                stats.lock().dropped += 1;
                tracing::warn!("decode worker gone, frame dropped");
                false
            }
        }
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        drop(self.input.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("decode worker panicked");
            }
        }
    }
}

fn decode(decoder: &FrameDecoder, bytes: &[u8], received_at: Instant) -> DecodedMessage {
    DecodedMessage {
        received_at,
        result: decoder.decode_with_report(bytes),
    }
}

fn forward(output: &Sender<DecodedMessage>, message: DecodedMessage, stats: &SharedStats) -> bool {
    match output.try_send(message) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            stats.lock().dropped += 1;
            tracing::warn!("decoded frame channel full, frame dropped");
            false
        }
        Err(TrySendError::Disconnected(_)) => {
            stats.lock().dropped += 1;
            tracing::debug!("render side closed, frame dropped");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanescope_protocol::FrameEncoder;
    use std::time::Duration;

    fn encoded(id: u64) -> Vec<u8> {
        FrameEncoder::new().encode(&Frame::new(id, 0.0))
    }

    #[test]
    fn test_inline_decodes_on_caller_thread() {
        let config = IntakeConfig {
            use_worker: false,
            ..IntakeConfig::default()
        };
        let (intake, rx) = FrameIntake::new(config).unwrap();

        assert!(intake.on_message(TransportMessage::Binary(encoded(5))));
        let (frame, report) = rx.try_recv().unwrap().result.unwrap();
        assert_eq!(frame.id, 5);
        assert!(report.is_complete());
    }

    #[test]
    fn test_control_messages_are_ignored() {
        let config = IntakeConfig {
            use_worker: false,
            ..IntakeConfig::default()
        };
        let (intake, rx) = FrameIntake::new(config).unwrap();

        assert!(!intake.on_message(TransportMessage::Control("{\"op\":\"seek\"}".into())));
        assert!(rx.try_recv().is_err());
        assert_eq!(intake.stats().control_ignored, 1);
    }

    #[test]
    fn test_full_channel_drops() {
        let config = IntakeConfig {
            use_worker: false,
            channel_capacity: 1,
            ..IntakeConfig::default()
        };
        let (intake, _rx) = FrameIntake::new(config).unwrap();

        assert!(intake.on_message(TransportMessage::Binary(encoded(1))));
        assert!(!intake.on_message(TransportMessage::Binary(encoded(2))));
        assert_eq!(intake.stats().dropped, 1);
    }

    #[test]
    fn test_worker_decodes_in_order() {
        let (intake, rx) = FrameIntake::new(IntakeConfig::default()).unwrap();
        assert!(intake.uses_worker());

        for id in 0..3 {
            intake.on_message(TransportMessage::Binary(encoded(id)));
        }
        let ids: Vec<u64> = (0..3)
            .map(|_| {
                let msg = rx.recv_timeout(Duration::from_secs(5)).unwrap();
                msg.result.unwrap().0.id
            })
            .collect();
        assert_eq!(ids, [0, 1, 2]);
    }

    #[test]
    fn test_worker_passes_malformed_through() {
        let (intake, rx) = FrameIntake::new(IntakeConfig::default()).unwrap();
        intake.on_message(TransportMessage::Binary(vec![0xde, 0xad]));

        let msg = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(msg.result.is_err());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = IntakeConfig {
            channel_capacity: 0,
            ..IntakeConfig::default()
        };
        assert!(matches!(
            FrameIntake::new(config),
            Err(PlaybackError::ZeroCapacity { .. })
        ));
    }
}
