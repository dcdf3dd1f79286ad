//! # LANESCOPE Playback
//!
//! Turns a stream of transport messages into scene updates, one render
//! tick at a time, honoring pause, single-step and seek.
//!
//! ## Architecture
//!
//! ```text
//!  transport thread          decode thread            render thread
//!  ────────────────          ─────────────            ─────────────
//!  FrameIntake ──raw──► DecodeWorker ──decoded──► PlaybackLoop::tick
//!                                                   ├─ AdmissionController
//!  PlaybackHandle ─────────commands───────────────► ├─ DecodeHealth
//!                                                   └─ SceneStore
//! ```

#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod admission;
pub mod control;
pub mod error;
pub mod health;
pub mod intake;
pub mod playback_loop;

pub use admission::{
    Admission, AdmissionController, AdmissionStats, PlaybackState, DEFAULT_INERTIAL_CAPACITY,
};
pub use control::{control_channel, ControlCommand, PlaybackHandle};
pub use error::{PlaybackError, PlaybackResult};
pub use health::{DecodeHealth, Diagnostic, DEFAULT_FAILURE_THRESHOLD};
pub use intake::{
    DecodeWorker, DecodedMessage, FrameIntake, IntakeConfig, IntakeStats, TransportMessage,
    DEFAULT_CHANNEL_CAPACITY,
};
pub use playback_loop::{
    PlaybackConfig, PlaybackLoop, RunStats, TickReport, DEFAULT_TICK_RATE_HZ,
};
