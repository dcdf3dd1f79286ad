//! # LANESCOPE
//!
//! Streaming scene viewer core. A playback server sends binary scene
//! frames; the viewer decodes them, decides per render tick which one to
//! show, and keeps a flattened scene for rendering backends.
//!
//! ## Crates
//!
//! ```text
//! lanescope_protocol   wire format, decoder, reference encoder
//! lanescope_scene      incremental scene store + group index
//! lanescope_playback   intake, admission, health, render tick
//! lanescope            config, logging, Viewer, synthetic producer
//! ```

#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod logging;
pub mod producer;
pub mod viewer;

pub use config::{ConfigError, ViewerConfig};
pub use producer::{ProducerConfig, SyntheticProducer};
pub use viewer::{Viewer, ViewerError};

pub use lanescope_playback as playback;
pub use lanescope_protocol as protocol;
pub use lanescope_scene as scene;
