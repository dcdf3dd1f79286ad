//! # Viewer
//!
//! Wires a [`ViewerConfig`] into a running viewer core: the intake that
//! the transport feeds, and the render-side loop with its control handle.

use std::time::Duration;

use crossbeam_channel::Receiver;
use lanescope_playback::{
    control_channel, FrameIntake, PlaybackError, PlaybackHandle, PlaybackLoop, RunStats,
    TickReport,
};
use lanescope_scene::{SceneChanged, SceneStore};
use thiserror::Error;

use crate::config::{ConfigError, ViewerConfig};

/// Errors raised while building a viewer.
#[derive(Error, Debug)]
pub enum ViewerError {
    /// Configuration rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Intake could not start.
    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

/// Render-side half of the viewer.
pub struct Viewer {
    playback: PlaybackLoop,
    handle: PlaybackHandle,
    scene_events: Receiver<SceneChanged>,
}

impl Viewer {
    /// Builds the viewer and the intake the transport should feed.
    ///
    /// # Errors
    ///
    /// [`ViewerError::Config`] for an invalid configuration,
    /// [`ViewerError::Playback`] when the decode worker cannot start.
    pub fn build(config: &ViewerConfig) -> Result<(Self, FrameIntake), ViewerError> {
        config.validate()?;
        let (intake, decoded) = FrameIntake::new(config.intake_config())?;
        let (handle, controls) = control_channel();
        let mut playback = PlaybackLoop::new(config.playback_config(), decoded, controls);
        let scene_events = playback.store_mut().subscribe();

        tracing::info!(
            worker = intake.uses_worker(),
            tick_rate_hz = config.playback.tick_rate_hz,
            inertial_capacity = config.playback.inertial_capacity,
            "viewer ready"
        );

        Ok((
            Self {
                playback,
                handle,
                scene_events,
            },
            intake,
        ))
    }

    /// A control handle for UI or RPC code.
    #[must_use]
    pub fn handle(&self) -> PlaybackHandle {
        self.handle.clone()
    }

    /// Runs one render tick.
    pub fn tick(&mut self) -> TickReport {
        self.playback.tick()
    }

    /// Ticks at the configured cadence for `duration`.
    pub fn run_for(&mut self, duration: Duration) -> RunStats {
        self.playback.run_for(duration)
    }

    /// Drains pending scene notifications, returning the newest.
    pub fn poll_scene_changes(&self) -> Option<SceneChanged> {
        self.scene_events.try_iter().last()
    }

    /// The scene store.
    #[must_use]
    pub const fn store(&self) -> &SceneStore {
        self.playback.store()
    }

    /// Mutable scene store.
    pub fn store_mut(&mut self) -> &mut SceneStore {
        self.playback.store_mut()
    }

    /// The render loop.
    #[must_use]
    pub const fn playback(&self) -> &PlaybackLoop {
        &self.playback
    }
}
