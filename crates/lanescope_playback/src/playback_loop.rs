//! # Playback Loop
//!
//! The render tick. Everything that mutates viewer state happens here, on
//! one thread.
//!
//! ## Tick Order
//!
//! ```text
//! 1. Apply queued control commands   (play / pause / step / seek)
//! 2. Drain decoded frames            → DecodeHealth + AdmissionController
//! 3. take_due()                      → at most one frame
//! 4. SceneStore::apply_frame         → one SceneChanged
//! ```

use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use lanescope_scene::{ApplySummary, SceneStore};

use crate::admission::{Admission, AdmissionController, DEFAULT_INERTIAL_CAPACITY};
use crate::control::ControlCommand;
use crate::health::{DecodeHealth, Diagnostic, DEFAULT_FAILURE_THRESHOLD};
use crate::intake::DecodedMessage;

/// Default render cadence.
pub const DEFAULT_TICK_RATE_HZ: u32 = 30;

/// Loop configuration.
#[derive(Clone, Copy, Debug)]
pub struct PlaybackConfig {
    /// Ticks per second for [`PlaybackLoop::run_for`].
    pub tick_rate_hz: u32,
    /// Inertial queue capacity.
    pub inertial_capacity: usize,
    /// Consecutive malformed frames before a diagnostic.
    pub failure_threshold: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
            inertial_capacity: DEFAULT_INERTIAL_CAPACITY,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

impl PlaybackConfig {
    /// Duration of one tick.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate_hz.max(1)
    }
}

/// What one tick did.
#[derive(Clone, Debug, Default)]
pub struct TickReport {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// Control commands applied.
    pub commands: usize,
    /// Decoded frames offered to admission.
    pub offered: usize,
    /// Offers rejected by a full inertial queue.
    pub rejected: usize,
    /// Messages whose header failed to decode.
    pub malformed: usize,
    /// Store update, when a frame was due.
    pub applied: Option<ApplySummary>,
    /// One-time diagnostics raised this tick.
    pub diagnostics: Vec<Diagnostic>,
}

/// Totals over [`PlaybackLoop::run_for`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Ticks executed.
    pub ticks: u64,
    /// Frames applied to the store.
    pub frames_applied: u64,
    /// Ticks that ran past their deadline.
    pub overruns: u64,
}

/// Render-thread owner of admission, health and the store.
pub struct PlaybackLoop {
    config: PlaybackConfig,
    controller: AdmissionController,
    health: DecodeHealth,
    store: SceneStore,
    frames: Receiver<DecodedMessage>,
    controls: Receiver<ControlCommand>,
    tick: u64,
}

impl PlaybackLoop {
    /// Creates a loop reading decoded frames and control commands.
    #[must_use]
    pub fn new(
        config: PlaybackConfig,
        frames: Receiver<DecodedMessage>,
        controls: Receiver<ControlCommand>,
    ) -> Self {
        Self {
            config,
            controller: AdmissionController::new(config.inertial_capacity),
            health: DecodeHealth::new(config.failure_threshold),
            store: SceneStore::new(),
            frames,
            controls,
            tick: 0,
        }
    }

    /// Runs one render tick.
    pub fn tick(&mut self) -> TickReport {
        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        while let Ok(command) = self.controls.try_recv() {
            self.apply_command(command);
            report.commands += 1;
        }

        while let Ok(message) = self.frames.try_recv() {
            match message.result {
                Ok((frame, decode)) => {
                    self.health.record_decoded(frame.id, &decode);
                    report.offered += 1;
                    if self.controller.offer(frame) == Admission::Rejected {
                        report.rejected += 1;
                    }
                }
                Err(error) => {
                    report.malformed += 1;
                    if let Some(diagnostic) = self.health.record_failure(&error) {
                        report.diagnostics.push(diagnostic);
                    }
                }
            }
        }

        if let Some(frame) = self.controller.take_due() {
            report.applied = Some(self.store.apply_frame(frame));
        }

        report
    }

    /// Applies a control command immediately.
    pub fn apply_command(&mut self, command: ControlCommand) {
        tracing::debug!(?command, tick = self.tick, "control");
        match command {
            ControlCommand::Play => self.controller.set_paused(false),
            ControlCommand::Pause => self.controller.set_paused(true),
            ControlCommand::StepForward => self.controller.arm_expected_frame(),
            ControlCommand::Seek => {
                let dropped = self.controller.discard_buffered();
                self.controller.arm_expected_frame();
                tracing::debug!(dropped, "seek");
            }
        }
    }

    /// Ticks at the configured cadence for `duration`.
    pub fn run_for(&mut self, duration: Duration) -> RunStats {
        let interval = self.config.tick_interval();
        let start = Instant::now();
        let mut next = start;
        let mut stats = RunStats::default();

        while start.elapsed() < duration {
            let report = self.tick();
            stats.ticks += 1;
            if report.applied.is_some() {
                stats.frames_applied += 1;
            }

            next += interval;
            let now = Instant::now();
            if next > now {
                thread::sleep(next - now);
            } else {
                stats.overruns += 1;
                next = now;
            }
        }

        tracing::info!(
            ticks = stats.ticks,
            applied = stats.frames_applied,
            overruns = stats.overruns,
            "playback run finished"
        );
        stats
    }

    /// The scene store.
    #[must_use]
    pub const fn store(&self) -> &SceneStore {
        &self.store
    }

    /// Mutable scene store, for visibility toggles and subscriptions.
    pub fn store_mut(&mut self) -> &mut SceneStore {
        &mut self.store
    }

    /// The admission controller.
    #[must_use]
    pub const fn controller(&self) -> &AdmissionController {
        &self.controller
    }

    /// Decode health.
    #[must_use]
    pub const fn health(&self) -> &DecodeHealth {
        &self.health
    }

    /// Ticks run so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::control_channel;
    use crossbeam_channel::{bounded, Sender};
    use lanescope_protocol::{DecodeReport, Frame, ProtocolError, WireError};

    fn send_frame(tx: &Sender<DecodedMessage>, id: u64) {
        tx.send(DecodedMessage {
            received_at: Instant::now(),
            result: Ok((Frame::new(id, 0.0), DecodeReport::default())),
        })
        .unwrap();
    }

    fn send_garbage(tx: &Sender<DecodedMessage>) {
        tx.send(DecodedMessage {
            received_at: Instant::now(),
            result: Err(ProtocolError::MalformedFrame(WireError::UnexpectedEof {
                offset: 0,
                needed: 2,
                remaining: 0,
            })),
        })
        .unwrap();
    }

    fn setup(config: PlaybackConfig) -> (PlaybackLoop, Sender<DecodedMessage>, crate::PlaybackHandle) {
        let (tx, rx) = bounded(64);
        let (handle, controls) = control_channel();
        (PlaybackLoop::new(config, rx, controls), tx, handle)
    }

    #[test]
    fn test_playing_applies_newest() {
        let (mut playback, tx, _handle) = setup(PlaybackConfig::default());
        send_frame(&tx, 1);
        send_frame(&tx, 2);

        let report = playback.tick();
        assert_eq!(report.offered, 2);
        assert_eq!(report.applied.map(|s| s.frame_id), Some(2));
        assert!(playback.tick().applied.is_none());
    }

    #[test]
    fn test_seek_drops_stale_and_shows_next() {
        let (mut playback, tx, handle) = setup(PlaybackConfig::default());
        handle.pause();
        playback.tick();
        send_frame(&tx, 1);
        playback.tick();
        assert_eq!(playback.controller().queued_len(), 1);

        handle.seek();
        send_frame(&tx, 50);
        let report = playback.tick();
        assert_eq!(report.applied.map(|s| s.frame_id), Some(50));
    }

    #[test]
    fn test_diagnostic_raised_once() {
        let config = PlaybackConfig {
            failure_threshold: 2,
            ..PlaybackConfig::default()
        };
        let (mut playback, tx, _handle) = setup(config);
        for _ in 0..5 {
            send_garbage(&tx);
        }
        let report = playback.tick();
        assert_eq!(report.malformed, 5);
        assert_eq!(report.diagnostics.len(), 1);
        assert!(report.applied.is_none());
    }

    #[test]
    fn test_run_for_ticks() {
        let config = PlaybackConfig {
            tick_rate_hz: 200,
            ..PlaybackConfig::default()
        };
        let (mut playback, tx, _handle) = setup(config);
        send_frame(&tx, 1);
        let stats = playback.run_for(Duration::from_millis(50));
        assert!(stats.ticks >= 1);
        assert_eq!(stats.frames_applied, 1);
    }
}
