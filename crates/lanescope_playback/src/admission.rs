//! # Admission Controller
//!
//! Decides which decoded frame, if any, the render tick applies.
//!
//! ## Buffers
//!
//! ```text
//!            offer(frame)
//!                 │
//!      ┌──────────┴───────────┐
//!   Playing                 Paused
//!      │                      │
//!      ▼                      ▼
//! [latest slot]        [inertial queue]  FIFO, capacity N
//!  overwrite            reject newcomer when full
//! ```
//!
//! While playing, every tick shows the newest frame and older ones are
//! skipped. While paused, nothing is shown until a frame is armed; the
//! inertial queue keeps the frames right after the pause instant so that
//! stepping forward reveals them in order.

use std::collections::VecDeque;

use lanescope_protocol::Frame;

/// Default inertial queue capacity.
pub const DEFAULT_INERTIAL_CAPACITY: usize = 60;

/// Playback mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackState {
    /// Apply the newest frame each tick.
    #[default]
    Playing,
    /// Apply only armed frames.
    Paused,
}

/// Outcome of [`AdmissionController::offer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Stored in the latest slot.
    Latest {
        /// A frame that was never shown got overwritten.
        replaced: bool,
    },
    /// Appended to the inertial queue.
    Queued,
    /// Inertial queue full; the frame was dropped.
    Rejected,
}

/// Counters since construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdmissionStats {
    /// Frames offered.
    pub offered: u64,
    /// Latest-slot frames overwritten before being shown.
    pub replaced: u64,
    /// Frames pushed to the inertial queue.
    pub queued: u64,
    /// Frames rejected by a full inertial queue.
    pub rejected: u64,
    /// Frames handed to the render tick.
    pub delivered: u64,
    /// Buffered frames thrown away by resume or seek.
    pub discarded: u64,
}

/// Latest slot plus inertial queue.
#[derive(Debug)]
pub struct AdmissionController {
    state: PlaybackState,
    armed: bool,
    latest: Option<Frame>,
    inertial: VecDeque<Frame>,
    capacity: usize,
    stats: AdmissionStats,
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new(DEFAULT_INERTIAL_CAPACITY)
    }
}

impl AdmissionController {
    /// Creates a playing controller with the given inertial capacity.
    ///
    /// A capacity of zero is raised to one so paused steps can still deliver.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: PlaybackState::Playing,
            armed: false,
            latest: None,
            inertial: VecDeque::with_capacity(capacity),
            capacity,
            stats: AdmissionStats::default(),
        }
    }

    /// Current mode.
    #[must_use]
    #[inline]
    pub const fn state(&self) -> PlaybackState {
        self.state
    }

    /// True while paused.
    #[must_use]
    #[inline]
    pub const fn is_paused(&self) -> bool {
        matches!(self.state, PlaybackState::Paused)
    }

    /// True when the next tick may release one frame while paused.
    #[must_use]
    #[inline]
    pub const fn is_armed(&self) -> bool {
        self.armed
    }

    /// Pauses or resumes.
    ///
    /// Pausing keeps every buffer. Resuming drops the inertial queue, the
    /// latest slot and the arm flag, so playback restarts from the next
    /// arrival. Repeating the current mode does nothing.
    pub fn set_paused(&mut self, paused: bool) {
        match (self.state, paused) {
            (PlaybackState::Playing, true) => {
                self.state = PlaybackState::Paused;
                tracing::debug!(queued = self.inertial.len(), "playback paused");
            }
            (PlaybackState::Paused, false) => {
                self.state = PlaybackState::Playing;
                let dropped = self.discard_buffered();
                self.armed = false;
                tracing::debug!(dropped, "playback resumed");
            }
            _ => {}
        }
    }

    /// Allows exactly one frame through on the next paused tick.
    pub fn arm_expected_frame(&mut self) {
        if self.is_paused() {
            self.armed = true;
        } else {
            tracing::trace!("arm ignored while playing");
        }
    }

    /// Admits a freshly decoded frame.
    pub fn offer(&mut self, frame: Frame) -> Admission {
        self.stats.offered += 1;
        match self.state {
            PlaybackState::Playing => {
                let replaced = self.latest.replace(frame).is_some();
                if replaced {
                    self.stats.replaced += 1;
                }
                Admission::Latest { replaced }
            }
            PlaybackState::Paused => {
                if self.inertial.len() < self.capacity {
                    self.inertial.push_back(frame);
                    self.stats.queued += 1;
                    Admission::Queued
                } else {
                    self.stats.rejected += 1;
                    tracing::trace!(frame_id = frame.id, "inertial queue full, frame rejected");
                    Admission::Rejected
                }
            }
        }
    }

    /// Frame the current render tick should apply.
    pub fn take_due(&mut self) -> Option<Frame> {
        let frame = match self.state {
            PlaybackState::Playing => self.latest.take(),
            PlaybackState::Paused if self.armed => {
                let frame = self.inertial.pop_front().or_else(|| self.latest.take());
                if frame.is_some() {
                    self.armed = false;
                }
                frame
            }
            PlaybackState::Paused => None,
        };
        if frame.is_some() {
            self.stats.delivered += 1;
        }
        frame
    }

    /// Drops the inertial queue and the latest slot, returning how many
    /// frames were thrown away.
    pub fn discard_buffered(&mut self) -> usize {
        let dropped = self.inertial.len() + usize::from(self.latest.is_some());
        self.inertial.clear();
        self.latest = None;
        self.stats.discarded += dropped as u64;
        dropped
    }

    /// Frames waiting in the inertial queue.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.inertial.len()
    }

    /// True when the latest slot is occupied.
    #[must_use]
    pub const fn has_latest(&self) -> bool {
        self.latest.is_some()
    }

    /// Inertial queue capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Counters.
    #[must_use]
    pub const fn stats(&self) -> &AdmissionStats {
        &self.stats
    }
}
