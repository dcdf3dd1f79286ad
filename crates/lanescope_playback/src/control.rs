//! # Playback Control
//!
//! UI and RPC code drive playback through a [`PlaybackHandle`]. Commands
//! are queued and applied at the start of the next render tick.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Pending commands kept before new ones are refused.
pub const CONTROL_CAPACITY: usize = 256;

/// User-level playback commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlCommand {
    /// Resume; buffered frames are dropped.
    Play,
    /// Freeze the view; arrivals buffer in the inertial queue.
    Pause,
    /// While paused, reveal the next frame.
    StepForward,
    /// The producer jumped; drop everything buffered and show the first
    /// frame after the jump even when paused.
    Seek,
}

/// Cloneable sender of [`ControlCommand`]s.
#[derive(Clone, Debug)]
pub struct PlaybackHandle {
    sender: Sender<ControlCommand>,
}

impl PlaybackHandle {
    /// Queues a command. Returns false when the render side is gone or
    /// too far behind.
    pub fn send(&self, command: ControlCommand) -> bool {
        match self.sender.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(command)) => {
                tracing::warn!(?command, "control queue full, command dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Queues [`ControlCommand::Play`].
    pub fn play(&self) -> bool {
        self.send(ControlCommand::Play)
    }

    /// Queues [`ControlCommand::Pause`].
    pub fn pause(&self) -> bool {
        self.send(ControlCommand::Pause)
    }

    /// Queues [`ControlCommand::StepForward`].
    pub fn step_forward(&self) -> bool {
        self.send(ControlCommand::StepForward)
    }

    /// Queues [`ControlCommand::Seek`].
    pub fn seek(&self) -> bool {
        self.send(ControlCommand::Seek)
    }
}

/// Creates the control channel.
#[must_use]
pub fn control_channel() -> (PlaybackHandle, Receiver<ControlCommand>) {
    let (sender, receiver) = bounded(CONTROL_CAPACITY);
    (PlaybackHandle { sender }, receiver)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_arrive_in_order() {
        let (handle, rx) = control_channel();
        let other = handle.clone();
        handle.pause();
        other.step_forward();
        handle.play();

        let got: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            got,
            [ControlCommand::Pause, ControlCommand::StepForward, ControlCommand::Play]
        );
    }

    #[test]
    fn test_send_after_close() {
        let (handle, rx) = control_channel();
        drop(rx);
        assert!(!handle.seek());
    }
}
