//! # Scene Change Notifications
//!
//! Rendering backends subscribe once and receive one [`SceneChanged`] per
//! applied frame. Each subscriber has its own bounded channel; a backend
//! that falls behind already has a pending notification, so overflow is
//! coalesced rather than queued.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Pending notifications kept per subscriber.
pub const SUBSCRIBER_CAPACITY: usize = 64;

/// Emitted once per store mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SceneChanged {
    /// Store generation after the change.
    pub generation: u64,
    /// Frame that caused the change, if any.
    pub frame_id: Option<u64>,
    /// Entries inserted or overwritten.
    pub upserted: usize,
    /// Entries deleted.
    pub removed: usize,
}

/// Fan-out of [`SceneChanged`] to subscribers.
#[derive(Debug, Default)]
pub struct SceneNotifier {
    subscribers: Vec<Sender<SceneChanged>>,
    coalesced: u64,
}

impl SceneNotifier {
    /// Creates a notifier with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber.
    pub fn subscribe(&mut self) -> Receiver<SceneChanged> {
        let (sender, receiver) = bounded(SUBSCRIBER_CAPACITY);
        self.subscribers.push(sender);
        receiver
    }

    /// Delivers `event` to every live subscriber.
    pub fn notify(&mut self, event: SceneChanged) {
        let mut coalesced = 0;
        self.subscribers.retain(|sender| match sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                coalesced += 1;
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
        self.coalesced += coalesced;
    }

    /// Live subscriber count.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Notifications dropped because a subscriber's channel was full.
    #[must_use]
    pub const fn coalesced(&self) -> u64 {
        self.coalesced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(generation: u64) -> SceneChanged {
        SceneChanged {
            generation,
            frame_id: Some(generation),
            upserted: 0,
            removed: 0,
        }
    }

    #[test]
    fn test_fan_out() {
        let mut notifier = SceneNotifier::new();
        let a = notifier.subscribe();
        let b = notifier.subscribe();

        notifier.notify(event(1));

        assert_eq!(a.try_recv().unwrap().generation, 1);
        assert_eq!(b.try_recv().unwrap().generation, 1);
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let mut notifier = SceneNotifier::new();
        let a = notifier.subscribe();
        drop(notifier.subscribe());

        notifier.notify(event(1));

        assert_eq!(notifier.subscriber_count(), 1);
        assert!(a.try_recv().is_ok());
    }

    #[test]
    fn test_full_subscriber_coalesces() {
        let mut notifier = SceneNotifier::new();
        let rx = notifier.subscribe();
        for g in 0..(SUBSCRIBER_CAPACITY as u64 + 3) {
            notifier.notify(event(g));
        }
        assert_eq!(notifier.coalesced(), 3);
        assert_eq!(rx.len(), SUBSCRIBER_CAPACITY);
    }
}
