//! # Playback Error Types

use thiserror::Error;

/// Errors raised while wiring up playback.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// The decode worker thread could not be started.
    #[error("failed to spawn decode worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    /// A channel capacity of zero was requested.
    #[error("{what} capacity must be at least 1")]
    ZeroCapacity {
        /// Which channel.
        what: &'static str,
    },
}

/// Result type for playback setup.
pub type PlaybackResult<T> = Result<T, PlaybackError>;
