//! # Decode Health
//!
//! Single bad frames are expected on a lossy stream and only logged. A run
//! of malformed frames means the producer or the link is broken, which is
//! reported upward exactly once until decoding recovers.

use lanescope_protocol::{DecodeReport, ProtocolError};
use thiserror::Error;

/// Consecutive malformed frames before a diagnostic is raised.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 30;

/// One-time conditions surfaced to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Decoding keeps failing.
    #[error("{consecutive} consecutive frames failed to decode (last: {last_error})")]
    PersistentDecodeFailure {
        /// Failures in a row when raised.
        consecutive: u32,
        /// Most recent error, rendered.
        last_error: String,
    },
}

/// Consecutive-failure tracker.
#[derive(Debug)]
pub struct DecodeHealth {
    threshold: u32,
    consecutive: u32,
    reported: bool,
    malformed_total: u64,
    partial_total: u64,
    decoded_total: u64,
}

impl Default for DecodeHealth {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }
}

impl DecodeHealth {
    /// Creates a tracker; a threshold of zero is treated as one.
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive: 0,
            reported: false,
            malformed_total: 0,
            partial_total: 0,
            decoded_total: 0,
        }
    }

    /// Records a frame whose header decoded.
    pub fn record_decoded(&mut self, frame_id: u64, report: &DecodeReport) {
        self.decoded_total += 1;
        if !report.is_complete() {
            self.partial_total += 1;
            tracing::debug!(
                frame_id,
                issues = report.issues.len(),
                layers_dropped = report.layers_dropped,
                topics_dropped = report.topics_dropped,
                geometry_failures = report.geometry_failures,
                "partial frame"
            );
        }
        if self.consecutive > 0 {
            tracing::info!(after = self.consecutive, "decoding recovered");
        }
        self.consecutive = 0;
        self.reported = false;
    }

    /// Records a rejected frame and returns a diagnostic the first time
    /// the threshold is reached.
    pub fn record_failure(&mut self, error: &ProtocolError) -> Option<Diagnostic> {
        self.malformed_total += 1;
        self.consecutive = self.consecutive.saturating_add(1);
        tracing::debug!(%error, consecutive = self.consecutive, "frame dropped");

        if self.reported || self.consecutive < self.threshold {
            return None;
        }
        self.reported = true;
        let diagnostic = Diagnostic::PersistentDecodeFailure {
            consecutive: self.consecutive,
            last_error: error.to_string(),
        };
        tracing::error!(%diagnostic, "persistent decode failure");
        Some(diagnostic)
    }

    /// Current failure run.
    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive
    }

    /// Frames rejected since construction.
    #[must_use]
    pub const fn malformed_total(&self) -> u64 {
        self.malformed_total
    }

    /// Frames decoded with dropped subtrees.
    #[must_use]
    pub const fn partial_total(&self) -> u64 {
        self.partial_total
    }

    /// Frames whose header decoded.
    #[must_use]
    pub const fn decoded_total(&self) -> u64 {
        self.decoded_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanescope_protocol::WireError;

    fn bad() -> ProtocolError {
        ProtocolError::MalformedFrame(WireError::BadMagic {
            expected: *b"LS",
            found: *b"XX",
        })
    }

    #[test]
    fn test_reports_once() {
        let mut health = DecodeHealth::new(3);
        assert!(health.record_failure(&bad()).is_none());
        assert!(health.record_failure(&bad()).is_none());
        assert!(health.record_failure(&bad()).is_some());
        assert!(health.record_failure(&bad()).is_none());
        assert_eq!(health.malformed_total(), 4);
    }

    #[test]
    fn test_success_rearms() {
        let mut health = DecodeHealth::new(2);
        health.record_failure(&bad());
        assert!(health.record_failure(&bad()).is_some());

        health.record_decoded(1, &DecodeReport::default());
        assert_eq!(health.consecutive_failures(), 0);

        health.record_failure(&bad());
        assert!(health.record_failure(&bad()).is_some());
    }

    #[test]
    fn test_partial_frames_are_not_failures() {
        let mut health = DecodeHealth::new(1);
        let mut report = DecodeReport::default();
        report.layers_dropped = 1;
        report.issues.push(ProtocolError::GeometryDecompressionFailure {
            compressed_len: 4,
            reason: "corrupt".into(),
        });
        health.record_decoded(1, &report);
        assert_eq!(health.partial_total(), 1);
        assert_eq!(health.consecutive_failures(), 0);
    }
}
