//! # Viewer Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an
//! empty file is a valid configuration.
//!
//! ```toml
//! log_filter = "info,lanescope_protocol=debug"
//!
//! [playback]
//! tick_rate_hz = 30
//! inertial_capacity = 60
//! failure_threshold = 30
//!
//! [intake]
//! use_worker = true
//! channel_capacity = 8
//!
//! [decoder]
//! max_depth = 64
//! max_string_len = 10000
//! max_point_bytes = 67108864
//! ```

use std::path::{Path, PathBuf};

use lanescope_playback::{
    IntakeConfig, PlaybackConfig, DEFAULT_CHANNEL_CAPACITY, DEFAULT_FAILURE_THRESHOLD,
    DEFAULT_INERTIAL_CAPACITY, DEFAULT_TICK_RATE_HZ,
};
use lanescope_protocol::decoder::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_STRING_LEN};
use lanescope_protocol::geometry::DEFAULT_MAX_POINT_BYTES;
use lanescope_protocol::DecoderLimits;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default tracing filter.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The TOML is malformed or has wrong types.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Render-tick settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSection {
    /// Render ticks per second.
    pub tick_rate_hz: u32,
    /// Frames kept while paused.
    pub inertial_capacity: usize,
    /// Consecutive malformed frames before a diagnostic.
    pub failure_threshold: u32,
}

impl Default for PlaybackSection {
    fn default() -> Self {
        Self {
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
            inertial_capacity: DEFAULT_INERTIAL_CAPACITY,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

/// Arrival-side settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeSection {
    /// Decode on a dedicated thread.
    pub use_worker: bool,
    /// Depth of the handoff channels.
    pub channel_capacity: usize,
}

impl Default for IntakeSection {
    fn default() -> Self {
        Self {
            use_worker: true,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Decoder limits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderSection {
    /// Maximum node nesting.
    pub max_depth: usize,
    /// Maximum string length in bytes.
    pub max_string_len: usize,
    /// Maximum inflated size of one point list.
    pub max_point_bytes: usize,
}

impl Default for DecoderSection {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_string_len: DEFAULT_MAX_STRING_LEN,
            max_point_bytes: DEFAULT_MAX_POINT_BYTES,
        }
    }
}

/// Complete viewer configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// `tracing` filter directive; `RUST_LOG` overrides it.
    pub log_filter: String,
    /// Render tick.
    pub playback: PlaybackSection,
    /// Arrival side.
    pub intake: IntakeSection,
    /// Decoder limits.
    pub decoder: DecoderSection,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            playback: PlaybackSection::default(),
            intake: IntakeSection::default(),
            decoder: DecoderSection::default(),
        }
    }
}

impl ViewerConfig {
    /// Parses and validates TOML text.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] when the file cannot be read, otherwise as
    /// [`Self::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.playback.tick_rate_hz == 0 {
            return Err(invalid("playback.tick_rate_hz", "must be at least 1"));
        }
        if self.playback.inertial_capacity == 0 {
            return Err(invalid(
                "playback.inertial_capacity",
                "must be at least 1 so paused steps can deliver a frame",
            ));
        }
        if self.playback.failure_threshold == 0 {
            return Err(invalid("playback.failure_threshold", "must be at least 1"));
        }
        if self.intake.channel_capacity == 0 {
            return Err(invalid("intake.channel_capacity", "must be at least 1"));
        }
        if self.decoder.max_depth == 0 {
            return Err(invalid("decoder.max_depth", "must be at least 1"));
        }
        Ok(())
    }

    /// Decoder limits.
    #[must_use]
    pub const fn decoder_limits(&self) -> DecoderLimits {
        DecoderLimits {
            max_depth: self.decoder.max_depth,
            max_string_len: self.decoder.max_string_len,
            max_point_bytes: self.decoder.max_point_bytes,
        }
    }

    /// Render-tick configuration.
    #[must_use]
    pub const fn playback_config(&self) -> PlaybackConfig {
        PlaybackConfig {
            tick_rate_hz: self.playback.tick_rate_hz,
            inertial_capacity: self.playback.inertial_capacity,
            failure_threshold: self.playback.failure_threshold,
        }
    }

    /// Intake configuration.
    #[must_use]
    pub const fn intake_config(&self) -> IntakeConfig {
        IntakeConfig {
            use_worker: self.intake.use_worker,
            channel_capacity: self.intake.channel_capacity,
            limits: self.decoder_limits(),
        }
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_default() {
        assert_eq!(ViewerConfig::from_toml_str("").unwrap(), ViewerConfig::default());
    }

    #[test]
    fn test_partial_section() {
        let config = ViewerConfig::from_toml_str(
            r#"
            [playback]
            inertial_capacity = 5

            [intake]
            use_worker = false
            "#,
        )
        .unwrap();

        assert_eq!(config.playback.inertial_capacity, 5);
        assert_eq!(config.playback.tick_rate_hz, DEFAULT_TICK_RATE_HZ);
        assert!(!config.intake_config().use_worker);
    }

    #[test]
    fn test_zero_tick_rate_rejected() {
        let err = ViewerConfig::from_toml_str("[playback]\ntick_rate_hz = 0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "playback.tick_rate_hz",
                ..
            }
        ));
    }

    #[test]
    fn test_zero_inertial_capacity_rejected() {
        let err = ViewerConfig::from_toml_str("[playback]\ninertial_capacity = 0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "playback.inertial_capacity",
                ..
            }
        ));
    }

    #[test]
    fn test_point_byte_cap_reaches_decoder() {
        let config = ViewerConfig::from_toml_str("[decoder]\nmax_point_bytes = 4096").unwrap();
        assert_eq!(config.intake_config().limits.max_point_bytes, 4096);
    }

    #[test]
    fn test_wrong_type_is_parse_error() {
        let err = ViewerConfig::from_toml_str("[intake]\nuse_worker = \"yes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = ViewerConfig::from_file("/nonexistent/lanescope.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
