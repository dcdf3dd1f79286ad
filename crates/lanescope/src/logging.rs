//! # Logging
//!
//! Installs a `tracing-subscriber` fmt subscriber. `RUST_LOG` wins over the
//! configured filter.

use tracing_subscriber::EnvFilter;

use crate::config::ConfigError;

/// Installs the global subscriber.
///
/// Returns `Ok(false)` when a subscriber was already installed, which
/// happens when several tests share a process.
///
/// # Errors
///
/// [`ConfigError::Invalid`] when `filter` is not a valid directive.
pub fn init(filter: &str) -> Result<bool, ConfigError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(from_env) => from_env,
        Err(_) => EnvFilter::try_new(filter).map_err(|e| ConfigError::Invalid {
            field: "log_filter",
            reason: e.to_string(),
        })?,
    };

    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_names(true)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(filter, "logging initialized");
    }
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        assert!(init("warn").is_ok());
        assert_eq!(init("warn").ok(), Some(false));
    }
}
