//! Structured logging setup.
//!
//! The library itself only emits `tracing` events; the owning process calls
//! [`init_logging`] once to route them to stderr.

use tracing_subscriber::fmt;

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};

/// Install a global fmt subscriber built from `config`.
///
/// # Errors
/// Returns `ConfigError` if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    fmt()
        .with_max_level(config.log_level)
        .with_target(config.show_targets)
        .with_ansi(config.ansi_colors)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| ProtocolError::ConfigError(format!("Failed to install logger: {e}")))?;

    tracing::debug!(app = %config.app_name, level = %config.log_level, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_second_install_is_reported() {
        let config = LoggingConfig {
            ansi_colors: false,
            ..LoggingConfig::default()
        };
        // Only one test in this binary installs a subscriber
        assert!(init_logging(&config).is_ok());

        let err = init_logging(&config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.to_string().contains("Failed to install logger"));
    }
}
