//! Server configuration.

use crate::protocol::DEFAULT_MAX_LINE_LENGTH;
use crate::{DEFAULT_HOST, DEFAULT_PORT};
use std::time::Duration;
use thiserror::Error;

/// Errors produced by [`ServerConfig::validate`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("password must not be empty")]
    EmptyPassword,

    #[error("max line length must be greater than zero")]
    ZeroLineLength,

    #[error("expiry interval must be greater than zero")]
    ZeroExpiryInterval,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Port number (0 picks an ephemeral port)
    pub port: u16,
    /// Secret for `AUTH`; `None` means no client can authenticate
    pub password: Option<String>,
    /// Longest request line accepted before the connection is dropped
    pub max_line_length: usize,
    /// Run the background expiry sweeper
    pub active_expiry: bool,
    /// How often the sweeper runs
    pub expiry_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            password: None,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            active_expiry: false,
            expiry_interval: Duration::from_millis(100),
        }
    }
}

impl ServerConfig {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if matches!(self.password.as_deref(), Some("")) {
            return Err(ConfigError::EmptyPassword);
        }
        if self.max_line_length == 0 {
            return Err(ConfigError::ZeroLineLength);
        }
        if self.expiry_interval.is_zero() {
            return Err(ConfigError::ZeroExpiryInterval);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:6379");
        assert!(config.password.is_none());
        assert!(!config.active_expiry);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ServerConfig {
            password: Some(String::new()),
            ..ServerConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyPassword));

        let config = ServerConfig {
            max_line_length: 0,
            ..ServerConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroLineLength));

        let config = ServerConfig {
            expiry_interval: Duration::ZERO,
            ..ServerConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroExpiryInterval));
    }
}
