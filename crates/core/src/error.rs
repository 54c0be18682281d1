// SPDX-FileCopyrightText: © 2026 Airwave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured error types for Airwave.
//!
//! This module provides a hierarchy of error types for better error handling
//! and programmatic error inspection. All errors implement `Display` and can
//! be converted to/from `String` for backward compatibility.

use thiserror::Error;

/// Main error type for Airwave operations.
///
/// This enum categorizes errors into distinct types to enable better error
/// handling, logging, and recovery strategies.
#[derive(Debug, Error)]
pub enum AirwaveError {
    /// Configuration or parameter validation error.
    ///
    /// Examples:
    /// - Missing required configuration keys (PORT, FULLCHAIN, ...)
    /// - A station configured without a directory
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Container or codec parse error.
    ///
    /// Examples:
    /// - A track that does not start with an Ogg capture pattern
    /// - A truncated page header or segment table
    #[error("Parse error: {0}")]
    Parse(String),

    /// Station-level failure.
    ///
    /// Examples:
    /// - The audio directory is empty at tick time
    /// - The station actor has already shut down
    #[error("Station error: {0}")]
    Station(String),

    /// Runtime processing error during normal operation.
    ///
    /// Examples:
    /// - A mailbox peer that disappeared mid-request
    /// - A broadcast buffer released more times than it was inserted for
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Network-related error (sockets, HTTP, WebSocket).
    #[error("Network error: {0}")]
    Network(String),

    /// I/O error (file operations, directory scans).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results using `AirwaveError`.
pub type Result<T> = std::result::Result<T, AirwaveError>;

// Backward compatibility: Allow conversion from AirwaveError to String
impl From<AirwaveError> for String {
    fn from(err: AirwaveError) -> Self {
        err.to_string()
    }
}

// Generic string errors default to Runtime
impl From<String> for AirwaveError {
    fn from(s: String) -> Self {
        Self::Runtime(s)
    }
}

impl From<&str> for AirwaveError {
    fn from(s: &str) -> Self {
        Self::Runtime(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AirwaveError::Configuration("PORT missing".to_string());
        assert_eq!(err.to_string(), "Configuration error: PORT missing");

        let err = AirwaveError::Parse("bad capture pattern".to_string());
        assert_eq!(err.to_string(), "Parse error: bad capture pattern");
    }

    #[test]
    fn test_error_to_string_conversion() {
        let err = AirwaveError::Station("audio directory is empty".to_string());
        let s: String = err.into();
        assert_eq!(s, "Station error: audio directory is empty");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: AirwaveError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
        assert!(err.to_string().contains("File not found"));
    }
}
