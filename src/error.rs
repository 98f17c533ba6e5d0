// Copyright (c) 2026 Vela Contributors.
// Licensed under the MIT license.

//! Error types for the Vela gateway and session layers
//!
//! Every component boundary converts failures into one of these kinds.
//! Nothing here is allowed to propagate far enough to kill the server
//! process or leave a socket half-open; the routers and the fetch pipeline
//! catch and translate at their edges.

use std::fmt;

use thiserror::Error;

/// Result type alias for Vela operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Vela
#[derive(Error, Debug)]
pub enum Error {
    /// Direct network fetch failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Interception agent registration or activation failed
    #[error("Bootstrap failed for {engine}: {reason}")]
    Bootstrap { engine: String, reason: String },

    /// Multiplexed transport could not be configured; fatal for the
    /// current session attempt
    #[error("Transport configuration failed: {0}")]
    TransportConfig(String),

    /// A step of the fetch interception pipeline failed; the pipeline
    /// falls back to a direct fetch when it sees this
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// Tunnel wire-protocol failure on the server side; the connection
    /// is destroyed and the process continues
    #[error("Tunnel protocol error on {endpoint}: {reason}")]
    TunnelProtocol { endpoint: String, reason: String },

    /// Session config record could not be stored or decoded
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation exceeded its deadline
    #[error("Operation timed out after {duration_ms}ms: {operation}")]
    Timeout { operation: String, duration_ms: u64 },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP protocol plumbing error
    #[error("HTTP protocol error: {0}")]
    Protocol(#[from] hyper::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a bootstrap error
    pub fn bootstrap(engine: impl fmt::Display, reason: impl Into<String>) -> Self {
        Error::Bootstrap {
            engine: engine.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a transport configuration error
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Error::TransportConfig(msg.into())
    }

    /// Create a pipeline error
    pub fn pipeline<S: Into<String>>(msg: S) -> Self {
        Error::Pipeline(msg.into())
    }

    /// Create a tunnel protocol error
    pub fn tunnel(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::TunnelProtocol {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration_ms,
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Check if a later attempt may succeed (drives session retry UX)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. }
                | Error::Http(_)
                | Error::Bootstrap { .. }
                | Error::Pipeline(_)
        )
    }

    /// Check if this failure must surface as a session ERROR state
    /// rather than being absorbed by a fallback fetch
    pub fn is_fatal_for_session(&self) -> bool {
        matches!(self, Error::TransportConfig(_))
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_error() {
        let err = Error::bootstrap("ultraviolet", "agent became redundant");
        assert!(err.is_recoverable());
        assert!(!err.is_fatal_for_session());
        assert!(err.to_string().contains("ultraviolet"));
    }

    #[test]
    fn test_transport_error_is_fatal() {
        let err = Error::transport("mux worker failed to load");
        assert!(err.is_fatal_for_session());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_timeout_error() {
        let err = Error::timeout("agent activation", 10_000);
        assert!(err.is_timeout());
        assert!(err.is_recoverable());
    }
}
