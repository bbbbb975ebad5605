//! Error types for the behavior-control client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use std::time::Duration;
//! use behavior_control::{Connection, Result};
//!
//! fn example(conn: &Connection) -> Result<()> {
//!     conn.request_control(Duration::from_secs(5))?;
//!     conn.release_control()?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Startup | [`Error::Connection`], [`Error::IncompatibleVersion`] |
//! | Timeout | [`Error::ConnectionTimeout`], [`Error::ControlTimeout`] |
//! | Precondition | [`Error::RepeatedConnection`], [`Error::NotConnected`], [`Error::NoControl`], [`Error::WorkerContext`] |
//! | Stream | [`Error::ConnectionClosed`], [`Error::Protocol`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::protocol::VersionResult;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Every variant is `Send + 'static`, so errors raised on the background
/// context can be handed back to the calling thread.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when connection configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Startup Errors
    // ========================================================================
    /// Transport-level connection failure.
    ///
    /// Returned when the duplex stream cannot be opened.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Device speaks a protocol version this client does not support.
    #[error(
        "Incompatible protocol version: host reports {host_version} ({result:?}), client requires >= {min_supported}"
    )]
    IncompatibleVersion {
        /// Version reported by the device.
        host_version: u32,
        /// Negotiation result reported by the device.
        result: VersionResult,
        /// Minimum host version this client accepts.
        min_supported: u32,
    },

    // ========================================================================
    // Timeout Errors
    // ========================================================================
    /// The background context did not report readiness in time.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Control was not granted in time.
    ///
    /// The request stays outstanding on the device; a later grant is still
    /// reflected in the granted event.
    #[error("Control not granted within {timeout_ms}ms")]
    ControlTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Precondition Errors
    // ========================================================================
    /// `connect` called on a connection that is already open.
    #[error("Repeated connection made to an open connection")]
    RepeatedConnection,

    /// Operation requires an open connection.
    #[error("Not connected")]
    NotConnected,

    /// Operation requires behavior control, which is not currently held.
    #[error("Behavior control is not held by this client")]
    NoControl,

    /// A blocking operation was invoked from the connection's own worker thread.
    #[error("Blocking operation `{operation}` called from the connection worker thread")]
    WorkerContext {
        /// Name of the rejected operation.
        operation: &'static str,
    },

    // ========================================================================
    // Stream Errors
    // ========================================================================
    /// Control stream closed.
    ///
    /// Returned when the stream ends while an operation is pending.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Protocol violation or unexpected message.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

impl From<RecvError> for Error {
    fn from(_: RecvError) -> Self {
        Self::ConnectionClosed
    }
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a control timeout error.
    #[inline]
    pub fn control_timeout(timeout_ms: u64) -> Self {
        Self::ControlTimeout { timeout_ms }
    }

    /// Creates an incompatible version error.
    #[inline]
    pub fn incompatible_version(host_version: u32, result: VersionResult, min_supported: u32) -> Self {
        Self::IncompatibleVersion {
            host_version,
            result,
            min_supported,
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a worker context error.
    #[inline]
    pub fn worker_context(operation: &'static str) -> Self {
        Self::WorkerContext { operation }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::ControlTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry with a fresh call.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::ControlTimeout { .. }
        )
    }

    /// Returns `true` if this error is a caller precondition violation.
    #[inline]
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::RepeatedConnection
                | Self::NotConnected
                | Self::NoControl
                | Self::WorkerContext { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
