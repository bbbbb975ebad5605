//! Per-connect options.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use behavior_control::ConnectOptions;
//!
//! // Observer session that never contends for control.
//! let options = ConnectOptions::passive().with_timeout(Duration::from_secs(5));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// ConnectOptions
// ============================================================================

/// Options for [`Connection::connect`](crate::Connection::connect).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Bound on the handshake and, with `request_control`, on the first grant.
    /// `connect` itself waits at most twice this long.
    pub timeout: Duration,

    /// Request control as part of connecting.
    ///
    /// Disable for observer sessions that must never take control from
    /// another client.
    pub request_control: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ConnectOptions {
    /// Default options: 10 s timeout, control requested on connect.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: DEFAULT_CONNECT_TIMEOUT,
            request_control: true,
        }
    }

    /// Options for a passive session that does not request control.
    #[inline]
    #[must_use]
    pub const fn passive() -> Self {
        Self {
            timeout: DEFAULT_CONNECT_TIMEOUT,
            request_control: false,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectOptions {
    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets whether control is requested on connect.
    #[inline]
    #[must_use]
    pub const fn with_request_control(mut self, request_control: bool) -> Self {
        self.request_control = request_control;
        self
    }

    /// Time `connect` waits for the worker to report readiness.
    #[inline]
    #[must_use]
    pub fn ready_timeout(&self) -> Duration {
        self.timeout.saturating_mul(2)
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::config("Connect timeout must be greater than zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
