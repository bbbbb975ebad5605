//! Builder pattern for connection configuration.
//!
//! # Example
//!
//! ```no_run
//! use behavior_control::{Connection, ControlPriority};
//!
//! # fn example() -> behavior_control::Result<()> {
//! let connection = Connection::builder()
//!     .address("ws://192.168.1.40:8443/behavior")
//!     .priority(ControlPriority::OverrideBehaviors)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use url::Url;

use crate::error::{Error, Result};
use crate::protocol::ControlPriority;

use super::core::Connection;

// ============================================================================
// Constants
// ============================================================================

/// Default name of the connection worker thread.
pub const DEFAULT_THREAD_NAME: &str = "behavior-control";

// ============================================================================
// ConnectionBuilder
// ============================================================================

/// Builder for configuring a [`Connection`].
///
/// Use [`Connection::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct ConnectionBuilder {
    /// Device stream address.
    address: Option<String>,
    /// Priority for control requests.
    priority: ControlPriority,
    /// Worker thread name.
    thread_name: Option<String>,
}

// ============================================================================
// ConnectionBuilder Implementation
// ============================================================================

impl ConnectionBuilder {
    /// Creates a builder with no address and default priority.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the device stream address (`ws://` or `wss://`).
    #[inline]
    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Sets the priority used by `request_control` and by auto-request.
    #[inline]
    #[must_use]
    pub fn priority(mut self, priority: ControlPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the worker thread name.
    #[inline]
    #[must_use]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = Some(name.into());
        self
    }

    /// Builds the connection with validation. Nothing is opened yet.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no address was set
    /// - [`Error::Config`] if the address is not a `ws`/`wss` URL
    /// - [`Error::Config`] if the thread name is empty
    pub fn build(self) -> Result<Connection> {
        let address = self.validate_address()?;
        let thread_name = self.validate_thread_name()?;

        Ok(Connection::from_parts(address, self.priority, thread_name))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConnectionBuilder {
    /// Validates the address configuration.
    fn validate_address(&self) -> Result<Url> {
        let raw = self.address.as_deref().ok_or_else(|| {
            Error::config(
                "Device address is required. Use .address() to set it.\n\
                 Example: Connection::builder().address(\"ws://192.168.1.40:8443\")",
            )
        })?;

        let url = Url::parse(raw)
            .map_err(|e| Error::config(format!("Invalid device address {raw:?}: {e}")))?;

        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(Error::config(format!(
                    "Unsupported address scheme {other:?}; expected ws or wss"
                )));
            }
        }

        if url.host_str().is_none() {
            return Err(Error::config(format!("Device address {raw:?} has no host")));
        }

        Ok(url)
    }

    /// Validates the thread name.
    fn validate_thread_name(&self) -> Result<String> {
        match self.thread_name.as_deref() {
            None => Ok(DEFAULT_THREAD_NAME.to_string()),
            Some(name) if name.trim().is_empty() => {
                Err(Error::config("Worker thread name must not be empty"))
            }
            Some(name) => Ok(name.to_string()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_empty_builder() {
        let builder = ConnectionBuilder::new();
        assert!(builder.address.is_none());
        assert_eq!(builder.priority, ControlPriority::Default);
        assert!(builder.thread_name.is_none());
    }

    #[test]
    fn test_address_sets_value() {
        let builder = ConnectionBuilder::new().address("ws://10.0.0.2:443");
        assert_eq!(builder.address.as_deref(), Some("ws://10.0.0.2:443"));
    }

    #[test]
    fn test_build_fails_without_address() {
        let err = ConnectionBuilder::new().build().unwrap_err();
        assert!(err.to_string().contains("address"));
    }

    #[test]
    fn test_build_rejects_http_scheme() {
        let err = ConnectionBuilder::new()
            .address("http://10.0.0.2")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("scheme"));
    }

    #[test]
    fn test_build_rejects_garbage() {
        let result = ConnectionBuilder::new().address("not a url").build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_build_rejects_empty_thread_name() {
        let result = ConnectionBuilder::new()
            .address("ws://10.0.0.2")
            .thread_name("  ")
            .build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_build_succeeds() {
        let connection = ConnectionBuilder::new()
            .address("wss://vector.local:443/control")
            .priority(ControlPriority::ReserveControl)
            .build()
            .expect("valid configuration");

        assert_eq!(connection.address().scheme(), "wss");
        assert_eq!(connection.priority(), ControlPriority::ReserveControl);
        assert!(!connection.is_connected());
    }

    #[test]
    fn test_builder_is_clone() {
        let builder = ConnectionBuilder::new().address("ws://10.0.0.2");
        let cloned = builder.clone();
        assert_eq!(builder.address, cloned.address);
    }
}
