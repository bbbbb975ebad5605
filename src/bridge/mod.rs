//! Connection bridge module.
//!
//! This module provides the main entry point for control arbitration.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Connection`] | Blocking API over the worker-owned control stream |
//! | [`ConnectionBuilder`] | Fluent configuration builder |
//! | [`ConnectOptions`] | Per-connect timeout and auto-request flag |
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use behavior_control::{ConnectOptions, Connection, Result};
//!
//! # fn example() -> Result<()> {
//! // Observer session: connect without taking control from anyone.
//! let connection = Connection::new("ws://192.168.1.40:8443")?;
//! connection.connect(ConnectOptions::passive())?;
//!
//! // Take control later, when the application needs it.
//! connection.request_control(Duration::from_secs(10))?;
//! connection.release_control()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for connection configuration.
pub mod builder;

/// Connection bridge implementation.
pub mod core;

/// Per-connect options.
pub mod options;

/// Dedicated worker thread owning the stream.
mod worker;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ConnectionBuilder;
pub use core::{Connection, DEFAULT_CONTROL_TIMEOUT};
pub use options::{ConnectOptions, DEFAULT_CONNECT_TIMEOUT};
