//! Behavior control - exclusive command authority over a remote robot.
//!
//! This library opens one long-lived duplex control stream to a device and
//! arbitrates behavior control over it. The device grants control to at most
//! one client at a time and may hand it to a higher-priority client at any
//! moment; this crate tracks those transitions and lets ordinary blocking
//! code request, wait for, and release control.
//!
//! # Architecture
//!
//! - **Caller threads**: call blocking methods on [`Connection`]
//! - **Connection worker**: a dedicated thread with its own current-thread
//!   tokio runtime that owns the WebSocket and all message I/O
//!
//! Key design principles:
//!
//! - Callers never touch the stream; work is marshaled to the worker
//! - Startup failures are handed back to the `connect` caller exactly once
//! - `granted`/`lost` are durable, resettable signals, not one-shot events
//! - A timed-out `request_control` only stops waiting; the request stands
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use behavior_control::{ConnectOptions, Connection, Result};
//!
//! fn main() -> Result<()> {
//!     let connection = Connection::new("ws://192.168.1.40:8443")?;
//!
//!     // Opens the stream and waits for the first grant.
//!     connection.connect(ConnectOptions::default())?;
//!
//!     // React to pre-emption by another client.
//!     let lost = connection.control_lost_event();
//!     if lost.wait(Duration::from_secs(30)) {
//!         connection.request_control(Duration::from_secs(10))?;
//!     }
//!
//!     connection.release_control()?;
//!     connection.disconnect();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | [`Connection`], builder and connect options |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`protocol`] | Control stream message types |
//! | [`sync`] | Authority signals and startup gate |

// ============================================================================
// Modules
// ============================================================================

/// Connection bridge: the public entry point.
///
/// - [`Connection`] - blocking API over the control stream
/// - [`ConnectionBuilder`] - configuration
/// - [`ConnectOptions`] - per-connect options
pub mod bridge;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Control stream protocol message types.
pub mod protocol;

/// Cross-thread signals shared with the connection worker.
pub mod sync;

/// WebSocket transport layer.
///
/// Internal module handling the handshake and stream event loop.
mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::{
    ConnectOptions, Connection, ConnectionBuilder, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_CONTROL_TIMEOUT,
};

// Error types
pub use error::{Error, Result};

// Protocol types
pub use protocol::{AuthorityTransition, ControlPriority};

// Signal types
pub use sync::{AuthorityState, ControlEvent, ControlEventSet};
