//! WebSocket transport for the control stream.
//!
//! The whole conversation with the device runs over one long-lived duplex
//! WebSocket. Everything in this module executes on the connection worker;
//! caller threads never touch the socket.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                          ┌─────────────────┐
//! │  Connection worker   │                          │  Device         │
//! │                      │        WebSocket         │                 │
//! │  StreamHandshake     │◄────────────────────────►│  Behavior       │
//! │  → run_control_stream│    ws://device:PORT      │  arbitration    │
//! └──────────────────────┘                          └─────────────────┘
//! ```
//!
//! # Stream Lifecycle
//!
//! 1. `StreamHandshake::perform` - Open socket, negotiate version, optional request
//! 2. `run_control_stream` - Apply transitions, write queued messages
//! 3. `StreamCommand::Shutdown` - Close the socket and end the loop
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `handshake` | Stream opening and version negotiation |
//! | `stream` | Control stream event loop |

// ============================================================================
// Imports
// ============================================================================

use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

// ============================================================================
// Submodules
// ============================================================================

/// Stream opening and version negotiation.
pub(crate) mod handshake;

/// Control stream event loop.
pub(crate) mod stream;

#[cfg(test)]
pub(crate) mod fake_device;

// ============================================================================
// Types
// ============================================================================

/// The negotiated duplex stream to the device.
pub(crate) type DeviceSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;
