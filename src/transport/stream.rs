//! Control stream event loop.
//!
//! Runs on the connection worker for the lifetime of the stream and handles:
//!
//! - Incoming authority transitions, applied to the [`ControlEventSet`]
//! - Outgoing control messages queued by caller threads
//! - Shutdown requested by `disconnect`
//!
//! The loop never reopens the stream. When it ends, for whatever reason, the
//! event set is closed so that pending waiters wake up.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

use crate::protocol::{ClientMessage, DeviceMessage};
use crate::sync::ControlEventSet;

use super::DeviceSocket;

// ============================================================================
// Constants
// ============================================================================

/// Upper bound on the close handshake during shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// Types
// ============================================================================

/// Work items marshaled onto the stream loop.
#[derive(Debug)]
pub(crate) enum StreamCommand {
    /// Write a message to the device.
    Send(ClientMessage),
    /// Close the stream and stop the loop.
    Shutdown,
}

/// Why the stream loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamEnd {
    /// Shutdown was requested locally.
    Shutdown,
    /// The device closed the stream.
    RemoteClosed,
    /// A read or write failed.
    Failed,
}

// ============================================================================
// Event Loop
// ============================================================================

/// Drives the control stream until shutdown or stream failure.
pub(crate) async fn run_control_stream(
    socket: DeviceSocket,
    mut command_rx: mpsc::UnboundedReceiver<StreamCommand>,
    events: ControlEventSet,
    connection_id: Uuid,
) -> StreamEnd {
    let (mut ws_write, mut ws_read) = socket.split();

    let end = loop {
        tokio::select! {
            // Incoming messages from the device
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => handle_incoming_message(&text, &events),

                    Some(Ok(Message::Close(_))) => {
                        debug!(%connection_id, "Control stream closed by device");
                        break StreamEnd::RemoteClosed;
                    }

                    Some(Err(e)) => {
                        error!(%connection_id, error = %e, "Control stream error");
                        break StreamEnd::Failed;
                    }

                    None => {
                        debug!(%connection_id, "Control stream ended");
                        break StreamEnd::RemoteClosed;
                    }

                    // Ignore Binary, Ping, Pong
                    _ => {}
                }
            }

            // Work marshaled from caller threads
            command = command_rx.recv() => {
                match command {
                    Some(StreamCommand::Send(message)) => {
                        let frame = match message.to_frame() {
                            Ok(frame) => frame,
                            Err(e) => {
                                warn!(error = %e, "Failed to encode control message");
                                continue;
                            }
                        };

                        if let Err(e) = ws_write.send(Message::Text(frame.into())).await {
                            error!(%connection_id, error = %e, "Failed to write control message");
                            break StreamEnd::Failed;
                        }

                        trace!(?message, "Control message sent");
                    }

                    Some(StreamCommand::Shutdown) | None => {
                        debug!(%connection_id, "Shutdown requested");
                        if timeout(CLOSE_TIMEOUT, ws_write.close()).await.is_err() {
                            warn!(%connection_id, "Close handshake timed out");
                        }
                        break StreamEnd::Shutdown;
                    }
                }
            }
        }
    };

    events.close();
    debug!(%connection_id, ?end, "Control stream loop terminated");
    end
}

/// Applies one inbound frame. Malformed frames are logged and dropped.
fn handle_incoming_message(text: &str, events: &ControlEventSet) {
    let message = match DeviceMessage::from_frame(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, text = %text, "Ignoring unparseable device message");
            return;
        }
    };

    match message.transition() {
        Some(transition) => events.apply(transition),
        None => match message {
            DeviceMessage::KeepAlive {} => trace!("Keep-alive received"),
            other => warn!(message = ?other, "Unexpected device message on control stream"),
        },
    }
}

// ============================================================================
// Tests
// ============================================================================
