//! Control stream handshake.
//!
//! Opens the WebSocket to the device, negotiates the protocol version and,
//! when auto-request is enabled, sends the first control request.
//!
//! # Handshake Flow
//!
//! 1. TCP connect and WebSocket upgrade
//! 2. Client sends `protocol_version_request`
//! 3. Device answers `protocol_version_response`
//! 4. Version range checked; incompatible devices are closed and rejected
//! 5. Optional `control_request` at the configured priority
//!
//! Steps 1-4 are bounded by the connect timeout. `wss` addresses are secured
//! with rustls and the bundled web PKI roots.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{
    ClientMessage, ControlPriority, DeviceMessage, PROTOCOL_VERSION_CURRENT,
    PROTOCOL_VERSION_MINIMUM, check_compatible,
};
use crate::sync::ControlEventSet;

use super::DeviceSocket;

/// Installs the ring provider as the process default, unless one is set.
fn install_crypto_provider() {
    if rustls::crypto::CryptoProvider::get_default().is_none() {
        // Losing a race to another installer is fine.
        let _ = rustls::crypto::ring::default_provider().install_default();
    }
}

// ============================================================================
// HandshakeOutcome
// ============================================================================

/// An open, negotiated control stream.
pub(crate) struct HandshakeOutcome {
    /// The negotiated stream.
    pub socket: DeviceSocket,
    /// Version reported by the device.
    pub host_version: u32,
    /// Grant epoch to wait past if a control request was sent.
    pub pending_grant: Option<u64>,
}

// ============================================================================
// StreamHandshake
// ============================================================================

/// Handshake parameters for one connection attempt.
pub(crate) struct StreamHandshake<'a> {
    address: &'a Url,
    timeout: Duration,
    auto_request: Option<ControlPriority>,
}

impl<'a> StreamHandshake<'a> {
    /// Creates a handshake that does not request control.
    pub(crate) fn new(address: &'a Url, timeout: Duration) -> Self {
        Self {
            address,
            timeout,
            auto_request: None,
        }
    }

    /// Requests control at `priority` once negotiation succeeds.
    pub(crate) fn auto_request(mut self, priority: Option<ControlPriority>) -> Self {
        self.auto_request = priority;
        self
    }

    /// Runs the handshake.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if negotiation does not finish in time
    /// - [`Error::Connection`] / [`Error::WebSocket`] on transport failure
    /// - [`Error::IncompatibleVersion`] if the device version is out of range
    /// - [`Error::Protocol`] if the device answers with anything else
    pub(crate) async fn perform(self, events: &ControlEventSet) -> Result<HandshakeOutcome> {
        let (mut socket, host_version) = timeout(self.timeout, self.negotiate())
            .await
            .map_err(|_| Error::connection_timeout(self.timeout.as_millis() as u64))??;

        let mut pending_grant = None;
        if let Some(priority) = self.auto_request {
            let ticket = events.begin_request();
            let frame = ClientMessage::control_request(priority).to_frame()?;
            socket.send(Message::Text(frame.into())).await?;
            debug!(%priority, "Initial control request sent");
            pending_grant = (!ticket.already_granted).then_some(ticket.epoch);
        }

        Ok(HandshakeOutcome {
            socket,
            host_version,
            pending_grant,
        })
    }

    async fn negotiate(&self) -> Result<(DeviceSocket, u32)> {
        if self.address.scheme() == "wss" {
            install_crypto_provider();
        }

        let (mut socket, _response) = connect_async(self.address.as_str())
            .await
            .map_err(|e| Error::connection(format!("failed to open {}: {e}", self.address)))?;

        debug!(address = %self.address, "Control stream opened");

        let request = ClientMessage::ProtocolVersionRequest {
            client_version: PROTOCOL_VERSION_CURRENT,
            min_host_version: PROTOCOL_VERSION_MINIMUM,
        };
        socket.send(Message::Text(request.to_frame()?.into())).await?;

        let response = loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => break DeviceMessage::from_frame(&text)?,
                Some(Ok(Message::Close(_))) | None => {
                    return Err(Error::connection("stream closed during handshake"));
                }
                Some(Err(e)) => return Err(e.into()),
                // Ping, Pong, Binary
                Some(Ok(_)) => {}
            }
        };

        let DeviceMessage::ProtocolVersionResponse {
            result,
            host_version,
        } = response
        else {
            return Err(Error::protocol(format!(
                "expected protocol_version_response, got {response:?}"
            )));
        };

        if let Err(e) = check_compatible(result, host_version) {
            warn!(host_version, ?result, "Device protocol version rejected");
            let _ = socket.close(None).await;
            return Err(e);
        }

        info!(host_version, "Protocol version negotiated");
        Ok((socket, host_version))
    }
}
