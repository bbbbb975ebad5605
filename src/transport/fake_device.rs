//! In-process device stand-in for tests.
//!
//! Binds a WebSocket server on `127.0.0.1:0`, answers the version handshake
//! and records every client message. Tests push authority transitions and
//! stream failures through the handle. Sessions are served one at a time.

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::protocol::{
    ClientMessage, DeviceMessage, PROTOCOL_VERSION_CURRENT, VersionResult,
};

// ============================================================================
// Configuration
// ============================================================================

/// How the device answers control requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GrantPolicy {
    /// Grant every request right away.
    Immediate,
    /// Grant only when the test calls [`FakeDevice::grant`].
    Manual,
}

/// Device behavior for one test.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DeviceBehavior {
    pub version_result: VersionResult,
    pub host_version: u32,
    pub grant_policy: GrantPolicy,
    /// When `false` the device accepts the socket but never answers.
    pub answer_handshake: bool,
}

impl Default for DeviceBehavior {
    fn default() -> Self {
        Self {
            version_result: VersionResult::Supported,
            host_version: PROTOCOL_VERSION_CURRENT,
            grant_policy: GrantPolicy::Immediate,
            answer_handshake: true,
        }
    }
}

impl DeviceBehavior {
    pub(crate) fn manual() -> Self {
        Self {
            grant_policy: GrantPolicy::Manual,
            ..Self::default()
        }
    }

    pub(crate) fn incompatible() -> Self {
        Self {
            version_result: VersionResult::Unsupported,
            host_version: 0,
            ..Self::default()
        }
    }

    pub(crate) fn silent() -> Self {
        Self {
            answer_handshake: false,
            ..Self::default()
        }
    }
}

enum DeviceCommand {
    Send(String),
    DropStream,
}

// ============================================================================
// FakeDevice
// ============================================================================

/// Handle to a running fake device.
pub(crate) struct FakeDevice {
    runtime: Runtime,
    addr: SocketAddr,
    commands: mpsc::UnboundedSender<DeviceCommand>,
    received: Mutex<mpsc::UnboundedReceiver<ClientMessage>>,
    accepted: Arc<AtomicUsize>,
}

impl FakeDevice {
    /// Starts a device with the given behavior.
    pub(crate) fn start(behavior: DeviceBehavior) -> Self {
        init_tracing();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("fake device runtime");

        let listener = runtime
            .block_on(TcpListener::bind(SocketAddr::new(
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                0,
            )))
            .expect("bind fake device");
        let addr = listener.local_addr().expect("local addr");

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (received_tx, received) = mpsc::unbounded_channel();
        let accepted = Arc::new(AtomicUsize::new(0));

        runtime.spawn(accept_loop(
            listener,
            behavior,
            command_rx,
            received_tx,
            Arc::clone(&accepted),
        ));

        Self {
            runtime,
            addr,
            commands,
            received: Mutex::new(received),
            accepted,
        }
    }

    /// WebSocket URL of the device.
    pub(crate) fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Same endpoint under the `wss` scheme. The device itself speaks plain
    /// WebSocket, so a TLS handshake against it fails.
    pub(crate) fn tls_url(&self) -> String {
        format!("wss://{}", self.addr)
    }

    /// Number of TCP connections accepted so far.
    pub(crate) fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Sends `control_granted`.
    pub(crate) fn grant(&self) {
        self.send(&DeviceMessage::ControlGranted {});
    }

    /// Sends `control_lost`.
    pub(crate) fn lose(&self) {
        self.send(&DeviceMessage::ControlLost {});
    }

    /// Sends a device message.
    pub(crate) fn send(&self, message: &DeviceMessage) {
        let frame = serde_json::to_string(message).expect("encode device message");
        self.send_raw(&frame);
    }

    /// Sends an arbitrary text frame.
    pub(crate) fn send_raw(&self, text: &str) {
        let _ = self.commands.send(DeviceCommand::Send(text.to_string()));
    }

    /// Drops the current session without a close frame.
    pub(crate) fn drop_stream(&self) {
        let _ = self.commands.send(DeviceCommand::DropStream);
    }

    /// Next message received from the client, including handshake messages.
    pub(crate) fn next_message(&self, wait: Duration) -> Option<ClientMessage> {
        let mut received = self.received.lock();
        // The timer must be created inside the runtime.
        self.runtime
            .block_on(async { timeout(wait, received.recv()).await })
            .ok()
            .flatten()
    }

    /// Next control message, skipping version requests.
    pub(crate) fn next_control_message(&self, wait: Duration) -> Option<ClientMessage> {
        let deadline = std::time::Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            match self.next_message(remaining)? {
                ClientMessage::ProtocolVersionRequest { .. } => {}
                other => return Some(other),
            }
        }
    }
}

/// Installs a test subscriber once; honors `RUST_LOG`.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Server Side
// ============================================================================

async fn accept_loop(
    listener: TcpListener,
    behavior: DeviceBehavior,
    mut command_rx: mpsc::UnboundedReceiver<DeviceCommand>,
    received_tx: mpsc::UnboundedSender<ClientMessage>,
    accepted: Arc<AtomicUsize>,
) {
    while let Ok((stream, peer)) = listener.accept().await {
        accepted.fetch_add(1, Ordering::SeqCst);
        debug!(?peer, "Fake device accepted connection");
        serve_session(stream, behavior, &mut command_rx, &received_tx).await;
    }
}

async fn serve_session(
    stream: TcpStream,
    behavior: DeviceBehavior,
    command_rx: &mut mpsc::UnboundedReceiver<DeviceCommand>,
    received_tx: &mpsc::UnboundedSender<ClientMessage>,
) {
    let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws.split();
    let mut handshake_done = false;

    loop {
        tokio::select! {
            message = read.next() => {
                let text = match message {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };

                let Ok(message) = serde_json::from_str::<ClientMessage>(&text) else {
                    continue;
                };
                let _ = received_tx.send(message.clone());

                let reply = match message {
                    ClientMessage::ProtocolVersionRequest { .. } if behavior.answer_handshake => {
                        handshake_done = true;
                        Some(DeviceMessage::ProtocolVersionResponse {
                            result: behavior.version_result,
                            host_version: behavior.host_version,
                        })
                    }
                    ClientMessage::ControlRequest { .. }
                        if behavior.grant_policy == GrantPolicy::Immediate =>
                    {
                        Some(DeviceMessage::ControlGranted {})
                    }
                    _ => None,
                };

                if let Some(reply) = reply {
                    let frame = serde_json::to_string(&reply).expect("encode reply");
                    if write.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
            }

            command = command_rx.recv(), if handshake_done => {
                match command {
                    Some(DeviceCommand::Send(text)) => {
                        if write.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(DeviceCommand::DropStream) | None => break,
                }
            }
        }
    }

    debug!("Fake device session ended");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_message_times_out_when_idle() {
        let device = FakeDevice::start(DeviceBehavior::default());
        assert!(device.next_message(Duration::from_millis(20)).is_none());
        assert!(device.next_control_message(Duration::from_millis(20)).is_none());
    }
}
