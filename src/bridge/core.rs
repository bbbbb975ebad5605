//! Connection bridge between caller threads and the control stream.
//!
//! A [`Connection`] exposes a blocking API to ordinary threads while the
//! stream itself lives on a dedicated worker thread.
//! Calls that touch the stream are marshaled onto the worker as commands;
//! their outcomes come back through the authority signals.
//!
//! # Concurrency
//!
//! `Connection` is `Send + Sync` and may be shared behind an `Arc`.
//! Ordering between `request_control`/`release_control` calls issued from
//! different threads is not defined; applications racing to request and
//! release control must serialize those calls themselves.
//!
//! Blocking methods must not be called from async code. Use
//! [`run_soon`](Connection::run_soon) to schedule async work on the
//! connection instead.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::protocol::{ClientMessage, ControlPriority};
use crate::sync::control_events::GrantWait;
use crate::sync::{AuthorityState, ControlEvent, ControlEventSet};
use crate::transport::stream::StreamCommand;

use super::builder::ConnectionBuilder;
use super::options::ConnectOptions;
use super::worker::{Worker, WorkerConfig};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for [`Connection::request_control`] callers that have no
/// better bound.
pub const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Connection
// ============================================================================

/// Client connection to one device, with behavior-control arbitration.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use behavior_control::{ConnectOptions, Connection};
///
/// # fn example() -> behavior_control::Result<()> {
/// let connection = Connection::new("ws://192.168.1.40:8443")?;
/// connection.connect(ConnectOptions::default())?;
///
/// // ... drive the device ...
///
/// if connection.control_lost_event().wait(Duration::from_secs(60)) {
///     connection.request_control(Duration::from_secs(10))?;
/// }
///
/// connection.disconnect();
/// # Ok(())
/// # }
/// ```
pub struct Connection {
    address: Url,
    priority: ControlPriority,
    thread_name: String,
    connection_id: Uuid,
    events: ControlEventSet,
    worker: Mutex<Option<Worker>>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.address.as_str())
            .field("connection_id", &self.connection_id)
            .field("priority", &self.priority)
            .field("connected", &self.is_connected())
            .field("events", &self.events)
            .finish()
    }
}

// ============================================================================
// Connection - Construction
// ============================================================================

impl Connection {
    /// Creates a builder for configuring a connection.
    #[inline]
    #[must_use]
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    /// Creates an unconnected connection to `address` with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `address` is not a valid `ws`/`wss` URL.
    pub fn new(address: &str) -> Result<Self> {
        Self::builder().address(address).build()
    }

    pub(crate) fn from_parts(address: Url, priority: ControlPriority, thread_name: String) -> Self {
        Self {
            address,
            priority,
            thread_name,
            connection_id: Uuid::new_v4(),
            events: ControlEventSet::new(),
            worker: Mutex::new(None),
        }
    }
}

// ============================================================================
// Connection - Lifecycle
// ============================================================================

impl Connection {
    /// Opens the control stream and blocks until it is ready.
    ///
    /// With `options.request_control` the call also waits for the first
    /// grant. The whole call is bounded by [`ConnectOptions::ready_timeout`].
    ///
    /// # Errors
    ///
    /// - [`Error::RepeatedConnection`] if this connection is already open
    /// - [`Error::ConnectionTimeout`] if the worker does not become ready in time
    /// - [`Error::IncompatibleVersion`] if the device version is out of range
    /// - [`Error::ControlTimeout`] if the initial grant does not arrive in time
    /// - transport errors raised while opening the stream
    pub fn connect(&self, options: ConnectOptions) -> Result<()> {
        options.validate()?;

        let mut slot = self.worker.lock();
        if let Some(worker) = slot.as_ref() {
            if worker.is_current_thread() {
                return Err(Error::worker_context("connect"));
            }
            warn!(connection_id = %self.connection_id, "Repeated connect on open connection");
            return Err(Error::RepeatedConnection);
        }

        self.events.reset();

        let config = WorkerConfig {
            address: self.address.clone(),
            timeout: options.timeout,
            ready_timeout: options.ready_timeout(),
            auto_request: options.request_control.then_some(self.priority),
            thread_name: self.thread_name.clone(),
            connection_id: self.connection_id,
        };

        let worker = Worker::start(config, self.events.clone())?;
        *slot = Some(worker);

        info!(
            connection_id = %self.connection_id,
            request_control = options.request_control,
            "Connected"
        );
        Ok(())
    }

    /// Closes the stream and stops the worker.
    ///
    /// Pending `request_control` calls fail with [`Error::ConnectionClosed`].
    /// Calling this on a closed connection does nothing.
    pub fn disconnect(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.stop();
            info!(connection_id = %self.connection_id, "Disconnected");
        }
    }

    /// Returns `true` while the control stream is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|worker| worker.is_running())
    }
}

// ============================================================================
// Connection - Control Arbitration
// ============================================================================

impl Connection {
    /// Requests control at the configured priority and waits for the grant.
    ///
    /// The request is always sent. If control is already held, for example
    /// when re-requesting at a higher priority, this returns once the request
    /// is queued without waiting for another grant.
    ///
    /// # Errors
    ///
    /// - [`Error::ControlTimeout`] if no grant arrives within `timeout`; the
    ///   request stays outstanding and a late grant still sets the granted event
    /// - [`Error::ConnectionClosed`] if the stream ends while waiting
    /// - [`Error::NotConnected`] if the connection is not open
    /// - [`Error::WorkerContext`] if called from the worker thread
    pub fn request_control(&self, timeout: Duration) -> Result<()> {
        self.request_control_with_priority(self.priority, timeout)
    }

    /// Requests control at `priority` and waits for the grant.
    ///
    /// # Errors
    ///
    /// See [`request_control`](Self::request_control).
    pub fn request_control_with_priority(
        &self,
        priority: ControlPriority,
        timeout: Duration,
    ) -> Result<()> {
        let ticket = {
            let slot = self.worker.lock();
            let worker = slot.as_ref().ok_or(Error::NotConnected)?;
            if worker.is_current_thread() {
                return Err(Error::worker_context("request_control"));
            }
            if self.events.is_closed() {
                return Err(Error::ConnectionClosed);
            }

            let ticket = self.events.begin_request();
            worker.send(StreamCommand::Send(ClientMessage::control_request(priority)))?;
            ticket
        };

        debug!(connection_id = %self.connection_id, %priority, "Control requested");

        if ticket.already_granted {
            trace!("Control already held; not waiting for a new grant");
            return Ok(());
        }

        match self.events.wait_for_grant(ticket.epoch, timeout) {
            GrantWait::Granted => Ok(()),
            GrantWait::TimedOut => {
                warn!(
                    connection_id = %self.connection_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Control request timed out"
                );
                Err(Error::control_timeout(timeout.as_millis() as u64))
            }
            GrantWait::Closed => Err(Error::ConnectionClosed),
        }
    }

    /// Sends a release notice without waiting for any acknowledgement.
    ///
    /// The granted and lost events keep their values until the device sends
    /// its next transition.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the connection is not open
    /// - [`Error::ConnectionClosed`] if the stream has ended
    pub fn release_control(&self) -> Result<()> {
        let slot = self.worker.lock();
        let worker = slot.as_ref().ok_or(Error::NotConnected)?;

        worker.send(StreamCommand::Send(ClientMessage::control_release()))?;
        self.events.mark_released();

        debug!(connection_id = %self.connection_id, "Control released");
        Ok(())
    }

    /// Returns `true` while the granted event is set.
    #[inline]
    #[must_use]
    pub fn has_control(&self) -> bool {
        self.events.has_control()
    }

    /// Fails with [`Error::NoControl`] unless control is currently held.
    ///
    /// Intended as a guard in front of actuation commands.
    pub fn ensure_control(&self) -> Result<()> {
        if self.has_control() {
            Ok(())
        } else {
            Err(Error::NoControl)
        }
    }

    /// Returns the current authority state.
    #[inline]
    #[must_use]
    pub fn authority_state(&self) -> AuthorityState {
        self.events.authority()
    }

    /// Signal set when the device grants control.
    #[inline]
    #[must_use]
    pub fn control_granted_event(&self) -> ControlEvent {
        self.events.granted_event()
    }

    /// Signal set when the device takes control away, or the stream ends.
    #[inline]
    #[must_use]
    pub fn control_lost_event(&self) -> ControlEvent {
        self.events.lost_event()
    }
}

// ============================================================================
// Connection - Worker Access
// ============================================================================

impl Connection {
    /// Schedules `future` on the connection worker.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if the connection is not open.
    pub fn run_soon<F>(&self, future: F) -> Result<JoinHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let slot = self.worker.lock();
        let worker = slot.as_ref().ok_or(Error::NotConnected)?;
        Ok(worker.runtime().spawn(future))
    }

    /// Runs `future` on the connection worker and blocks for its output.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the connection is not open
    /// - [`Error::WorkerContext`] if called from the worker thread
    /// - [`Error::ConnectionClosed`] if the worker stops before the future completes
    pub fn run<F>(&self, future: F) -> Result<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        {
            let slot = self.worker.lock();
            let worker = slot.as_ref().ok_or(Error::NotConnected)?;
            if worker.is_current_thread() {
                return Err(Error::worker_context("run"));
            }
            worker.runtime().spawn(async move {
                let _ = tx.send(future.await);
            });
        }

        Ok(rx.blocking_recv()?)
    }

    /// Returns the device address.
    #[inline]
    #[must_use]
    pub fn address(&self) -> &Url {
        &self.address
    }

    /// Returns the priority used for control requests.
    #[inline]
    #[must_use]
    pub fn priority(&self) -> ControlPriority {
        self.priority
    }

    /// Returns the identifier used in this connection's log records.
    #[inline]
    #[must_use]
    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.stop();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
