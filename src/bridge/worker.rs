//! Connection worker thread.
//!
//! Each open connection owns one dedicated OS thread running a
//! current-thread tokio runtime. The runtime owns the control stream; caller
//! threads reach it only through the command channel and the runtime handle.
//!
//! # Startup
//!
//! ```text
//! caller thread                         worker thread
//! ─────────────                         ─────────────
//! Worker::start ──spawn──────────────►  build runtime
//!   gate.wait(ready_timeout)            StreamHandshake::perform
//!                                       spawn run_control_stream
//!                                       [wait for first grant]
//!   ◄──────────────report(Ok/Err)────── ReadyReporter::report
//! ```
//!
//! Anything that fails before the report is handed back through the gate and
//! the thread exits, so a failed `connect` leaves nothing running.

// ============================================================================
// Imports
// ============================================================================

use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use tokio::runtime::{Builder, Handle};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::protocol::ControlPriority;
use crate::sync::control_events::GrantWait;
use crate::sync::{ControlEventSet, ReadyGate, ReadyReporter};
use crate::transport::handshake::{HandshakeOutcome, StreamHandshake};
use crate::transport::stream::{StreamCommand, run_control_stream};

// ============================================================================
// WorkerConfig
// ============================================================================

/// Everything the worker needs to open the stream.
#[derive(Debug, Clone)]
pub(crate) struct WorkerConfig {
    pub address: Url,
    /// Bound for the handshake and for the initial grant.
    pub timeout: Duration,
    /// Bound for the whole startup as seen by the caller.
    pub ready_timeout: Duration,
    /// `Some` when control is requested during connect.
    pub auto_request: Option<ControlPriority>,
    pub thread_name: String,
    pub connection_id: Uuid,
}

// ============================================================================
// Worker
// ============================================================================

/// Caller-side handle to a running connection worker.
pub(crate) struct Worker {
    thread: Option<JoinHandle<()>>,
    thread_id: ThreadId,
    commands: mpsc::UnboundedSender<StreamCommand>,
    runtime: Handle,
    /// Dropping or firing this stops the worker even mid-startup.
    _abort: oneshot::Sender<()>,
}

impl Worker {
    /// Spawns the worker and blocks until it reports readiness.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if nothing is reported within `ready_timeout`
    /// - any startup error raised on the worker, re-raised here once
    pub(crate) fn start(config: WorkerConfig, events: ControlEventSet) -> Result<Self> {
        let ready_timeout = config.ready_timeout;
        let connection_id = config.connection_id;

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (abort, abort_rx) = oneshot::channel();
        let (gate, reporter) = ReadyGate::new();

        let shutdown_tx = commands.clone();
        let thread = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || run_worker(config, events, command_rx, shutdown_tx, abort_rx, reporter))?;
        let thread_id = thread.thread().id();

        match gate.wait(ready_timeout) {
            Some(Ok(runtime)) => {
                info!(%connection_id, "Connection worker ready");
                Ok(Self {
                    thread: Some(thread),
                    thread_id,
                    commands,
                    runtime,
                    _abort: abort,
                })
            }

            Some(Err(e)) => {
                warn!(%connection_id, error = %e, "Connection worker failed to start");
                join_thread(thread);
                Err(e)
            }

            None => {
                warn!(
                    %connection_id,
                    timeout_ms = ready_timeout.as_millis() as u64,
                    "Connection worker did not become ready"
                );
                let _ = abort.send(());
                drop(commands);
                join_thread(thread);
                Err(Error::connection_timeout(ready_timeout.as_millis() as u64))
            }
        }
    }

    /// Queues a command for the stream loop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the stream loop has ended.
    pub(crate) fn send(&self, command: StreamCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Returns `true` if called from the worker thread itself.
    #[inline]
    pub(crate) fn is_current_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Returns `true` while the stream loop is still accepting commands.
    #[inline]
    pub(crate) fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Handle to the worker's runtime, for scheduling caller futures.
    #[inline]
    pub(crate) fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Closes the stream and stops the worker.
    ///
    /// Joins the thread unless called from the worker itself.
    pub(crate) fn stop(mut self) {
        let _ = self.commands.send(StreamCommand::Shutdown);

        if let Some(thread) = self.thread.take() {
            if self.is_current_thread() {
                debug!("Worker stopped from its own thread; not joining");
            } else {
                join_thread(thread);
            }
        }
    }
}

fn join_thread(thread: JoinHandle<()>) {
    if thread.join().is_err() {
        error!("Connection worker thread panicked");
    }
}

// ============================================================================
// Worker Thread
// ============================================================================

fn run_worker(
    config: WorkerConfig,
    events: ControlEventSet,
    command_rx: mpsc::UnboundedReceiver<StreamCommand>,
    shutdown_tx: mpsc::UnboundedSender<StreamCommand>,
    abort_rx: oneshot::Receiver<()>,
    reporter: ReadyReporter<Handle>,
) {
    let runtime = match Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            reporter.report(Err(e.into()));
            return;
        }
    };

    let connection_id = config.connection_id;
    let handle = runtime.handle().clone();

    runtime.block_on(async move {
        tokio::select! {
            () = drive(config, events, command_rx, shutdown_tx, reporter, handle) => {}
            _ = abort_rx => debug!(%connection_id, "Connection worker aborted"),
        }
    });

    // Blocking tasks such as DNS lookups must not hold up the join.
    runtime.shutdown_background();
    debug!(%connection_id, "Connection worker exiting");
}

/// Startup followed by the stream loop.
async fn drive(
    config: WorkerConfig,
    events: ControlEventSet,
    command_rx: mpsc::UnboundedReceiver<StreamCommand>,
    shutdown_tx: mpsc::UnboundedSender<StreamCommand>,
    reporter: ReadyReporter<Handle>,
    handle: Handle,
) {
    let connection_id = config.connection_id;

    let outcome = StreamHandshake::new(&config.address, config.timeout)
        .auto_request(config.auto_request)
        .perform(&events)
        .await;

    let HandshakeOutcome {
        socket,
        host_version,
        pending_grant,
    } = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            reporter.report(Err(e));
            return;
        }
    };

    info!(%connection_id, host_version, address = %config.address, "Control stream established");

    let stream_task = tokio::spawn(run_control_stream(
        socket,
        command_rx,
        events.clone(),
        connection_id,
    ));

    if let Some(epoch) = pending_grant {
        let failure = match events.wait_for_grant_async(epoch, config.timeout).await {
            GrantWait::Granted => None,
            GrantWait::TimedOut => Some(Error::control_timeout(config.timeout.as_millis() as u64)),
            GrantWait::Closed => Some(Error::ConnectionClosed),
        };

        if let Some(e) = failure {
            let _ = shutdown_tx.send(StreamCommand::Shutdown);
            let _ = stream_task.await;
            reporter.report(Err(e));
            return;
        }

        debug!(%connection_id, "Initial control granted");
    }

    drop(shutdown_tx);
    reporter.report(Ok(handle));

    match stream_task.await {
        Ok(end) => debug!(%connection_id, ?end, "Control stream finished"),
        Err(e) => error!(%connection_id, error = %e, "Control stream task failed"),
    }
}

// ============================================================================
// Tests
// ============================================================================
