//! Durable, resettable authority signals.
//!
//! [`ControlEventSet`] holds the `granted` and `lost` signals together with
//! the authority state machine. Both signals live behind one lock, so a
//! transition flips them atomically: after any transition exactly one of them
//! is set. A signal stays set until the next transition; it is not a pulse.
//!
//! Waiting is supported from blocking threads ([`ControlEvent::wait`]) and from
//! async code ([`ControlEvent::wait_async`]).
//!
//! # State Machine
//!
//! ```text
//! Unauthorized ──request──► Requested ──granted──► Granted ──lost──► Lost
//!      ▲                        ▲                     │               │
//!      └────────release─────────┼─────────────────────┘               │
//!                               └──────────────request────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::protocol::AuthorityTransition;

// ============================================================================
// AuthorityState
// ============================================================================

/// Where this client stands in the control arbitration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AuthorityState {
    /// No request outstanding and no control held.
    #[default]
    Unauthorized,
    /// A control request was sent and no grant has arrived yet.
    Requested,
    /// The device granted control.
    Granted,
    /// The device took control away.
    Lost,
}

impl fmt::Display for AuthorityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unauthorized => "unauthorized",
            Self::Requested => "requested",
            Self::Granted => "granted",
            Self::Lost => "lost",
        };
        f.write_str(name)
    }
}

// ============================================================================
// GrantWait
// ============================================================================

/// Outcome of waiting for a fresh grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GrantWait {
    /// A grant newer than the request arrived.
    Granted,
    /// The timeout elapsed first.
    TimedOut,
    /// The event set was closed while waiting.
    Closed,
}

// ============================================================================
// RequestTicket
// ============================================================================

/// Bookkeeping for one outgoing control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RequestTicket {
    /// Grant epoch a fresh grant must exceed.
    pub epoch: u64,
    /// Control was already held when the request was made.
    pub already_granted: bool,
}

// ============================================================================
// Shared State
// ============================================================================

#[derive(Debug, Default)]
struct ControlState {
    granted: bool,
    lost: bool,
    authority: AuthorityState,
    /// Incremented on every grant.
    grant_epoch: u64,
    closed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<ControlState>,
    granted_cv: Condvar,
    lost_cv: Condvar,
    changed: Notify,
}

impl Shared {
    fn notify_all(&self) {
        self.granted_cv.notify_all();
        self.lost_cv.notify_all();
        self.changed.notify_waiters();
    }

    /// Blocks until `done` holds or `timeout` elapses, returning the final
    /// value of `done`.
    fn wait_blocking(
        &self,
        cv: &Condvar,
        timeout: Duration,
        done: impl Fn(&ControlState) -> bool,
    ) -> bool {
        let mut state = self.state.lock();
        if !done(&state) {
            cv.wait_while_for(&mut state, |s| !done(s), timeout);
        }
        done(&state)
    }

    /// Async counterpart of [`wait_blocking`](Self::wait_blocking).
    ///
    /// A `timeout` too large to express as a deadline waits without bound.
    async fn wait_async(&self, timeout: Duration, done: impl Fn(&ControlState) -> bool) -> bool {
        let deadline = Instant::now().checked_add(timeout);

        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if done(&self.state.lock()) {
                return true;
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return done(&self.state.lock());
                    }
                }
                None => notified.await,
            }
        }
    }
}

// ============================================================================
// ControlEventSet
// ============================================================================

/// The `granted`/`lost` signal pair for one connection.
///
/// Cloning is cheap; clones observe the same signals.
#[derive(Clone, Default)]
pub struct ControlEventSet {
    shared: Arc<Shared>,
}

impl fmt::Debug for ControlEventSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("ControlEventSet")
            .field("granted", &state.granted)
            .field("lost", &state.lost)
            .field("authority", &state.authority)
            .field("closed", &state.closed)
            .finish()
    }
}

impl ControlEventSet {
    /// Creates an event set with neither signal set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the "control granted" signal.
    #[inline]
    #[must_use]
    pub fn granted_event(&self) -> ControlEvent {
        ControlEvent {
            shared: Arc::clone(&self.shared),
            kind: EventKind::Granted,
        }
    }

    /// Returns the "control lost" signal.
    #[inline]
    #[must_use]
    pub fn lost_event(&self) -> ControlEvent {
        ControlEvent {
            shared: Arc::clone(&self.shared),
            kind: EventKind::Lost,
        }
    }

    /// Returns the current authority state.
    #[must_use]
    pub fn authority(&self) -> AuthorityState {
        self.shared.state.lock().authority
    }

    /// Returns `true` while the granted signal is set.
    #[must_use]
    pub fn has_control(&self) -> bool {
        self.shared.state.lock().granted
    }

    /// Returns `true` once the underlying stream has ended.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Applies a transition received from the device.
    ///
    /// Transitions are applied in call order; none is dropped when nobody waits.
    pub fn apply(&self, transition: AuthorityTransition) {
        {
            let mut state = self.shared.state.lock();
            if state.closed {
                trace!(?transition, "Ignoring transition on closed event set");
                return;
            }

            match transition {
                AuthorityTransition::Granted => {
                    state.granted = true;
                    state.lost = false;
                    state.authority = AuthorityState::Granted;
                    state.grant_epoch += 1;
                }
                AuthorityTransition::Lost => {
                    state.granted = false;
                    state.lost = true;
                    state.authority = AuthorityState::Lost;
                }
            }

            debug!(?transition, authority = %state.authority, "Authority transition applied");
        }

        self.shared.notify_all();
    }

    /// Records an outgoing control request.
    ///
    /// While control is held the authority stays `Granted`; a re-request at
    /// another priority does not give up the current grant.
    pub(crate) fn begin_request(&self) -> RequestTicket {
        let mut state = self.shared.state.lock();
        let already_granted = state.authority == AuthorityState::Granted;
        if !already_granted {
            state.authority = AuthorityState::Requested;
        }
        RequestTicket {
            epoch: state.grant_epoch,
            already_granted,
        }
    }

    /// Records that a release notice was sent.
    ///
    /// Signals are untouched; they only change on the next transition.
    pub(crate) fn mark_released(&self) {
        let mut state = self.shared.state.lock();
        if !state.closed {
            state.authority = AuthorityState::Unauthorized;
        }
    }

    /// Closes the set: sets `lost`, clears `granted` and wakes every waiter.
    pub(crate) fn close(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.granted = false;
            state.lost = true;
            state.authority = match state.authority {
                AuthorityState::Granted | AuthorityState::Lost => AuthorityState::Lost,
                AuthorityState::Unauthorized | AuthorityState::Requested => {
                    AuthorityState::Unauthorized
                }
            };
        }

        debug!("Control event set closed");
        self.shared.notify_all();
    }

    /// Returns the set to its initial state for a new connection attempt.
    pub(crate) fn reset(&self) {
        *self.shared.state.lock() = ControlState::default();
        self.shared.notify_all();
    }

    /// Blocks until a grant newer than `epoch` arrives.
    pub(crate) fn wait_for_grant(&self, epoch: u64, timeout: Duration) -> GrantWait {
        self.shared
            .wait_blocking(&self.shared.granted_cv, timeout, |s| {
                s.grant_epoch > epoch || s.closed
            });
        self.grant_outcome(epoch)
    }

    /// Async variant of [`wait_for_grant`](Self::wait_for_grant).
    pub(crate) async fn wait_for_grant_async(&self, epoch: u64, timeout: Duration) -> GrantWait {
        self.shared
            .wait_async(timeout, |s| s.grant_epoch > epoch || s.closed)
            .await;
        self.grant_outcome(epoch)
    }

    fn grant_outcome(&self, epoch: u64) -> GrantWait {
        let state = self.shared.state.lock();
        if state.grant_epoch > epoch {
            GrantWait::Granted
        } else if state.closed {
            GrantWait::Closed
        } else {
            GrantWait::TimedOut
        }
    }
}

// ============================================================================
// ControlEvent
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    Granted,
    Lost,
}

/// A read-only, waitable view of one authority signal.
///
/// # Example
///
/// ```ignore
/// let lost = connection.control_lost_event();
/// if lost.wait(Duration::from_secs(30)) {
///     connection.request_control(Duration::from_secs(10))?;
/// }
/// ```
#[derive(Clone)]
pub struct ControlEvent {
    shared: Arc<Shared>,
    kind: EventKind,
}

impl fmt::Debug for ControlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlEvent")
            .field("kind", &self.kind)
            .field("set", &self.is_set())
            .finish()
    }
}

impl ControlEvent {
    /// Returns `true` if the signal is currently set.
    #[must_use]
    pub fn is_set(&self) -> bool {
        let state = self.shared.state.lock();
        self.is_set_in(&state)
    }

    /// Blocks until the signal is set or `timeout` elapses.
    ///
    /// Returns `true` if the signal is set. A granted wait returns `false`
    /// early once the connection has closed.
    pub fn wait(&self, timeout: Duration) -> bool {
        let cv = match self.kind {
            EventKind::Granted => &self.shared.granted_cv,
            EventKind::Lost => &self.shared.lost_cv,
        };
        self.shared.wait_blocking(cv, timeout, |s| self.is_settled(s));
        self.is_set()
    }

    /// Waits asynchronously until the signal is set or `timeout` elapses.
    pub async fn wait_async(&self, timeout: Duration) -> bool {
        self.shared
            .wait_async(timeout, |s| self.is_settled(s))
            .await;
        self.is_set()
    }

    fn is_set_in(&self, state: &ControlState) -> bool {
        match self.kind {
            EventKind::Granted => state.granted,
            EventKind::Lost => state.lost,
        }
    }

    fn is_settled(&self, state: &ControlState) -> bool {
        self.is_set_in(state) || state.closed
    }
}

// ============================================================================
// Tests
// ============================================================================
