//! Cross-thread synchronization primitives.
//!
//! These are the only structures shared between caller threads and the
//! connection worker besides result channels.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `control_events` | Durable `granted`/`lost` signals and authority state |
//! | `ready_gate` | One-shot startup result handoff |

// ============================================================================
// Submodules
// ============================================================================

/// Authority signals.
pub mod control_events;

/// Startup handoff.
pub mod ready_gate;

// ============================================================================
// Re-exports
// ============================================================================

pub use control_events::{AuthorityState, ControlEvent, ControlEventSet};
pub use ready_gate::{ReadyGate, ReadyReporter};
