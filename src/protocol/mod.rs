//! Control stream protocol message types.
//!
//! This module defines the frames exchanged between the client and the
//! device over the duplex control stream.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | `protocol_version_request` | Client → Device | Open version negotiation |
//! | `protocol_version_response` | Device → Client | Accept or reject the client |
//! | `control_request` | Client → Device | Ask for behavior control |
//! | `control_release` | Client → Device | Give up behavior control |
//! | `control_granted` | Device → Client | Control granted |
//! | `control_lost` | Device → Client | Control taken away |
//! | `keep_alive` | Device → Client | Liveness ping |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `message` | Client and device message enums |
//! | `version` | Version constants and compatibility check |

// ============================================================================
// Submodules
// ============================================================================

/// Client and device message types.
pub mod message;

/// Protocol version negotiation.
pub mod version;

// ============================================================================
// Re-exports
// ============================================================================

pub use message::{AuthorityTransition, ClientMessage, ControlPriority, DeviceMessage};
pub use version::{
    PROTOCOL_VERSION_CURRENT, PROTOCOL_VERSION_MINIMUM, VersionResult, check_compatible,
};
