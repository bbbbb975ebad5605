//! Control stream message types.
//!
//! Every frame on the duplex stream is a JSON object carrying exactly one
//! externally tagged variant.
//!
//! # Format
//!
//! ```json
//! { "control_request": { "priority": 20 } }
//! { "control_release": {} }
//! { "control_granted": {} }
//! { "control_lost": {} }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::version::VersionResult;

// ============================================================================
// ControlPriority
// ============================================================================

/// Priority attached to a control request.
///
/// The device arbitrates competing requesters by this value; a lower number
/// outranks a higher one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum ControlPriority {
    /// Pre-empts the device's own autonomous behaviors.
    OverrideBehaviors,
    /// Normal SDK priority.
    #[default]
    Default,
    /// Holds control without actively driving the device.
    ReserveControl,
}

impl ControlPriority {
    /// Returns the numeric wire value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::OverrideBehaviors => 10,
            Self::Default => 20,
            Self::ReserveControl => 30,
        }
    }

    /// Returns `true` if `self` outranks `other`.
    #[inline]
    #[must_use]
    pub const fn outranks(self, other: Self) -> bool {
        self.as_u32() < other.as_u32()
    }
}

impl From<ControlPriority> for u32 {
    #[inline]
    fn from(priority: ControlPriority) -> Self {
        priority.as_u32()
    }
}

impl TryFrom<u32> for ControlPriority {
    type Error = String;

    fn try_from(value: u32) -> std::result::Result<Self, Self::Error> {
        match value {
            10 => Ok(Self::OverrideBehaviors),
            20 => Ok(Self::Default),
            30 => Ok(Self::ReserveControl),
            other => Err(format!("unknown control priority: {other}")),
        }
    }
}

impl fmt::Display for ControlPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OverrideBehaviors => "override_behaviors",
            Self::Default => "default",
            Self::ReserveControl => "reserve_control",
        };
        f.write_str(name)
    }
}

// ============================================================================
// ClientMessage
// ============================================================================

/// A message from the client to the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientMessage {
    /// Opens version negotiation. Sent once, first.
    ProtocolVersionRequest {
        /// Protocol version this client speaks.
        client_version: u32,
        /// Oldest device version this client accepts.
        min_host_version: u32,
    },
    /// Asks the device for behavior control.
    ControlRequest {
        /// Requested priority.
        priority: ControlPriority,
    },
    /// Voluntarily gives up behavior control.
    ControlRelease {},
}

impl ClientMessage {
    /// Creates a control request at the given priority.
    #[inline]
    #[must_use]
    pub const fn control_request(priority: ControlPriority) -> Self {
        Self::ControlRequest { priority }
    }

    /// Creates a release notice.
    #[inline]
    #[must_use]
    pub const fn control_release() -> Self {
        Self::ControlRelease {}
    }

    /// Serializes the message to a JSON frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// DeviceMessage
// ============================================================================

/// A message from the device to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceMessage {
    /// Answer to [`ClientMessage::ProtocolVersionRequest`].
    ProtocolVersionResponse {
        /// Whether the device accepts the client's version.
        result: VersionResult,
        /// Protocol version the device speaks.
        host_version: u32,
    },
    /// Behavior control has been granted to this client.
    ControlGranted {},
    /// Behavior control has been taken away from this client.
    ControlLost {},
    /// Liveness ping with no payload.
    KeepAlive {},
}

impl DeviceMessage {
    /// Parses a JSON frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the frame is not a known message.
    pub fn from_frame(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| Error::protocol(format!("malformed device message: {e}")))
    }

    /// Returns the transition carried by this message, if any.
    #[inline]
    #[must_use]
    pub const fn transition(&self) -> Option<AuthorityTransition> {
        match self {
            Self::ControlGranted {} => Some(AuthorityTransition::Granted),
            Self::ControlLost {} => Some(AuthorityTransition::Lost),
            _ => None,
        }
    }
}

// ============================================================================
// AuthorityTransition
// ============================================================================

/// An authority change announced by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorityTransition {
    /// Control granted.
    Granted,
    /// Control lost.
    Lost,
}

// ============================================================================
// Tests
// ============================================================================
