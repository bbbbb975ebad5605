//! Protocol version negotiation.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Protocol version spoken by this client.
pub const PROTOCOL_VERSION_CURRENT: u32 = 2;

/// Oldest device protocol version this client can talk to.
pub const PROTOCOL_VERSION_MINIMUM: u32 = 1;

// ============================================================================
// VersionResult
// ============================================================================

/// Device verdict on the client's protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionResult {
    /// Device accepts the client.
    Supported,
    /// Device rejects the client.
    Unsupported,
}

/// Checks a device's version answer against this client's supported range.
///
/// # Errors
///
/// Returns [`Error::IncompatibleVersion`] if the device rejected the client or
/// is older than [`PROTOCOL_VERSION_MINIMUM`].
pub fn check_compatible(result: VersionResult, host_version: u32) -> Result<()> {
    if result != VersionResult::Supported || host_version < PROTOCOL_VERSION_MINIMUM {
        return Err(Error::incompatible_version(
            host_version,
            result,
            PROTOCOL_VERSION_MINIMUM,
        ));
    }
    Ok(())
}
