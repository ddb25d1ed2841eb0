//! Error types.
//!
//! The error surface is deliberately narrow: only authorization requests can
//! fail. Every other operation treats an unmet precondition as a routine
//! state and degrades to a logged no-op.

use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Why an authorization request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("Bluetooth access was denied by the user")]
    Denied,

    #[error("Bluetooth access is restricted by device policy")]
    Restricted,

    #[error("Bluetooth authorization status could not be determined")]
    Unknown,
}
