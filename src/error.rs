//! SDK error types.
//!
//! Schema and state violations are programmer errors and are raised
//! synchronously from the mutating call. REST failures seen during
//! reconciliation are recorded on the VM's error list instead of raised, so
//! callers can inspect and retry selectively.

use crate::vm::VmState;

/// Error type for all SDK operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An option bag failed schema validation (unknown key, missing required
    /// key, or wrong value type). Carries the offending field name.
    #[error("invalid option `{field}`: {reason}")]
    InvalidOption { field: String, reason: String },

    /// A lifecycle operation or mutation is illegal in the current VM state
    #[error("cannot {operation} while the VM is {state}")]
    InvalidState { state: VmState, operation: String },

    /// A resource kind was used with the wrong mutation operation
    #[error("invalid resource: {0}")]
    InvalidResource(String),

    /// The external process died during the startup grace window, the binary
    /// is missing, or a host artifact could not be prepared
    #[error("startup failed: {0}")]
    Startup(String),

    /// The Firecracker API returned a non-success status with a fault message
    #[error("API fault: {fault_message}")]
    Api { fault_message: String },

    /// Unexpected HTTP status, undecodable response, or a transport-level
    /// failure on the UNIX socket
    #[error("transport error: {0}")]
    Transport(String),
}

impl Error {
    pub(crate) fn invalid_option(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidOption {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_state(state: VmState, operation: impl Into<String>) -> Self {
        Error::InvalidState {
            state,
            operation: operation.into(),
        }
    }

    /// The message recorded on the VM error list for this failure. API faults
    /// record the fault message verbatim; everything else records the display
    /// form.
    pub(crate) fn record_message(&self) -> String {
        match self {
            Error::Api { fault_message } => fault_message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Transport(format!("JSON encoding failed: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
