//! Error types for the detector mirror.
//!
//! Two layers, mirroring how failures actually arise:
//!
//! - **`ConnectionError`**: anything the transport reports. Network failures,
//!   non-success HTTP statuses, undecodable bodies and use-after-close all land
//!   here. The transport is the only producer.
//! - **`EigerError`**: the application error. Wraps `ConnectionError` via
//!   `#[from]` so `?` works across the boundary, and adds the failures the
//!   engine itself detects (decode mismatches, writes to read-only attributes,
//!   malformed key lists).
//!
//! How an error is treated depends on the phase it occurs in:
//!
//! | Phase            | Transport failure                         |
//! |------------------|-------------------------------------------|
//! | Discovery        | Fatal, aborts startup                     |
//! | Steady-state poll| Logged, returned as a failed poll outcome |
//! | Write command    | Propagated to whoever issued the command  |

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type EigerResult<T> = std::result::Result<T, EigerError>;

/// Failure reported by a [`Connection`](crate::connection::Connection).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The request never produced a response (refused, reset, timed out).
    #[error("request to '{path}' failed: {message}")]
    Request {
        /// Device path of the failed request
        path: String,
        /// Transport-level description
        message: String,
    },

    /// The device answered with a non-success status.
    #[error("device returned status {status} for '{path}'")]
    Status {
        /// Device path of the failed request
        path: String,
        /// HTTP status code
        status: u16,
    },

    /// The response body could not be decoded as a parameter response.
    #[error("malformed response from '{path}': {message}")]
    Decode {
        /// Device path of the failed request
        path: String,
        /// Decoder message
        message: String,
    },

    /// The connection was already closed.
    #[error("connection is closed")]
    Closed,
}

/// Primary error type for the detector mirror.
#[derive(Error, Debug)]
pub enum EigerError {
    /// Transport failure.
    ///
    /// Fatal during discovery, swallowed (logged) while polling, surfaced to
    /// the caller of a write.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// A `keys` request did not return a list of parameter names.
    #[error("key list at '{path}' is not an array of names")]
    InvalidKeyList {
        /// Path of the `keys` request
        path: String,
    },

    /// A device value did not match the attribute's datatype.
    #[error("cannot decode {found} as {expected} for '{path}'")]
    Decode {
        /// Device path the value came from
        path: String,
        /// Datatype the attribute expects
        expected: &'static str,
        /// Short description of what the device sent
        found: String,
    },

    /// A write value does not match the attribute's datatype.
    #[error("attribute '{name}' expects {expected}, got {found}")]
    TypeMismatch {
        /// Attribute name
        name: String,
        /// Datatype the attribute expects
        expected: &'static str,
        /// Datatype of the rejected value
        found: &'static str,
    },

    /// Write attempted on a read-only attribute.
    #[error("attribute '{0}' is read-only")]
    ReadOnly(String),

    /// Operation requires a different controller lifecycle state.
    #[error("controller is {actual}, expected {expected}")]
    InvalidState {
        /// Required state
        expected: &'static str,
        /// Current state
        actual: &'static str,
    },

    /// Configuration validation failed.
    #[error("configuration validation error: {0}")]
    Configuration(String),
}

impl EigerError {
    /// True if this error originated in the transport.
    pub fn is_transport(&self) -> bool {
        matches!(self, EigerError::Connection(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_error_converts_with_question_mark() {
        fn fails() -> EigerResult<()> {
            Err(ConnectionError::Closed)?;
            Ok(())
        }

        let err = fails().unwrap_err();
        assert!(err.is_transport());
        assert_eq!(err.to_string(), "connection is closed");
    }

    #[test]
    fn status_error_names_the_path() {
        let err = ConnectionError::Status {
            path: "detector/api/1.8.0/status/state".into(),
            status: 404,
        };
        assert_eq!(
            err.to_string(),
            "device returned status 404 for 'detector/api/1.8.0/status/state'"
        );
    }
}
