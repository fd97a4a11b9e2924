//! Error types for the call-center engine

use thiserror::Error;

/// Result type for call-center operations
pub type CallCenterResult<T> = Result<T, CallCenterError>;

/// Error types for the call-center engine
///
/// Admission outcomes (`overload`, `alreadyInQueue`) and post-dispatch
/// `timeout` are call statuses, not errors; see [`crate::cdr::CallStatus`].
#[derive(Error, Debug)]
pub enum CallCenterError {
    /// Setter constraint violated; the setter is a no-op
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Configuration file missing or unreadable
    #[error("config I/O error: {0}")]
    ConfigIo(String),

    /// Configuration JSON invalid
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// HTTP listener failed to bind or serve
    #[error("listen error: {0}")]
    Listen(String),
}
