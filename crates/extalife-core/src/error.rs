//! Error types for the Exta Life client.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Connection-level, per-command, and
//! framing-level errors are all captured here.
//!
//! The propagation policy is asymmetric by design: connection/login errors
//! during client construction are fatal and surface to the caller, while
//! per-command errors are caught inside the command client, logged, and
//! degraded to a `None` return. The entity layer must never see an error
//! for a single failed command.

/// The error type for all Exta Life client operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to establish or authenticate the controller connection.
    ///
    /// This is fatal to client construction: a failed login leaves the
    /// session unusable.
    #[error("connection error: {0}")]
    Connection(String),

    /// Sending an individual command failed.
    ///
    /// Caught by the command client, logged, and surfaced to the entity
    /// layer as a `None` return rather than an error.
    #[error("command error: {0}")]
    Command(String),

    /// A protocol-level error (a terminator-complete frame that is not
    /// valid JSON, or an otherwise malformed controller message).
    ///
    /// Incomplete frames are *not* protocol errors; the decoder simply
    /// retains them until more bytes arrive.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No connection to the controller has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the controller was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An invalid parameter was passed to a command (e.g. a channel id
    /// that is not of the form `"<deviceId>-<channelNumber>"`).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Another command held the single-flight lock for too long.
    ///
    /// Only one command may be in flight per connection; callers wait a
    /// bounded time for the lock before giving up.
    #[error("controller busy: command lock not acquired in time")]
    Busy,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
