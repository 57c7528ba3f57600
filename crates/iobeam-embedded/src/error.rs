//! Error types for the iobeam client

use thiserror::Error;

use crate::io::StorageError;

/// Result type alias for component-level operations
pub type ProtocolResult<T> = core::result::Result<T, ProtocolError>;

/// Result type alias for session operations
pub type Result<T> = core::result::Result<T, Error>;

/// Failures raised by the transport, the HTTP engine and the identity store.
///
/// None of the variants own heap data, so the type is usable without an
/// allocator and cheap to copy around.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Local formatting would overflow the scratch buffer
    #[error("buffer too small: need {needed} bytes, have {have}")]
    BufferTooSmall { needed: usize, have: usize },

    /// Host name could not be resolved
    #[error("dns lookup failed")]
    Dns,

    /// TCP connect was refused or timed out
    #[error("connect failed")]
    Connect,

    /// A request was attempted with no open socket
    #[error("not connected")]
    NotConnected,

    /// The transport reported a receive failure
    #[error("socket read failed")]
    SocketRead,

    /// The transport reported a send failure or accepted no bytes
    #[error("socket write failed")]
    SocketWrite,

    /// Peer closed the connection before the response headers completed
    #[error("connection closed")]
    ConnectionClosed,

    /// Server answered, but not with the status the call expects
    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),

    /// The first response line carried no numeric status code
    #[error("malformed status line")]
    MalformedStatusLine,

    /// Peer closed the connection before `content-length` body bytes arrived
    #[error("truncated body: expected {expected} bytes, received {received}")]
    Truncated { expected: usize, received: usize },

    /// A body field the call depends on is missing or malformed
    #[error("parse error: {0}")]
    ParseError(&'static str),

    /// The parsed device identifier does not fit the identity capacity
    #[error("device id too long: {0} bytes")]
    IdTooLong(usize),

    /// An import was attempted before the device had an identity
    #[error("device not registered")]
    NotRegistered,

    /// Measurement value has no JSON representation
    #[error("invalid measurement value")]
    InvalidValue,

    /// Persisting the identity record failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Failures surfaced by [`Session`](crate::Session) operations.
///
/// Each public call is attempted exactly once; the wrapped [`ProtocolError`]
/// says why, and the caller owns any retry policy.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Project ids start at 1
    #[error("project id must be greater than zero")]
    InvalidProjectId,

    /// An empty project token can never authenticate
    #[error("project token is empty")]
    MissingToken,

    /// A pre-provisioned device id was empty or over capacity
    #[error("invalid device id")]
    InvalidDeviceId,

    /// Device registration did not complete
    #[error("device registration failed: {0}")]
    Registration(#[source] ProtocolError),

    /// The clock-offset round did not complete
    #[error("time sync failed: {0}")]
    TimeSync(#[source] ProtocolError),

    /// Measurement upload did not complete
    #[error("send failed: {0}")]
    Send(#[source] ProtocolError),

    /// Identity reset could not remove the persisted record
    #[error("storage error: {0}")]
    Storage(#[source] StorageError),
}

impl Error {
    /// The underlying component failure, if the error wraps one
    pub fn cause(&self) -> Option<ProtocolError> {
        match self {
            Error::Registration(e) | Error::TimeSync(e) | Error::Send(e) => Some(*e),
            _ => None,
        }
    }
}
