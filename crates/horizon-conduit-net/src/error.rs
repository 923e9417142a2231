//! Error types for the transport layer.

use horizon_conduit_core::DisposedError;

use crate::fault::DisconnectReason;

/// Transport-specific errors.
///
/// Transport faults on an established connection never surface here: they are
/// classified into a [`DisconnectReason`] and resolved by disconnecting, so
/// callers learn of them only through the `disconnected` event. This enum
/// covers the failures that *are* returned (or emitted on an `error` signal)
/// directly.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// An operation was invoked on a disposed component.
    #[error(transparent)]
    Disposed(#[from] DisposedError),
    /// Binding a local socket failed.
    #[error("failed to bind {addr}: {message}")]
    Bind {
        /// The address that could not be bound.
        addr: String,
        /// The underlying bind failure.
        message: String,
    },
    /// A classified socket fault, reported on an `error` signal by components
    /// that do not resolve faults by disconnecting (the UDP endpoint socket,
    /// the server's accept loop).
    #[error("socket fault: {0}")]
    Socket(DisconnectReason),
}

/// A specialized Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
