//! Fault classification for socket operations.
//!
//! Every send, receive and connect attempt in this crate runs through
//! [`classified`], which maps any I/O failure into a [`DisconnectReason`]
//! with a stable human-readable explanation and the original cause attached.
//! Having one total mapping keeps failure semantics uniform across TCP and
//! UDP: a caller never sees a raw `io::Error` escape a transport loop.

use std::io;
use std::sync::Arc;

/// Why a connection ended (or why a connect attempt failed).
///
/// Attached to exactly one `disconnected` emission per connection lifetime.
#[derive(Debug, Clone)]
pub enum DisconnectReason {
    /// The local application asked for the disconnect.
    Explicit,
    /// A socket operation failed; `reason` is a stable explanation of the
    /// fault category, `cause` the error that was classified.
    Fault {
        /// Human-readable explanation of the fault category.
        reason: String,
        /// The underlying error, kept for diagnostics.
        cause: Option<Arc<io::Error>>,
    },
    /// The operation reported success but the socket is not actually
    /// connected; no error was raised so no more specific reason exists.
    Unknown,
}

impl DisconnectReason {
    /// A fault with an explanation and its underlying cause.
    pub fn fault(reason: impl Into<String>, cause: io::Error) -> Self {
        Self::Fault {
            reason: reason.into(),
            cause: Some(Arc::new(cause)),
        }
    }

    /// The fault used when a stream read observes end-of-file: the remote
    /// host closed the connection, no local error was raised.
    pub fn peer_closed() -> Self {
        Self::Fault {
            reason: "the connection was closed by the remote host".into(),
            cause: None,
        }
    }

    /// Whether this reason is a classified fault (as opposed to an explicit
    /// or unknown disconnect).
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Fault { .. })
    }

    /// Whether the disconnect was requested by the local application.
    pub fn is_explicit(&self) -> bool {
        matches!(self, Self::Explicit)
    }

    /// The underlying error, when the reason carries one.
    pub fn cause(&self) -> Option<&io::Error> {
        match self {
            Self::Fault { cause, .. } => cause.as_deref(),
            _ => None,
        }
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Explicit => write!(f, "disconnect requested by the local application"),
            Self::Fault { reason, .. } => write!(f, "{reason}"),
            Self::Unknown => write!(f, "unknown reason"),
        }
    }
}

/// Map an I/O error to a [`DisconnectReason`].
///
/// Total: every error maps to a `Fault`, most specific category first, and
/// the original error is preserved as the cause. The catch-all category uses
/// the error's own message as the explanation.
pub fn classify(err: io::Error) -> DisconnectReason {
    use io::ErrorKind::*;

    let reason = match err.kind() {
        ConnectionReset | ConnectionAborted | ConnectionRefused | BrokenPipe | HostUnreachable
        | NetworkUnreachable | NetworkDown | AddrInUse | AddrNotAvailable | TimedOut => {
            "an error occurred while accessing the socket"
        }
        UnexpectedEof => "the socket has been closed",
        NotConnected => "the socket is not connected to a remote host",
        Unsupported => "the attempted operation is not supported",
        PermissionDenied => "access to the socket was denied",
        InvalidInput => "the supplied argument was invalid",
        InvalidData => "the received data was invalid",
        _ => {
            return DisconnectReason::Fault {
                reason: err.to_string(),
                cause: Some(Arc::new(err)),
            };
        }
    };

    DisconnectReason::fault(reason, err)
}

/// Run one socket operation, classifying its failure.
///
/// Success is the "no fault" outcome; failure comes back as the uniform
/// [`DisconnectReason`] the caller resolves by disconnecting (TCP) or by
/// reporting on its `error` signal (UDP, accept loop).
pub async fn classified<T, Fut>(op: Fut) -> std::result::Result<T, DisconnectReason>
where
    Fut: std::future::Future<Output = io::Result<T>>,
{
    op.await.map_err(classify)
}
