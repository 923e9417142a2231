//! State enum for TCP clients.
//!
//! Connections and servers have only the shared active/disposed lifecycle
//! (`horizon_conduit_core::LifecycleState`); the client additionally tracks
//! its connect attempt.

/// Current state of a TCP client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClientState {
    /// Not connected to any remote.
    #[default]
    Disconnected,
    /// Currently attempting to connect.
    Connecting,
    /// Connected and ready to send/receive data.
    Connected,
}

impl std::fmt::Display for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}
