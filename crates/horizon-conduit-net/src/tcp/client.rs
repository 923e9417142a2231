//! TCP client: connect, classify the outcome, own at most one connection.

use std::net::SocketAddr;
use std::sync::Arc;

use horizon_conduit_core::{Lifecycle, Signal};
use parking_lot::Mutex;
use tokio::net::{TcpSocket, TcpStream};

use super::config::TcpClientConfig;
use super::connection::{Packet, TcpConnection};
use super::state::ClientState;
use crate::error::Result;
use crate::fault::{DisconnectReason, classified, classify};

/// Internal state for the TCP client.
struct ClientInner {
    state: ClientState,
    connection: Option<Arc<TcpConnection>>,
    remote: Option<SocketAddr>,
}

/// A TCP client that initiates connections.
///
/// The client owns at most one [`TcpConnection`] at a time. A connect attempt
/// has three outcomes: a classified fault, an ambiguous failure (the connect
/// call reported success but the socket is not actually connected), or an
/// established connection whose events are wired through to the client's own
/// signals. Connecting to the remote the client is already connected to is a
/// no-op that succeeds.
///
/// There is no automatic retry or reconnection; when the connection ends the
/// caller decides whether to connect again.
///
/// # Signals
///
/// - [`connected`](Self::connected): a connection was established
/// - [`connection_failed`](Self::connection_failed): a connect attempt failed
/// - [`packet_received`](Self::packet_received): data arrived
/// - [`disconnected`](Self::disconnected): the connection ended
pub struct TcpClient {
    config: TcpClientConfig,
    lifecycle: Lifecycle,
    inner: Arc<Mutex<ClientInner>>,

    /// Signal emitted when a connection is established.
    pub connected: Arc<Signal<SocketAddr>>,
    /// Signal emitted when a connect attempt fails.
    pub connection_failed: Arc<Signal<DisconnectReason>>,
    /// Signal emitted when data is received.
    pub packet_received: Arc<Signal<Packet>>,
    /// Signal emitted when the active connection ends.
    pub disconnected: Arc<Signal<DisconnectReason>>,
}

impl TcpClient {
    /// Create a new TCP client with the given configuration.
    pub fn new(config: TcpClientConfig) -> Self {
        Self {
            config,
            lifecycle: Lifecycle::new("TcpClient"),
            inner: Arc::new(Mutex::new(ClientInner {
                state: ClientState::Disconnected,
                connection: None,
                remote: None,
            })),
            connected: Arc::new(Signal::new()),
            connection_failed: Arc::new(Signal::new()),
            packet_received: Arc::new(Signal::new()),
            disconnected: Arc::new(Signal::new()),
        }
    }

    /// Get the current connection state.
    pub fn state(&self) -> ClientState {
        self.inner.lock().state
    }

    /// Whether there is a live connection.
    pub fn is_connected(&self) -> bool {
        self.inner
            .lock()
            .connection
            .as_ref()
            .is_some_and(|conn| conn.is_connected())
    }

    /// The remote endpoint of the live connection, if any.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.inner.lock().remote
    }

    /// Whether the client has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.lifecycle.is_disposed()
    }

    /// Connect to a remote endpoint.
    ///
    /// Already connected to this same `remote`: succeeds immediately without
    /// reconnecting. Otherwise any existing connection is torn down first,
    /// a new socket is bound to the configured local endpoint, and an async
    /// connect is attempted. Returns `Ok(true)` on success; `Ok(false)` when
    /// the attempt failed, in which case [`connection_failed`]
    /// (Self::connection_failed) has fired with the classified reason — or
    /// with [`DisconnectReason::Unknown`] when the connect call succeeded but
    /// the socket is not actually connected. Fails fast with `Disposed` after
    /// disposal.
    pub async fn connect(&self, remote: SocketAddr) -> Result<bool> {
        self.lifecycle.ensure_active()?;

        if self.is_connected() && self.inner.lock().remote == Some(remote) {
            return Ok(true);
        }

        self.teardown_connection();
        self.inner.lock().state = ClientState::Connecting;

        let stream = match Self::open_stream(&self.config, remote).await {
            Ok(stream) => stream,
            Err(reason) => {
                self.inner.lock().state = ClientState::Disconnected;
                tracing::debug!(
                    target: "horizon_conduit_net::tcp",
                    %remote,
                    %reason,
                    "connect failed"
                );
                self.connection_failed.emit(reason);
                return Ok(false);
            }
        };

        // The connect call can report success without the socket actually
        // being connected; that ambiguous outcome is kept distinct from a
        // classified fault.
        let peer_addr = match stream.peer_addr() {
            Ok(addr) => addr,
            Err(_) => {
                self.inner.lock().state = ClientState::Disconnected;
                self.connection_failed.emit(DisconnectReason::Unknown);
                return Ok(false);
            }
        };

        if self.config.socket.no_delay
            && let Err(e) = stream.set_nodelay(true)
        {
            tracing::warn!(
                target: "horizon_conduit_net::tcp",
                error = %e,
                "failed to set TCP_NODELAY"
            );
        }

        let local_addr = match stream.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                self.inner.lock().state = ClientState::Disconnected;
                self.connection_failed.emit(classify(e));
                return Ok(false);
            }
        };

        let conn = TcpConnection::new(stream, local_addr, peer_addr, &self.config.socket, None);

        // Wire the connection's events through to the client's own signals.
        let packet_received = self.packet_received.clone();
        conn.packet_received.connect(move |packet| {
            packet_received.emit(packet.clone());
        });

        let disconnected = self.disconnected.clone();
        let inner = self.inner.clone();
        conn.disconnected.connect(move |reason| {
            {
                let mut guard = inner.lock();
                guard.state = ClientState::Disconnected;
                guard.connection = None;
                guard.remote = None;
            }
            disconnected.emit(reason.clone());
        });

        {
            let mut guard = self.inner.lock();
            guard.state = ClientState::Connected;
            guard.connection = Some(conn);
            guard.remote = Some(remote);
        }

        tracing::debug!(
            target: "horizon_conduit_net::tcp",
            %remote,
            "connected"
        );
        self.connected.emit(peer_addr);
        Ok(true)
    }

    /// Create a socket bound to the configured local endpoint and connect it.
    async fn open_stream(
        config: &TcpClientConfig,
        remote: SocketAddr,
    ) -> std::result::Result<TcpStream, DisconnectReason> {
        let socket = match remote {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(classify)?;

        if let Some(local) = config.local_bind {
            socket.bind(local).map_err(classify)?;
        }

        classified(socket.connect(remote)).await
    }

    /// Tear down the current connection, if any.
    ///
    /// Safe to call when not connected. Fails fast with `Disposed` after
    /// disposal.
    pub fn disconnect(&self) -> Result<()> {
        self.lifecycle.ensure_active()?;
        self.teardown_connection();
        Ok(())
    }

    /// Send data over the current connection.
    ///
    /// A silent no-op when not connected. Fails fast with `Disposed` after
    /// disposal.
    pub fn send(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.lifecycle.ensure_active()?;
        let conn = self.inner.lock().connection.clone();
        if let Some(conn) = conn {
            let _ = conn.send(data.into());
        }
        Ok(())
    }

    /// Dispose the client, tearing down any live connection.
    ///
    /// Idempotent; after disposal every operation fails fast.
    pub fn dispose(&self) {
        if self.lifecycle.dispose() {
            self.teardown_connection();
        }
    }

    fn teardown_connection(&self) {
        let conn = {
            let mut guard = self.inner.lock();
            guard.state = ClientState::Disconnected;
            guard.remote = None;
            guard.connection.take()
        };
        if let Some(conn) = conn {
            // Already-disposed means the connection beat us to it; nothing to
            // tear down.
            let _ = conn.disconnect();
        }
    }
}

impl Drop for TcpClient {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for TcpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpClient")
            .field("state", &self.state())
            .field("remote", &self.remote_addr())
            .finish()
    }
}
