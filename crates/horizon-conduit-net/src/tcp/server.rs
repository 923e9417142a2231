//! TCP server: accept loop, connection registry, broadcast.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use horizon_conduit_core::{Lifecycle, RecurrentTask, Signal, StepControl};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::{Mutex as AsyncMutex, Notify, mpsc};

use super::config::TcpServerConfig;
use super::connection::{ConnectionId, Packet, TcpConnection};
use crate::error::{Result, TransportError};
use crate::fault::{DisconnectReason, classify};

/// The live-connection registry.
///
/// Membership invariant: a connection is present iff it has connected and not
/// yet disconnected. Mutated from the accept loop and read from caller
/// threads during broadcast/lookup, so access always takes the lock.
type Registry = Mutex<HashMap<ConnectionId, Arc<TcpConnection>>>;

/// A TCP server that accepts inbound connections and tracks them until they
/// disconnect.
///
/// Each accepted socket is wrapped in a [`TcpConnection`]; its events are
/// re-emitted by the server tagged with the connection's identity. Sends to
/// unknown or already-disposed connections are silent no-ops — broadcast is
/// best effort.
///
/// # Signals
///
/// - [`client_connected`](Self::client_connected): a new connection was
///   accepted and registered
/// - [`client_disconnected`](Self::client_disconnected): a registered
///   connection ended; carries the identity and the reason
/// - [`packet_received`](Self::packet_received): data arrived on any
///   registered connection
/// - [`error`](Self::error): an accept attempt failed (the loop keeps going)
///
/// # Example
///
/// ```ignore
/// let server = TcpServer::bind(TcpServerConfig::new("0.0.0.0", 8080)).await?;
///
/// server.client_connected.connect(|conn| {
///     println!("new connection {} from {}", conn.id(), conn.peer_addr());
/// });
/// server.packet_received.connect(|packet| {
///     println!("{} sent {} bytes", packet.sender, packet.data.len());
/// });
/// ```
pub struct TcpServer {
    config: TcpServerConfig,
    local_addr: SocketAddr,
    lifecycle: Arc<Lifecycle>,
    registry: Arc<Registry>,
    shutdown: Arc<Notify>,
    accept_task: RecurrentTask,

    /// Signal emitted when a new connection is accepted.
    pub client_connected: Arc<Signal<Arc<TcpConnection>>>,
    /// Signal emitted when a registered connection disconnects.
    pub client_disconnected: Arc<Signal<(ConnectionId, DisconnectReason)>>,
    /// Signal emitted when data is received on any connection.
    pub packet_received: Arc<Signal<Packet>>,
    /// Signal emitted when an accept attempt fails.
    pub error: Arc<Signal<TransportError>>,
}

impl TcpServer {
    /// Bind the listener and start the accept loop.
    ///
    /// The server lives until [`dispose`](Self::dispose) (or drop); it does
    /// not terminate itself. Bind to port 0 to get an OS-assigned port,
    /// readable from [`local_addr`](Self::local_addr).
    pub async fn bind(config: TcpServerConfig) -> Result<Arc<Self>> {
        let bind_addr = config.bind_addr();
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| TransportError::Bind {
                addr: bind_addr.clone(),
                message: e.to_string(),
            })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: bind_addr,
            message: e.to_string(),
        })?;

        let lifecycle = Arc::new(Lifecycle::new("TcpServer"));
        let registry: Arc<Registry> = Arc::new(Mutex::new(HashMap::new()));
        let shutdown = Arc::new(Notify::new());

        let client_connected = Arc::new(Signal::new());
        let client_disconnected = Arc::new(Signal::new());
        let packet_received = Arc::new(Signal::new());
        let error = Arc::new(Signal::new());

        let accept_task = Self::spawn_accept_loop(AcceptLoop {
            listener: Arc::new(listener),
            config: config.clone(),
            local_addr,
            lifecycle: lifecycle.clone(),
            registry: registry.clone(),
            shutdown: shutdown.clone(),
            client_connected: client_connected.clone(),
            client_disconnected: client_disconnected.clone(),
            packet_received: packet_received.clone(),
            error: error.clone(),
        });

        tracing::info!(
            target: "horizon_conduit_net::tcp",
            %local_addr,
            "server listening"
        );

        Ok(Arc::new(Self {
            config,
            local_addr,
            lifecycle,
            registry,
            shutdown,
            accept_task,
            client_connected,
            client_disconnected,
            packet_received,
            error,
        }))
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether the server is still accepting connections.
    pub fn is_listening(&self) -> bool {
        !self.lifecycle.is_disposed()
    }

    /// Whether the server has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.lifecycle.is_disposed()
    }

    /// The number of currently registered connections.
    pub fn connection_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// The identities of all registered connections.
    pub fn connections(&self) -> Vec<ConnectionId> {
        self.registry.lock().keys().copied().collect()
    }

    /// Look up a registered connection by identity.
    pub fn get_connection(&self, id: ConnectionId) -> Option<Arc<TcpConnection>> {
        self.registry.lock().get(&id).cloned()
    }

    /// Send to every registered connection, best effort.
    ///
    /// Iterates a snapshot of the registry; entries that disposed in the
    /// meantime are skipped silently.
    pub fn broadcast(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.lifecycle.ensure_active()?;
        let data = data.into();
        let snapshot: Vec<Arc<TcpConnection>> = self.registry.lock().values().cloned().collect();
        for conn in snapshot {
            if conn.is_disposed() {
                continue;
            }
            let _ = conn.send(data.clone());
        }
        Ok(())
    }

    /// Send to one connection by identity; silent no-op if unknown.
    pub fn send_to(&self, id: ConnectionId, data: impl Into<Vec<u8>>) -> Result<()> {
        self.lifecycle.ensure_active()?;
        if let Some(conn) = self.get_connection(id) {
            let _ = conn.send(data.into());
        }
        Ok(())
    }

    /// Disconnect one connection by identity; silent no-op if unknown.
    ///
    /// The registry entry is removed by the accept loop when the
    /// connection's disconnect notification arrives.
    pub fn disconnect_client(&self, id: ConnectionId) -> Result<()> {
        self.lifecycle.ensure_active()?;
        if let Some(conn) = self.get_connection(id) {
            let _ = conn.disconnect();
        }
        Ok(())
    }

    /// Disconnect every registered connection and clear the registry.
    pub fn disconnect_all(&self) -> Result<()> {
        self.lifecycle.ensure_active()?;
        self.disconnect_all_connections();
        Ok(())
    }

    /// Stop accepting, disconnect all connections and tear the server down.
    ///
    /// Idempotent; after disposal every operation fails fast.
    pub fn dispose(&self) {
        if self.lifecycle.dispose() {
            self.shutdown.notify_one();
            self.accept_task.cancel();
            self.disconnect_all_connections();
            tracing::info!(
                target: "horizon_conduit_net::tcp",
                local_addr = %self.local_addr,
                "server disposed"
            );
        }
    }

    fn disconnect_all_connections(&self) {
        let snapshot: Vec<Arc<TcpConnection>> = self.registry.lock().values().cloned().collect();
        for conn in snapshot {
            let _ = conn.disconnect();
        }
        self.registry.lock().clear();
    }

    /// One tick: race the next accept against child-disconnect notifications
    /// and shutdown. Accept failures are reported and never stop the loop.
    fn spawn_accept_loop(ctx: AcceptLoop) -> RecurrentTask {
        let (notify_tx, notify_rx) = mpsc::unbounded_channel::<(ConnectionId, DisconnectReason)>();
        let notify_rx = Arc::new(AsyncMutex::new(notify_rx));
        let tick = ctx.config.socket.tick_interval;
        let ctx = Arc::new(ctx);

        RecurrentTask::spawn(tick, move || {
            let ctx = ctx.clone();
            let notify_tx = notify_tx.clone();
            let notify_rx = notify_rx.clone();

            async move {
                if ctx.lifecycle.is_disposed() {
                    return StepControl::Stop;
                }

                tokio::select! {
                    _ = ctx.shutdown.notified() => StepControl::Stop,

                    // A child connection ended: registry mutation happens
                    // before the tagged event is re-emitted.
                    note = async { notify_rx.lock().await.recv().await } => {
                        if let Some((id, reason)) = note {
                            ctx.registry.lock().remove(&id);
                            ctx.client_disconnected.emit((id, reason));
                        }
                        StepControl::Continue
                    }

                    result = ctx.listener.accept() => {
                        match result {
                            Ok((stream, peer_addr)) => {
                                ctx.register(stream, peer_addr, notify_tx);
                            }
                            Err(e) => {
                                tracing::warn!(
                                    target: "horizon_conduit_net::tcp",
                                    error = %e,
                                    "accept failed"
                                );
                                ctx.error.emit(TransportError::Socket(classify(e)));
                            }
                        }
                        StepControl::Continue
                    }
                }
            }
        })
    }
}

/// Everything the accept loop owns.
struct AcceptLoop {
    listener: Arc<TcpListener>,
    config: TcpServerConfig,
    local_addr: SocketAddr,
    lifecycle: Arc<Lifecycle>,
    registry: Arc<Registry>,
    shutdown: Arc<Notify>,
    client_connected: Arc<Signal<Arc<TcpConnection>>>,
    client_disconnected: Arc<Signal<(ConnectionId, DisconnectReason)>>,
    packet_received: Arc<Signal<Packet>>,
    error: Arc<Signal<TransportError>>,
}

impl AcceptLoop {
    /// Wrap an accepted socket, wire its events, register it and announce it.
    fn register(
        &self,
        stream: tokio::net::TcpStream,
        peer_addr: SocketAddr,
        notify_tx: mpsc::UnboundedSender<(ConnectionId, DisconnectReason)>,
    ) {
        if self.config.socket.no_delay
            && let Err(e) = stream.set_nodelay(true)
        {
            tracing::warn!(
                target: "horizon_conduit_net::tcp",
                error = %e,
                "failed to set TCP_NODELAY"
            );
        }

        let conn = TcpConnection::new(
            stream,
            self.local_addr,
            peer_addr,
            &self.config.socket,
            Some(notify_tx),
        );

        // Re-emit the child's packets under the server's signal, tagged with
        // the child's identity.
        let packet_received = self.packet_received.clone();
        conn.packet_received.connect(move |packet| {
            packet_received.emit(packet.clone());
        });

        tracing::debug!(
            target: "horizon_conduit_net::tcp",
            id = %conn.id(),
            %peer_addr,
            "client connected"
        );

        self.registry.lock().insert(conn.id(), conn.clone());
        self.client_connected.emit(conn);
    }
}

impl Drop for TcpServer {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for TcpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpServer")
            .field("bind_addr", &self.config.bind_addr())
            .field("local_addr", &self.local_addr)
            .field("is_listening", &self.is_listening())
            .field("connections", &self.connection_count())
            .finish()
    }
}
