//! A live wrapper around one established stream socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use horizon_conduit_core::{Lifecycle, RecurrentTask, Signal, StepControl};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex as AsyncMutex, mpsc};

use super::config::TcpSocketConfig;
use crate::error::Result;
use crate::fault::{DisconnectReason, classified, classify};

/// Unique identifier for a TCP connection.
///
/// This is the registry and lookup identity for server-side connections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Create a new connection ID.
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A byte buffer together with the connection it arrived on.
///
/// No framing is imposed: the buffer grouping is a function of arrival
/// timing, not of how the bytes were originally sent.
#[derive(Clone, Debug)]
pub struct Packet {
    /// The connection the data arrived from.
    pub sender: ConnectionId,
    /// The received bytes.
    pub data: Vec<u8>,
}

/// State shared between the public handle and the two polling loops.
struct Shared {
    id: ConnectionId,
    lifecycle: Lifecycle,
    packet_received: Arc<Signal<Packet>>,
    disconnected: Arc<Signal<DisconnectReason>>,
    /// Channel back to the owning server's accept loop, if any.
    notifier: Option<mpsc::UnboundedSender<(ConnectionId, DisconnectReason)>>,
}

impl Shared {
    /// Convert a detected fault (or explicit request) into the single
    /// disconnect of this connection's lifetime.
    ///
    /// Whichever loop or caller gets here first wins; everyone else finds the
    /// lifecycle already disposed and does nothing. Returns whether this call
    /// performed the disconnect.
    fn handle_disconnect(&self, reason: DisconnectReason) -> bool {
        if !self.lifecycle.dispose() {
            return false;
        }
        tracing::debug!(
            target: "horizon_conduit_net::tcp",
            id = %self.id,
            %reason,
            "connection disconnected"
        );
        if let Some(notifier) = &self.notifier {
            let _ = notifier.send((self.id, reason.clone()));
        }
        self.disconnected.emit(reason);
        true
    }
}

/// A connection wrapping one connected stream socket.
///
/// Owns a thread-safe FIFO send queue drained by a send loop, and a receive
/// loop that polls the socket for available data. Any classified fault from
/// either loop disconnects the connection exactly once and disposes it; a
/// disposed connection fails fast on every operation and must be replaced
/// with a new one.
///
/// # Signals
///
/// - [`packet_received`](Self::packet_received): data arrived from the peer
/// - [`disconnected`](Self::disconnected): the connection ended; fires at
///   most once, with the reason
pub struct TcpConnection {
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
    shared: Arc<Shared>,
    send_queue: Sender<Vec<u8>>,
    send_task: RecurrentTask,
    recv_task: RecurrentTask,

    /// Signal emitted when data is received.
    pub packet_received: Arc<Signal<Packet>>,
    /// Signal emitted when the connection ends; at most once.
    pub disconnected: Arc<Signal<DisconnectReason>>,
}

impl TcpConnection {
    /// Wrap a connected stream and start its send and receive loops.
    ///
    /// The stream must already be connected; a dead socket is detected by the
    /// loops on their first attempt and turned into a fault disconnect.
    pub(crate) fn new(
        stream: TcpStream,
        local_addr: SocketAddr,
        peer_addr: SocketAddr,
        config: &TcpSocketConfig,
        notifier: Option<mpsc::UnboundedSender<(ConnectionId, DisconnectReason)>>,
    ) -> Arc<Self> {
        let (reader, writer) = stream.into_split();
        let (send_queue, drain) = crossbeam_channel::unbounded();

        let packet_received = Arc::new(Signal::new());
        let disconnected = Arc::new(Signal::new());

        let shared = Arc::new(Shared {
            id: ConnectionId::new(),
            lifecycle: Lifecycle::new("TcpConnection"),
            packet_received: packet_received.clone(),
            disconnected: disconnected.clone(),
            notifier,
        });

        let send_task = Self::spawn_send_loop(shared.clone(), writer, drain, config);
        let recv_task = Self::spawn_recv_loop(shared.clone(), reader, config);

        Arc::new(Self {
            local_addr,
            peer_addr,
            shared,
            send_queue,
            send_task,
            recv_task,
            packet_received,
            disconnected,
        })
    }

    /// Get the unique connection ID.
    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    /// Get the local socket address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get the peer socket address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Check if the connection is still active.
    pub fn is_connected(&self) -> bool {
        !self.is_disposed()
    }

    /// Whether the connection has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.shared.lifecycle.is_disposed()
    }

    /// Enqueue data for sending.
    ///
    /// Non-blocking; delivery happens on the send loop's next tick, in FIFO
    /// order. The queue is unbounded: a stalled peer grows it without limit,
    /// so callers that can outpace the network should apply their own
    /// backpressure. Fails only when the connection is disposed.
    pub fn send(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.shared.lifecycle.ensure_active()?;
        // A send error here means the loop already exited in a disposal race;
        // the buffer is dropped like any other late effect.
        let _ = self.send_queue.send(data.into());
        Ok(())
    }

    /// Disconnect this connection.
    ///
    /// Disposes the connection and fires [`disconnected`](Self::disconnected)
    /// with an explicit reason. Fails with `Disposed` if already disposed; a
    /// connection disconnects at most once.
    pub fn disconnect(&self) -> Result<()> {
        self.shared.lifecycle.ensure_active()?;
        if self.shared.handle_disconnect(DisconnectReason::Explicit) {
            self.send_task.cancel();
            self.recv_task.cancel();
        }
        Ok(())
    }

    /// One tick: drain the send queue in FIFO order; a classified fault on
    /// any write disconnects and stops draining.
    fn spawn_send_loop(
        shared: Arc<Shared>,
        writer: OwnedWriteHalf,
        drain: Receiver<Vec<u8>>,
        config: &TcpSocketConfig,
    ) -> RecurrentTask {
        let writer = Arc::new(AsyncMutex::new(writer));

        RecurrentTask::spawn(config.tick_interval, move || {
            let shared = shared.clone();
            let writer = writer.clone();
            let drain = drain.clone();

            async move {
                loop {
                    if shared.lifecycle.is_disposed() {
                        return StepControl::Stop;
                    }
                    match drain.try_recv() {
                        Ok(data) => {
                            let mut writer = writer.lock().await;
                            if let Err(reason) = classified(writer.write_all(&data)).await {
                                shared.handle_disconnect(reason);
                                return StepControl::Stop;
                            }
                        }
                        Err(TryRecvError::Empty) => return StepControl::Continue,
                        Err(TryRecvError::Disconnected) => return StepControl::Stop,
                    }
                }
            }
        })
    }

    /// One tick: read whatever is currently available; end-of-file and
    /// classified faults disconnect, data becomes one packet emission.
    fn spawn_recv_loop(
        shared: Arc<Shared>,
        reader: OwnedReadHalf,
        config: &TcpSocketConfig,
    ) -> RecurrentTask {
        let reader = Arc::new(reader);
        let buffer_size = config.read_buffer_size;

        RecurrentTask::spawn(config.tick_interval, move || {
            let shared = shared.clone();
            let reader = reader.clone();

            async move {
                if shared.lifecycle.is_disposed() {
                    return StepControl::Stop;
                }

                let mut buffer = vec![0u8; buffer_size];
                match reader.try_read(&mut buffer) {
                    Ok(0) => {
                        shared.handle_disconnect(DisconnectReason::peer_closed());
                        StepControl::Stop
                    }
                    Ok(n) => {
                        buffer.truncate(n);
                        if !shared.lifecycle.is_disposed() {
                            shared.packet_received.emit(Packet {
                                sender: shared.id,
                                data: buffer,
                            });
                        }
                        StepControl::Continue
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => StepControl::Continue,
                    Err(e) => {
                        shared.handle_disconnect(classify(e));
                        StepControl::Stop
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for TcpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpConnection")
            .field("id", &self.shared.id)
            .field("local_addr", &self.local_addr)
            .field("peer_addr", &self.peer_addr)
            .field("is_connected", &self.is_connected())
            .finish()
    }
}
