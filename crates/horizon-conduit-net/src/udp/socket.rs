//! UDP endpoint socket: one bound datagram socket with polling loops and an
//! endpoint registry.

use std::net::SocketAddr;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use horizon_conduit_core::{Lifecycle, RecurrentTask, Signal, StepControl};
use parking_lot::Mutex;
use tokio::net::UdpSocket as TokioUdpSocket;

use super::config::{Datagram, UdpSocketConfig};
use crate::error::{Result, TransportError};
use crate::fault::classify;

/// The connectionless counterpart of a TCP connection: one bound datagram
/// socket with a send loop, a receive loop, and a registry of known remote
/// endpoints for broadcast.
///
/// The registry is advisory bookkeeping, not an OS-level association: it is
/// purely additive, deduplicated by address+port equality, and membership
/// does not imply liveness — there is no removal on send failure.
///
/// Inbound datagrams are delivered regardless of sender: the registry does
/// not filter receives. Every [`Datagram`] carries its source endpoint, so
/// callers that want a single-peer view filter on that.
///
/// Faults never dispose the socket; they are classified and reported on the
/// [`error`](Self::error) signal. The socket lives until
/// [`dispose`](Self::dispose) (or drop).
///
/// # Signals
///
/// - [`datagram_received`](Self::datagram_received): a datagram arrived
/// - [`error`](Self::error): a send or receive attempt failed
///
/// # Example
///
/// ```ignore
/// let socket = UdpEndpointSocket::bind(UdpSocketConfig::any_address(0)).await?;
///
/// socket.datagram_received.connect(|datagram| {
///     println!("{} bytes from {}", datagram.data.len(), datagram.source);
/// });
///
/// let peer = "127.0.0.1:9000".parse().unwrap();
/// socket.register_connection(peer)?;
/// socket.send_to_all(b"hello".to_vec())?;
/// ```
pub struct UdpEndpointSocket {
    config: UdpSocketConfig,
    local_addr: SocketAddr,
    lifecycle: Arc<Lifecycle>,
    endpoints: Arc<Mutex<Vec<SocketAddr>>>,
    send_queue: Sender<(Vec<u8>, SocketAddr)>,
    send_task: RecurrentTask,
    recv_task: RecurrentTask,

    /// Signal emitted when a datagram is received.
    pub datagram_received: Arc<Signal<Datagram>>,
    /// Signal emitted when a send or receive attempt fails.
    pub error: Arc<Signal<TransportError>>,
}

impl UdpEndpointSocket {
    /// Bind the socket and start its send and receive loops.
    pub async fn bind(config: UdpSocketConfig) -> Result<Arc<Self>> {
        let bind_addr = config.bind_addr();
        let socket = TokioUdpSocket::bind(&bind_addr)
            .await
            .map_err(|e| TransportError::Bind {
                addr: bind_addr.clone(),
                message: e.to_string(),
            })?;
        let local_addr = socket.local_addr().map_err(|e| TransportError::Bind {
            addr: bind_addr,
            message: e.to_string(),
        })?;

        let socket = Arc::new(socket);
        let lifecycle = Arc::new(Lifecycle::new("UdpEndpointSocket"));
        let (send_queue, drain) = crossbeam_channel::unbounded();
        let datagram_received = Arc::new(Signal::new());
        let error = Arc::new(Signal::new());

        let send_task = Self::spawn_send_loop(
            lifecycle.clone(),
            socket.clone(),
            drain,
            error.clone(),
            &config,
        );
        let recv_task = Self::spawn_recv_loop(
            lifecycle.clone(),
            socket,
            datagram_received.clone(),
            error.clone(),
            &config,
        );

        tracing::info!(
            target: "horizon_conduit_net::udp",
            %local_addr,
            "socket bound"
        );

        Ok(Arc::new(Self {
            config,
            local_addr,
            lifecycle,
            endpoints: Arc::new(Mutex::new(Vec::new())),
            send_queue,
            send_task,
            recv_task,
            datagram_received,
            error,
        }))
    }

    /// The address the socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether the socket is still bound and polling.
    pub fn is_bound(&self) -> bool {
        !self.lifecycle.is_disposed()
    }

    /// Whether the socket has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.lifecycle.is_disposed()
    }

    /// The number of registered endpoints.
    pub fn connection_count(&self) -> usize {
        self.endpoints.lock().len()
    }

    /// Enqueue a datagram for one remote endpoint.
    ///
    /// Non-blocking; the send loop drains the shared queue on its next tick.
    /// The queue is unbounded; callers that can outpace the network should
    /// apply their own backpressure. Fails only when the socket is disposed.
    pub fn send_to(&self, data: impl Into<Vec<u8>>, remote: SocketAddr) -> Result<()> {
        self.lifecycle.ensure_active()?;
        let _ = self.send_queue.send((data.into(), remote));
        Ok(())
    }

    /// Enqueue one datagram per registered endpoint, in registration order.
    pub fn send_to_all(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.lifecycle.ensure_active()?;
        let data = data.into();
        for endpoint in self.endpoints.lock().iter() {
            let _ = self.send_queue.send((data.clone(), *endpoint));
        }
        Ok(())
    }

    /// Register a remote endpoint for [`send_to_all`](Self::send_to_all).
    ///
    /// Deduplicated by address+port equality; registering a known endpoint is
    /// a no-op. There is no removal path.
    pub fn register_connection(&self, endpoint: SocketAddr) -> Result<()> {
        self.lifecycle.ensure_active()?;
        let mut endpoints = self.endpoints.lock();
        if !endpoints.contains(&endpoint) {
            endpoints.push(endpoint);
        }
        Ok(())
    }

    /// Whether an endpoint has been registered.
    pub fn is_connection(&self, endpoint: SocketAddr) -> Result<bool> {
        self.lifecycle.ensure_active()?;
        Ok(self.endpoints.lock().contains(&endpoint))
    }

    /// Stop both loops and tear the socket down.
    ///
    /// Idempotent; after disposal every operation fails fast.
    pub fn dispose(&self) {
        if self.lifecycle.dispose() {
            self.send_task.cancel();
            self.recv_task.cancel();
            tracing::info!(
                target: "horizon_conduit_net::udp",
                local_addr = %self.local_addr,
                "socket disposed"
            );
        }
    }

    /// One tick: drain the entire queue, one datagram send per entry. Send
    /// faults are reported but do not dispose the socket.
    fn spawn_send_loop(
        lifecycle: Arc<Lifecycle>,
        socket: Arc<TokioUdpSocket>,
        drain: Receiver<(Vec<u8>, SocketAddr)>,
        error: Arc<Signal<TransportError>>,
        config: &UdpSocketConfig,
    ) -> RecurrentTask {
        RecurrentTask::spawn(config.tick_interval, move || {
            let lifecycle = lifecycle.clone();
            let socket = socket.clone();
            let drain = drain.clone();
            let error = error.clone();

            async move {
                loop {
                    if lifecycle.is_disposed() {
                        return StepControl::Stop;
                    }
                    match drain.try_recv() {
                        Ok((data, target)) => {
                            if let Err(e) = socket.send_to(&data, target).await {
                                tracing::warn!(
                                    target: "horizon_conduit_net::udp",
                                    %target,
                                    error = %e,
                                    "datagram send failed"
                                );
                                error.emit(TransportError::Socket(classify(e)));
                            }
                        }
                        Err(TryRecvError::Empty) => return StepControl::Continue,
                        Err(TryRecvError::Disconnected) => return StepControl::Stop,
                    }
                }
            }
        })
    }

    /// One tick: drain all currently available datagrams, one receive event
    /// per datagram with the sender's endpoint attached.
    fn spawn_recv_loop(
        lifecycle: Arc<Lifecycle>,
        socket: Arc<TokioUdpSocket>,
        datagram_received: Arc<Signal<Datagram>>,
        error: Arc<Signal<TransportError>>,
        config: &UdpSocketConfig,
    ) -> RecurrentTask {
        let buffer_size = config.recv_buffer_size;

        RecurrentTask::spawn(config.tick_interval, move || {
            let lifecycle = lifecycle.clone();
            let socket = socket.clone();
            let datagram_received = datagram_received.clone();
            let error = error.clone();

            async move {
                loop {
                    if lifecycle.is_disposed() {
                        return StepControl::Stop;
                    }

                    let mut buffer = vec![0u8; buffer_size];
                    match socket.try_recv_from(&mut buffer) {
                        Ok((n, source)) => {
                            buffer.truncate(n);
                            datagram_received.emit(Datagram::new(buffer, source));
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                            return StepControl::Continue;
                        }
                        Err(e) => {
                            tracing::warn!(
                                target: "horizon_conduit_net::udp",
                                error = %e,
                                "datagram receive failed"
                            );
                            error.emit(TransportError::Socket(classify(e)));
                            return StepControl::Continue;
                        }
                    }
                }
            }
        })
    }
}

impl Drop for UdpEndpointSocket {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for UdpEndpointSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpEndpointSocket")
            .field("bind_addr", &self.config.bind_addr())
            .field("local_addr", &self.local_addr)
            .field("is_bound", &self.is_bound())
            .field("endpoints", &self.connection_count())
            .finish()
    }
}
