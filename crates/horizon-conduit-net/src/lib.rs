//! Transport layer for Horizon Conduit.
//!
//! This crate wraps raw stream (TCP) and datagram (UDP) sockets with
//! self-managing send/receive loops, connection lifecycle tracking and
//! disconnect detection, exposing an event-driven byte-transfer API:
//!
//! - **[`tcp::TcpConnection`]**: one established stream socket with a FIFO
//!   send queue, independent send/receive loops and a single disconnect
//!   lifecycle
//! - **[`tcp::TcpServer`]**: accepts inbound connections, tracks them in a
//!   registry, fans out broadcasts and re-emits child events tagged with the
//!   sender's identity
//! - **[`tcp::TcpClient`]**: initiates connections, at most one at a time,
//!   with classified connect outcomes
//! - **[`udp::UdpEndpointSocket`]**: one bound datagram socket with polling
//!   loops and an additive registry of known remote endpoints
//!
//! # Failure model
//!
//! Every send, receive and connect attempt runs through the fault classifier
//! ([`fault::classify`]): socket errors become uniform [`DisconnectReason`]
//! values. On a stream connection a fault is resolved by disconnecting —
//! exactly one `disconnected` emission per connection lifetime — and never
//! escapes to the caller. The UDP socket and the server's accept loop report
//! classified faults on their `error` signals and keep running. Operations on
//! a disposed component fail fast with [`TransportError::Disposed`].
//!
//! # Delivery model
//!
//! No wire framing is defined here: a receive event may group bytes
//! differently than they were sent, subject to stream semantics. FIFO order
//! holds within one connection's send queue; nothing is guaranteed across
//! connections or between the send and receive directions. All send queues
//! are unbounded — backpressure is the caller's responsibility.
//!
//! Events are delivered through [`horizon_conduit_core::Signal`] fields and
//! may fire from transport worker tasks; slots must be `Send + Sync`.

mod error;
pub mod fault;
pub mod tcp;
pub mod udp;

pub use error::{Result, TransportError};
pub use fault::DisconnectReason;

// Re-export commonly used types at the crate root
pub use tcp::{
    ClientState, ConnectionId, Packet, TcpClient, TcpClientConfig, TcpConnection, TcpServer,
    TcpServerConfig, TcpSocketConfig,
};
pub use udp::{Datagram, UdpEndpointSocket, UdpSocketConfig};
