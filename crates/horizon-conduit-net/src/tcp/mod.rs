//! Stream transport: TCP connections, servers and clients.
//!
//! - **[`TcpConnection`]**: one established stream socket with its own send
//!   and receive loops and a single disconnect lifecycle
//! - **[`TcpServer`]**: accepts inbound connections and tracks them in a
//!   registry until they disconnect
//! - **[`TcpClient`]**: initiates connections, at most one at a time
//!
//! # Client example
//!
//! ```ignore
//! use horizon_conduit_net::tcp::{TcpClient, TcpClientConfig};
//!
//! let client = TcpClient::new(TcpClientConfig::new().no_delay(true));
//!
//! client.packet_received.connect(|packet| {
//!     println!("received {} bytes", packet.data.len());
//! });
//! client.disconnected.connect(|reason| {
//!     println!("disconnected: {}", reason);
//! });
//!
//! if client.connect("127.0.0.1:8080".parse().unwrap()).await? {
//!     client.send(b"hello".to_vec())?;
//! }
//! ```
//!
//! # Server example
//!
//! ```ignore
//! use horizon_conduit_net::tcp::{TcpServer, TcpServerConfig};
//!
//! let server = TcpServer::bind(TcpServerConfig::new("0.0.0.0", 8080)).await?;
//!
//! server.client_connected.connect(|conn| {
//!     println!("new connection from {}", conn.peer_addr());
//! });
//! server.packet_received.connect(|packet| {
//!     println!("{} sent {} bytes", packet.sender, packet.data.len());
//! });
//! ```

mod client;
mod config;
mod connection;
mod server;
mod state;

pub use client::TcpClient;
pub use config::{TcpClientConfig, TcpServerConfig, TcpSocketConfig};
pub use connection::{ConnectionId, Packet, TcpConnection};
pub use server::TcpServer;
pub use state::ClientState;
