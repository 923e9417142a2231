//! Datagram transport: the UDP endpoint socket.
//!
//! # Example
//!
//! ```ignore
//! use horizon_conduit_net::udp::{UdpEndpointSocket, UdpSocketConfig};
//!
//! let socket = UdpEndpointSocket::bind(UdpSocketConfig::new("0.0.0.0", 5000)).await?;
//!
//! socket.datagram_received.connect(|datagram| {
//!     println!("{} bytes from {}", datagram.data.len(), datagram.source);
//! });
//!
//! // Direct send
//! socket.send_to(b"hello".to_vec(), "127.0.0.1:9000".parse().unwrap())?;
//!
//! // Broadcast to the registered endpoints
//! socket.register_connection("127.0.0.1:9001".parse().unwrap())?;
//! socket.register_connection("127.0.0.1:9002".parse().unwrap())?;
//! socket.send_to_all(b"to everyone".to_vec())?;
//! ```

mod config;
mod socket;

pub use config::{Datagram, UdpSocketConfig};
pub use socket::UdpEndpointSocket;
