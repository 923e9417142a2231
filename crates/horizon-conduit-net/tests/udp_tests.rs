//! Tests for the UDP endpoint socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use horizon_conduit_net::TransportError;
use horizon_conduit_net::udp::{Datagram, UdpEndpointSocket, UdpSocketConfig};

#[test]
fn test_config_builder() {
    let config = UdpSocketConfig::new("0.0.0.0", 8080)
        .recv_buffer_size(32768)
        .tick_interval(Duration::from_millis(5));

    assert_eq!(config.bind_address, "0.0.0.0");
    assert_eq!(config.port, 8080);
    assert_eq!(config.bind_addr(), "0.0.0.0:8080");
    assert_eq!(config.recv_buffer_size, 32768);
    assert_eq!(config.tick_interval, Duration::from_millis(5));
}

#[test]
fn test_any_address_config() {
    let config = UdpSocketConfig::any_address(5000);
    assert_eq!(config.bind_address, "0.0.0.0");
    assert_eq!(config.port, 5000);
}

#[test]
fn test_datagram_creation() {
    let data = vec![1, 2, 3, 4];
    let source: SocketAddr = "192.168.1.100:5000".parse().unwrap();
    let datagram = Datagram::new(data.clone(), source);

    assert_eq!(datagram.data, data);
    assert_eq!(datagram.source, source);
}

async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_socket_bind() {
    let socket = UdpEndpointSocket::bind(UdpSocketConfig::new("127.0.0.1", 0))
        .await
        .unwrap();

    assert!(socket.is_bound());
    assert!(!socket.is_disposed());
    assert_ne!(socket.local_addr().port(), 0);
    assert_eq!(socket.connection_count(), 0);

    socket.dispose();
    assert!(!socket.is_bound());
}

#[tokio::test]
async fn test_register_connection_dedup() {
    let socket = UdpEndpointSocket::bind(UdpSocketConfig::new("127.0.0.1", 0))
        .await
        .unwrap();

    let e1: SocketAddr = "127.0.0.1:9001".parse().unwrap();
    let e2: SocketAddr = "127.0.0.1:9002".parse().unwrap();

    socket.register_connection(e1).unwrap();
    socket.register_connection(e1).unwrap();
    socket.register_connection(e2).unwrap();

    assert_eq!(socket.connection_count(), 2);
    assert!(socket.is_connection(e1).unwrap());
    assert!(socket.is_connection(e2).unwrap());
    assert!(
        !socket
            .is_connection("127.0.0.1:9003".parse().unwrap())
            .unwrap()
    );

    socket.dispose();
}

#[tokio::test]
async fn test_send_receive() {
    let sender = UdpEndpointSocket::bind(UdpSocketConfig::new("127.0.0.1", 0))
        .await
        .unwrap();
    let receiver = UdpEndpointSocket::bind(UdpSocketConfig::new("127.0.0.1", 0))
        .await
        .unwrap();

    let received: Arc<parking_lot::Mutex<Vec<Datagram>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));
    let received_clone = received.clone();
    receiver.datagram_received.connect(move |datagram| {
        received_clone.lock().push(datagram.clone());
    });

    let payload = b"Hello, UDP!";
    sender
        .send_to(payload.to_vec(), receiver.local_addr())
        .unwrap();

    assert!(wait_until(|| !received.lock().is_empty()).await);

    let datagram = received.lock()[0].clone();
    assert_eq!(datagram.data, payload);
    assert_eq!(datagram.source, sender.local_addr());

    sender.dispose();
    receiver.dispose();
}

#[tokio::test]
async fn test_send_to_all_broadcast() {
    let sender = UdpEndpointSocket::bind(UdpSocketConfig::new("127.0.0.1", 0))
        .await
        .unwrap();
    let receiver1 = UdpEndpointSocket::bind(UdpSocketConfig::new("127.0.0.1", 0))
        .await
        .unwrap();
    let receiver2 = UdpEndpointSocket::bind(UdpSocketConfig::new("127.0.0.1", 0))
        .await
        .unwrap();

    let received1: Arc<parking_lot::Mutex<Vec<Datagram>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));
    let received1_clone = received1.clone();
    receiver1.datagram_received.connect(move |datagram| {
        received1_clone.lock().push(datagram.clone());
    });

    let received2: Arc<parking_lot::Mutex<Vec<Datagram>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));
    let received2_clone = received2.clone();
    receiver2.datagram_received.connect(move |datagram| {
        received2_clone.lock().push(datagram.clone());
    });

    sender.register_connection(receiver1.local_addr()).unwrap();
    sender.register_connection(receiver2.local_addr()).unwrap();

    let payload = b"to everyone";
    sender.send_to_all(payload.to_vec()).unwrap();

    // Exactly one datagram per registered endpoint.
    assert!(wait_until(|| !received1.lock().is_empty() && !received2.lock().is_empty()).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(received1.lock().len(), 1);
    assert_eq!(received1.lock()[0].data, payload);
    assert_eq!(received2.lock().len(), 1);
    assert_eq!(received2.lock()[0].data, payload);

    sender.dispose();
    receiver1.dispose();
    receiver2.dispose();
}

#[tokio::test]
async fn test_receive_is_not_filtered_by_registry() {
    let receiver = UdpEndpointSocket::bind(UdpSocketConfig::new("127.0.0.1", 0))
        .await
        .unwrap();
    // The registry names a different peer entirely.
    receiver
        .register_connection("127.0.0.1:9099".parse().unwrap())
        .unwrap();

    let received: Arc<parking_lot::Mutex<Vec<Datagram>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));
    let received_clone = received.clone();
    receiver.datagram_received.connect(move |datagram| {
        received_clone.lock().push(datagram.clone());
    });

    // An unregistered sender's datagram is still delivered, with its source
    // attached so the caller can filter if it wants to.
    let stranger = UdpEndpointSocket::bind(UdpSocketConfig::new("127.0.0.1", 0))
        .await
        .unwrap();
    stranger
        .send_to(b"unsolicited".to_vec(), receiver.local_addr())
        .unwrap();

    assert!(wait_until(|| !received.lock().is_empty()).await);
    assert_eq!(received.lock()[0].source, stranger.local_addr());

    stranger.dispose();
    receiver.dispose();
}

#[tokio::test]
async fn test_drains_all_available_datagrams() {
    let sender = UdpEndpointSocket::bind(UdpSocketConfig::new("127.0.0.1", 0))
        .await
        .unwrap();
    let receiver = UdpEndpointSocket::bind(UdpSocketConfig::new("127.0.0.1", 0))
        .await
        .unwrap();

    let received: Arc<parking_lot::Mutex<Vec<Datagram>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));
    let received_clone = received.clone();
    receiver.datagram_received.connect(move |datagram| {
        received_clone.lock().push(datagram.clone());
    });

    for i in 0..5u8 {
        sender.send_to(vec![i], receiver.local_addr()).unwrap();
    }

    // One event per datagram, not one per tick.
    assert!(wait_until(|| received.lock().len() == 5).await);

    sender.dispose();
    receiver.dispose();
}

#[tokio::test]
async fn test_post_disposal_fail_fast() {
    let socket = UdpEndpointSocket::bind(UdpSocketConfig::new("127.0.0.1", 0))
        .await
        .unwrap();
    let endpoint: SocketAddr = "127.0.0.1:9001".parse().unwrap();

    socket.dispose();
    socket.dispose(); // idempotent

    assert!(socket.is_disposed());
    assert!(matches!(
        socket.send_to(b"late".to_vec(), endpoint),
        Err(TransportError::Disposed(_))
    ));
    assert!(matches!(
        socket.send_to_all(b"late".to_vec()),
        Err(TransportError::Disposed(_))
    ));
    assert!(matches!(
        socket.register_connection(endpoint),
        Err(TransportError::Disposed(_))
    ));
    assert!(matches!(
        socket.is_connection(endpoint),
        Err(TransportError::Disposed(_))
    ));
}
