//! UDP Transport Implementation
//!
//! Carries mesh frames as UDP datagrams. Broadcasts go to a configured
//! broadcast (or unicast) address; every distinct source address seen on
//! the socket becomes an endpoint that can be addressed with `send_to`.
//!
//! `Transport` sends are synchronous, so datagrams are handed to a sender
//! task over a bounded queue and written with `send_to().await` there.

use super::{
    check_mtu, EndpointId, EventTx, Transport, TransportError, TransportEvent, TransportState,
};
use crate::config::UdpConfig;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Source addresses seen on the socket, each with a stable endpoint id.
#[derive(Default)]
struct EndpointTable {
    next_id: u64,
    by_addr: HashMap<SocketAddr, EndpointId>,
    by_id: HashMap<EndpointId, SocketAddr>,
}

impl EndpointTable {
    /// Look up `addr`, registering it if new. Returns the id and whether
    /// it was newly registered.
    fn resolve(&mut self, addr: SocketAddr) -> (EndpointId, bool) {
        if let Some(&id) = self.by_addr.get(&addr) {
            return (id, false);
        }
        self.next_id += 1;
        let id = EndpointId::new(self.next_id);
        self.by_addr.insert(addr, id);
        self.by_id.insert(id, addr);
        (id, true)
    }

    fn addr_of(&self, id: EndpointId) -> Option<SocketAddr> {
        self.by_id.get(&id).copied()
    }
}

type SharedTable = Arc<Mutex<EndpointTable>>;

/// Datagrams waiting for the sender task.
const SEND_QUEUE_SIZE: usize = 256;

type Outbound = (Vec<u8>, SocketAddr);

/// UDP broadcast transport.
///
/// Connectionless and unreliable. A datagram that finds the send queue
/// full is dropped.
pub struct UdpTransport {
    config: UdpConfig,
    state: TransportState,
    broadcast_addr: Option<SocketAddr>,
    local_addr: Option<SocketAddr>,
    endpoints: SharedTable,
    event_tx: EventTx,
    send_tx: Option<mpsc::Sender<Outbound>>,
    recv_task: Option<JoinHandle<()>>,
    send_task: Option<JoinHandle<()>>,
}

impl UdpTransport {
    /// Create a new UDP transport reporting to `event_tx`.
    pub fn new(config: UdpConfig, event_tx: EventTx) -> Self {
        Self {
            config,
            state: TransportState::Configured,
            broadcast_addr: None,
            local_addr: None,
            endpoints: SharedTable::default(),
            event_tx,
            send_tx: None,
            recv_task: None,
            send_task: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Get the local bound address (only valid after start).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Socket address behind an endpoint id, if it has been seen.
    pub fn endpoint_addr(&self, endpoint: EndpointId) -> Option<SocketAddr> {
        self.endpoints.lock().ok()?.addr_of(endpoint)
    }

    /// Bind the socket and spawn the receive and send loops.
    pub async fn start_async(&mut self) -> Result<(), TransportError> {
        if !self.state.can_start() {
            return Err(TransportError::AlreadyStarted);
        }

        let bind_addr: SocketAddr = self
            .config
            .bind_addr()
            .parse()
            .map_err(|e| TransportError::StartFailed(format!("invalid bind address: {}", e)))?;
        let broadcast_addr: SocketAddr = self
            .config
            .broadcast_addr()
            .parse()
            .map_err(|e| TransportError::InvalidAddress(format!("broadcast address: {}", e)))?;

        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| TransportError::StartFailed(format!("bind failed: {}", e)))?;
        socket
            .set_broadcast(true)
            .map_err(|e| TransportError::StartFailed(format!("set_broadcast: {}", e)))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| TransportError::StartFailed(format!("get local addr: {}", e)))?;

        let socket = Arc::new(socket);
        let recv_task = tokio::spawn(udp_receive_loop(
            socket.clone(),
            local_addr,
            self.endpoints.clone(),
            self.event_tx.clone(),
            self.config.mtu(),
        ));
        let (send_tx, send_rx) = mpsc::channel(SEND_QUEUE_SIZE);
        let send_task = tokio::spawn(udp_send_loop(socket, send_rx));

        self.send_tx = Some(send_tx);
        self.send_task = Some(send_task);
        self.broadcast_addr = Some(broadcast_addr);
        self.local_addr = Some(local_addr);
        self.recv_task = Some(recv_task);
        self.state = TransportState::Up;

        info!(
            local_addr = %local_addr,
            broadcast_addr = %broadcast_addr,
            "UDP transport started"
        );
        Ok(())
    }

    /// Stop both loops; the socket closes with them.
    pub async fn stop_async(&mut self) -> Result<(), TransportError> {
        if !self.state.is_operational() {
            return Err(TransportError::NotStarted);
        }

        self.send_tx = None;
        for task in [self.recv_task.take(), self.send_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
            let _ = task.await;
        }
        self.local_addr = None;
        self.state = TransportState::Down;

        debug!("UDP transport stopped");
        Ok(())
    }

    fn send_datagram(&self, data: &[u8], target: SocketAddr) -> Result<(), TransportError> {
        let send_tx = match (&self.send_tx, self.state.is_operational()) {
            (Some(send_tx), true) => send_tx,
            _ => return Err(TransportError::NotStarted),
        };
        check_mtu(data, self.config.mtu())?;

        match send_tx.try_send((data.to_vec(), target)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(remote_addr = %target, "UDP send queue full, datagram dropped");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(TransportError::SendFailed("sender task stopped".into()))
            }
        }
    }
}

impl Transport for UdpTransport {
    fn mtu(&self) -> u16 {
        self.config.mtu()
    }

    fn broadcast(&self, data: &[u8]) -> Result<(), TransportError> {
        let target = self.broadcast_addr.ok_or(TransportError::NotStarted)?;
        self.send_datagram(data, target)
    }

    fn send_to(&self, endpoint: EndpointId, data: &[u8]) -> Result<(), TransportError> {
        let target = self
            .endpoint_addr(endpoint)
            .ok_or(TransportError::UnknownEndpoint(endpoint))?;
        self.send_datagram(data, target)
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        for task in [self.recv_task.take(), self.send_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
    }
}

/// Drain the send queue onto the socket.
async fn udp_send_loop(socket: Arc<UdpSocket>, mut send_rx: mpsc::Receiver<Outbound>) {
    while let Some((data, target)) = send_rx.recv().await {
        match socket.send_to(&data, target).await {
            Ok(sent) => trace!(remote_addr = %target, bytes = sent, "UDP datagram sent"),
            Err(e) => warn!(remote_addr = %target, error = %e, "UDP send failed"),
        }
    }
    debug!("UDP send loop stopped");
}

/// UDP receive loop - runs as a spawned task.
async fn udp_receive_loop(
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    endpoints: SharedTable,
    event_tx: EventTx,
    mtu: u16,
) {
    // Headroom so oversized datagrams are seen whole and rejected upstream
    let mut buf = vec![0u8; mtu as usize + 100];

    debug!(local_addr = %local_addr, "UDP receive loop starting");

    loop {
        let (len, remote_addr) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                warn!(error = %e, "UDP receive error");
                continue;
            }
        };

        // Our own broadcasts looped back
        if remote_addr == local_addr {
            continue;
        }

        let resolved = match endpoints.lock() {
            Ok(mut table) => table.resolve(remote_addr),
            Err(_) => break,
        };
        let (endpoint, is_new) = resolved;

        trace!(remote_addr = %remote_addr, endpoint = %endpoint, bytes = len, "UDP datagram received");

        if is_new {
            debug!(remote_addr = %remote_addr, endpoint = %endpoint, "New UDP endpoint");
            if event_tx
                .send(TransportEvent::SubscriberAttached(endpoint))
                .await
                .is_err()
            {
                break;
            }
        }

        let event = TransportEvent::frame(Some(endpoint), buf[..len].to_vec());
        if event_tx.send(event).await.is_err() {
            info!("Event channel closed, stopping UDP receive loop");
            break;
        }
    }

    debug!(local_addr = %local_addr, "UDP receive loop stopped");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{event_channel, EventRx};
    use tokio::time::{timeout, Duration};

    fn make_config(broadcast_to: Option<SocketAddr>) -> UdpConfig {
        UdpConfig {
            bind_addr: Some("127.0.0.1:0".to_string()),
            broadcast_addr: broadcast_to.map(|a| a.to_string()),
            mtu: Some(1280),
        }
    }

    async fn next_event(rx: &mut EventRx) -> TransportEvent {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timeout")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_start_stop() {
        let (tx, _rx) = event_channel(100);
        let mut transport = UdpTransport::new(make_config(None), tx);

        assert_eq!(transport.state(), TransportState::Configured);

        transport.start_async().await.unwrap();
        assert_eq!(transport.state(), TransportState::Up);
        assert!(transport.local_addr().is_some());

        transport.stop_async().await.unwrap();
        assert_eq!(transport.state(), TransportState::Down);
    }

    #[tokio::test]
    async fn test_double_start_fails() {
        let (tx, _rx) = event_channel(100);
        let mut transport = UdpTransport::new(make_config(None), tx);

        transport.start_async().await.unwrap();
        assert!(matches!(
            transport.start_async().await,
            Err(TransportError::AlreadyStarted)
        ));
        transport.stop_async().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_not_started_fails() {
        let (tx, _rx) = event_channel(100);
        let mut transport = UdpTransport::new(make_config(None), tx);
        assert!(matches!(
            transport.stop_async().await,
            Err(TransportError::NotStarted)
        ));
    }

    #[tokio::test]
    async fn test_send_not_started() {
        let (tx, _rx) = event_channel(100);
        let transport = UdpTransport::new(make_config(None), tx);
        assert!(matches!(
            transport.broadcast(b"test"),
            Err(TransportError::NotStarted)
        ));
    }

    #[tokio::test]
    async fn test_invalid_broadcast_addr() {
        let (tx, _rx) = event_channel(100);
        let config = UdpConfig {
            broadcast_addr: Some("not-an-address".to_string()),
            ..make_config(None)
        };
        let mut transport = UdpTransport::new(config, tx);
        assert!(matches!(
            transport.start_async().await,
            Err(TransportError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_broadcast_then_reply() {
        let (tx2, mut rx2) = event_channel(100);
        let mut t2 = UdpTransport::new(make_config(None), tx2);
        t2.start_async().await.unwrap();

        let (tx1, mut rx1) = event_channel(100);
        let mut t1 = UdpTransport::new(make_config(t2.local_addr()), tx1);
        t1.start_async().await.unwrap();

        t1.broadcast(b"ping").unwrap();

        let endpoint = match next_event(&mut rx2).await {
            TransportEvent::SubscriberAttached(id) => id,
            other => panic!("expected SubscriberAttached, got {:?}", other),
        };
        assert_eq!(t2.endpoint_addr(endpoint), t1.local_addr());
        match next_event(&mut rx2).await {
            TransportEvent::FrameReceived { from, data, .. } => {
                assert_eq!(from, Some(endpoint));
                assert_eq!(data, b"ping");
            }
            other => panic!("expected FrameReceived, got {:?}", other),
        }

        // Second datagram from the same address is not a new endpoint
        t1.broadcast(b"again").unwrap();
        assert!(matches!(
            next_event(&mut rx2).await,
            TransportEvent::FrameReceived { from: Some(id), .. } if id == endpoint
        ));

        t2.send_to(endpoint, b"pong").unwrap();
        assert!(matches!(
            next_event(&mut rx1).await,
            TransportEvent::SubscriberAttached(_)
        ));
        match next_event(&mut rx1).await {
            TransportEvent::FrameReceived { data, .. } => assert_eq!(data, b"pong"),
            other => panic!("expected FrameReceived, got {:?}", other),
        }

        t1.stop_async().await.unwrap();
        t2.stop_async().await.unwrap();
    }

    #[tokio::test]
    async fn test_burst_right_after_start_delivered() {
        let (tx2, mut rx2) = event_channel(100);
        let mut t2 = UdpTransport::new(make_config(None), tx2);
        t2.start_async().await.unwrap();

        let (tx1, _rx1) = event_channel(100);
        let mut t1 = UdpTransport::new(make_config(t2.local_addr()), tx1);
        t1.start_async().await.unwrap();
        for i in 0..5u8 {
            t1.broadcast(&[i]).unwrap();
        }

        assert!(matches!(
            next_event(&mut rx2).await,
            TransportEvent::SubscriberAttached(_)
        ));
        let mut received = Vec::new();
        for _ in 0..5 {
            match next_event(&mut rx2).await {
                TransportEvent::FrameReceived { data, .. } => received.push(data[0]),
                other => panic!("expected FrameReceived, got {:?}", other),
            }
        }
        assert_eq!(received, vec![0, 1, 2, 3, 4]);

        t1.stop_async().await.unwrap();
        assert!(matches!(t1.broadcast(b"late"), Err(TransportError::NotStarted)));
        t2.stop_async().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_to_unknown_endpoint() {
        let (tx, _rx) = event_channel(100);
        let mut transport = UdpTransport::new(make_config(None), tx);
        transport.start_async().await.unwrap();

        assert!(matches!(
            transport.send_to(EndpointId::new(99), b"x"),
            Err(TransportError::UnknownEndpoint(_))
        ));
        transport.stop_async().await.unwrap();
    }

    #[tokio::test]
    async fn test_mtu_exceeded() {
        let (tx, _rx) = event_channel(100);
        let config = UdpConfig {
            mtu: Some(100),
            ..make_config(Some("127.0.0.1:9".parse().unwrap()))
        };
        let mut transport = UdpTransport::new(config, tx);
        transport.start_async().await.unwrap();

        assert!(matches!(
            transport.broadcast(&[0u8; 200]),
            Err(TransportError::MtuExceeded { .. })
        ));
        transport.stop_async().await.unwrap();
    }

    #[test]
    fn test_endpoint_table_stable_ids() {
        let mut table = EndpointTable::default();
        let a: SocketAddr = "10.0.0.1:4000".parse().unwrap();
        let b: SocketAddr = "10.0.0.2:4000".parse().unwrap();

        let (id_a, new_a) = table.resolve(a);
        let (id_b, new_b) = table.resolve(b);
        let (id_a2, new_a2) = table.resolve(a);

        assert!(new_a && new_b && !new_a2);
        assert_eq!(id_a, id_a2);
        assert_ne!(id_a, id_b);
        assert_eq!(table.addr_of(id_b), Some(b));
    }
}
