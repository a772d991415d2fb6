//! UDP receiver for control datagrams
//!
//! One task owns the socket. Every datagram is decoded on that task and the
//! resulting events are published through a [`ControlSender`]; the receiver
//! never touches simulation state and never blocks on it.

use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, SystemTime};

use serde::Deserialize;
use tokio::net::UdpSocket;
use tokio::sync::watch;

use crate::channel::{ControlSender, DEFAULT_QUEUE_CAPACITY};
use crate::error::ControlError;
use crate::message::{decode_datagram, ControlEvent};
use crate::types::DEFAULT_OSC_PORT;

/// Largest datagram accepted
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Live-control listener configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OscConfig {
    pub enabled: bool,
    pub host: String,
    /// 0 picks an ephemeral port
    pub rx_port: u16,
    /// Depth of the action/reset queue
    pub queue_capacity: usize,
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            rx_port: DEFAULT_OSC_PORT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl OscConfig {
    /// Apply `BLOCKBEAT_OSC_HOST`, `BLOCKBEAT_OSC_PORT` and
    /// `BLOCKBEAT_OSC_DISABLED` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Same as [`OscConfig::apply_env`] with an explicit lookup.
    pub fn apply_env_from(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(host) = var("BLOCKBEAT_OSC_HOST")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
        {
            self.host = host;
        }
        if let Some(port) = var("BLOCKBEAT_OSC_PORT").and_then(|s| s.trim().parse().ok()) {
            self.rx_port = port;
        }
        if var("BLOCKBEAT_OSC_DISABLED")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
        {
            self.enabled = false;
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ControlError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| ControlError::Address(self.host.clone()))?;
        Ok(SocketAddr::new(ip, self.rx_port))
    }
}

/// Bind the control socket.
pub async fn bind(config: &OscConfig) -> Result<UdpSocket, ControlError> {
    let addr = config.socket_addr()?;
    UdpSocket::bind(addr)
        .await
        .map_err(|source| ControlError::Bind { addr, source })
}

/// Receive datagrams until `shutdown` flips (or its sender goes away).
pub async fn run_receiver(
    socket: UdpSocket,
    sender: ControlSender,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    let mut events: Vec<ControlEvent> = Vec::with_capacity(8);

    loop {
        tokio::select! {
            res = socket.recv_from(&mut buf) => match res {
                Ok((len, peer)) => handle_datagram(&buf[..len], peer, &sender, &mut events),
                Err(e) => {
                    // e.g. ICMP port unreachable reported on the next recv
                    log::warn!("control socket receive failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            },
            _ = shutdown.changed() => break,
        }
    }
    log::debug!("control receiver stopped");
}

fn handle_datagram(
    bytes: &[u8],
    peer: SocketAddr,
    sender: &ControlSender,
    events: &mut Vec<ControlEvent>,
) {
    events.clear();
    if let Err(e) = decode_datagram(bytes, SystemTime::now(), events) {
        sender.record_rejected();
        log::warn!("dropping control datagram from {}: {}", peer, e);
        return;
    }
    for event in events.drain(..) {
        log::debug!("control {:?} from {}", event, peer);
        if let Err(e) = sender.send(event) {
            log::warn!("control event from {} not queued: {}", peer, e);
        }
    }
}
