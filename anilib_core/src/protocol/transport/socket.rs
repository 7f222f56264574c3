//! UDP socket transport

use super::UdpTransport;
use crate::config::RegistryConfig;
use crate::protocol::error::{ProtocolError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, trace, warn};
use parking_lot::Mutex;
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::{UdpSocket, lookup_host};

/// Transport statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransportStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Late replies discarded before a send
    pub stale_discarded: u64,
    pub send_errors: u64,
    pub receive_errors: u64,
}

/// Datagram transport over a connected tokio socket
pub struct UdpSocketTransport {
    socket: UdpSocket,
    stats: Mutex<TransportStats>,
}

impl UdpSocketTransport {
    /// Resolve the registry host and connect a socket to it
    pub async fn connect(config: &RegistryConfig) -> Result<Self> {
        let server_addr = lookup_host(config.server_addr())
            .await?
            .next()
            .ok_or_else(|| {
                ProtocolError::Io(std::io::Error::new(
                    ErrorKind::NotFound,
                    format!("could not resolve {}", config.server_addr()),
                ))
            })?;

        let bind_ip = if server_addr.is_ipv4() {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        } else {
            IpAddr::V6(Ipv6Addr::UNSPECIFIED)
        };

        Self::bind(SocketAddr::new(bind_ip, config.local_port), server_addr).await
    }

    /// Bind to a local address and connect to a resolved server address
    pub async fn bind(bind_addr: SocketAddr, server_addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(server_addr).await?;
        debug!(
            "UDP transport bound to {} and connected to {server_addr}",
            socket.local_addr()?
        );

        Ok(Self {
            socket,
            stats: Mutex::new(TransportStats::default()),
        })
    }

    pub fn stats(&self) -> TransportStats {
        self.stats.lock().clone()
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.peer_addr()?)
    }

    /// Discard replies that arrived after their request timed out
    fn drain_stale(&self, buffer: &mut [u8]) {
        loop {
            match self.socket.try_recv(buffer) {
                Ok(size) => {
                    warn!("Discarding stale {size} byte datagram");
                    self.stats.lock().stale_discarded += 1;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    trace!("Stale drain stopped: {e}");
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl UdpTransport for UdpSocketTransport {
    async fn exchange(&self, packet: Bytes) -> Result<Bytes> {
        let mut buffer = vec![0u8; crate::protocol::MAX_PACKET_SIZE];
        self.drain_stale(&mut buffer);

        match self.socket.send(&packet).await {
            Ok(sent) if sent == packet.len() => {
                let mut stats = self.stats.lock();
                stats.packets_sent += 1;
                stats.bytes_sent += sent as u64;
            }
            Ok(sent) => {
                self.stats.lock().send_errors += 1;
                return Err(ProtocolError::invalid_packet(format!(
                    "Partial send: {sent} of {} bytes",
                    packet.len()
                )));
            }
            Err(e) => {
                self.stats.lock().send_errors += 1;
                return Err(e.into());
            }
        }

        match self.socket.recv(&mut buffer).await {
            Ok(size) => {
                let mut stats = self.stats.lock();
                stats.packets_received += 1;
                stats.bytes_received += size as u64;
                buffer.truncate(size);
                Ok(Bytes::from(buffer))
            }
            Err(e) => {
                self.stats.lock().receive_errors += 1;
                Err(e.into())
            }
        }
    }
}
