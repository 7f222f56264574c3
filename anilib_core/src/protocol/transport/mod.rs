//! Transport layer
//!
//! Both transports sit behind object-safe traits so the session and the HTTP
//! client can be driven by scripted transports in tests.

mod http;
mod socket;

pub use http::ReqwestTransport;
pub use socket::{TransportStats, UdpSocketTransport};

use crate::protocol::error::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// One request/response exchange over the datagram transport
///
/// Implementations are not required to serialize callers; the session holds
/// its single-flight lock around every call.
#[async_trait]
pub trait UdpTransport: Send + Sync {
    /// Send one datagram and return the next datagram received
    async fn exchange(&self, packet: Bytes) -> Result<Bytes>;
}

/// Document fetches over HTTP
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get_text(&self, url: &str) -> Result<String>;

    async fn get_bytes(&self, url: &str) -> Result<Bytes>;
}
