//! Registry protocol client
//!
//! This module implements the client side of the registry's two transports:
//! - `transport`: UDP datagram exchange and the HTTP fetch abstraction
//! - `codec` / `messages`: text wire form, requests and typed records
//! - `rate_limiter` / `ban`: pacing and ban accounting shared by all callers
//! - `session`: login state machine and single-flight dispatch
//! - `http`: document fetches over the HTTP transport
//! - `client`: typed operations used by command handlers

pub mod ban;
pub mod client;
pub mod codec;
pub mod error;
pub mod http;
pub mod messages;
pub mod rate_limiter;
pub mod session;
pub mod transport;

use std::time::Duration;

// Re-export main types
pub use ban::{Axis, AxisStatus, BanSnapshot, BanTracker};
pub use client::RegistryClient;
pub use error::{ProtocolError, ResponseCode, Result};
pub use http::{DocumentKind, HttpClient, HttpDocument};
pub use messages::{Lookup, RawResponse, Request};
pub use rate_limiter::RateLimiter;
pub use session::{ProtocolSession, SessionState, SessionStatus};
pub use transport::{HttpTransport, ReqwestTransport, UdpSocketTransport, UdpTransport};

/// Protocol version supported by this implementation
pub const PROTOCOL_VERSION: &str = "3";

/// HTTP API protocol version
pub const HTTP_PROTOCOL_VERSION: &str = "1";

/// Maximum UDP packet size (considering PPPoE)
pub const MAX_PACKET_SIZE: usize = 1400;

/// Default registry server address
pub const DEFAULT_SERVER: &str = "api.anidb.net";

/// Default registry UDP port
pub const DEFAULT_PORT: u16 = 9000;

/// Default registry HTTP API endpoint
pub const DEFAULT_HTTP_URL: &str = "http://api.anidb.net:9001/httpapi";

/// Timeout applied to HTTP document fetches
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_constants() {
        assert_eq!(PROTOCOL_VERSION, "3");
        assert_eq!(MAX_PACKET_SIZE, 1400);
        assert_eq!(DEFAULT_SERVER, "api.anidb.net");
        assert_eq!(DEFAULT_PORT, 9000);
        assert!(DEFAULT_HTTP_URL.starts_with("http://"));
    }
}
