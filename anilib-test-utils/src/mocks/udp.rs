//! Scripted registry UDP endpoint

use anilib_core::protocol::{ProtocolError, UdpTransport, codec};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

type Responder = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// One request line as it reached the transport
#[derive(Debug, Clone)]
pub struct SentPacket {
    pub at: Instant,
    pub line: String,
}

impl SentPacket {
    /// The command word, e.g. `AUTH`
    pub fn command(&self) -> &str {
        self.line.split_whitespace().next().unwrap_or_default()
    }
}

/// UDP transport answering from a closure
///
/// The closure gets the decoded request line and returns the reply text.
/// `None` simulates a lost datagram, an empty string the ban marker.
pub struct ScriptedUdp {
    responder: Responder,
    latency: Duration,
    sent: Mutex<Vec<SentPacket>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedUdp {
    pub fn new(responder: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            latency: Duration::ZERO,
            sent: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Answers AUTH, LOGOUT and PING like a healthy server and delegates the rest
    pub fn registry(responder: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self::new(move |line| {
            let reply = match line.split_whitespace().next().unwrap_or_default() {
                "AUTH" => "200 tok42 LOGIN ACCEPTED".to_string(),
                "LOGOUT" => "203 LOGGED OUT".to_string(),
                "PING" => "300 PONG\n4000".to_string(),
                _ => responder(line),
            };
            Some(reply)
        })
    }

    /// Hold every exchange for `latency` before replying
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn sent(&self) -> Vec<SentPacket> {
        self.sent.lock().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.sent.lock().iter().map(|p| p.line.clone()).collect()
    }

    /// Number of requests whose command word is `command`
    pub fn count(&self, command: &str) -> usize {
        self.sent.lock().iter().filter(|p| p.command() == command).count()
    }

    /// Highest number of exchanges that were ever in progress at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UdpTransport for ScriptedUdp {
    async fn exchange(&self, packet: Bytes) -> Result<Bytes, ProtocolError> {
        let line = codec::decode(&packet)?;
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        self.sent.lock().push(SentPacket {
            at: Instant::now(),
            line: line.clone(),
        });

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let reply = (self.responder)(&line);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            Some(text) if text.is_empty() => Ok(Bytes::new()),
            Some(text) => Ok(Bytes::from(text.into_bytes())),
            None => Err(ProtocolError::Timeout(Duration::from_secs(20))),
        }
    }
}
