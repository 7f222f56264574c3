//! Mock implementations for testing

mod handlers;
mod hasher;
mod http;
mod sink;
mod udp;

pub use handlers::{FailingHandler, RecordingHandler};
pub use hasher::StaticHasher;
pub use http::ScriptedHttp;
pub use sink::RecordingSink;
pub use udp::{ScriptedUdp, SentPacket};
