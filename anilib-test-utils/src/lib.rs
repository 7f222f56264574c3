//! Test utilities for the anilib core
//!
//! Scripted transports stand in for the registry, recording handlers and sinks
//! observe what the queue did, and builders wire a client stack around them.

pub mod builders;
pub mod mocks;

// Re-export commonly used types
pub use builders::{TestStack, file_command, group_command, test_config};
pub use mocks::{
    FailingHandler, RecordingHandler, RecordingSink, ScriptedHttp, ScriptedUdp, SentPacket,
    StaticHasher,
};
