//! anilib core library
//!
//! Client for the anime registry's UDP and HTTP APIs plus the durable command
//! queue that drives it: rate limiting, ban tracking, session management,
//! persisted commands and their handlers.

pub mod config;
#[cfg(feature = "database")]
pub mod database;
pub mod error;
pub mod events;
pub mod handlers;
pub mod protocol;
pub mod queue;
pub mod runtime;
pub mod security;
pub mod shutdown;

// Re-export main types
pub use config::CoreConfig;
#[cfg(feature = "database")]
pub use database::{Database, SqliteCommandStore};
pub use error::{Error, Result};
pub use events::{EventBus, PauseReason, RegistryEvent};
pub use handlers::{FileHasher, FileHashes, HandlerDeps, MetadataSink, NullSink};
pub use protocol::{Axis, BanTracker, ProtocolSession, RateLimiter, RegistryClient};
pub use queue::{
    Command, CommandPayload, CommandQueue, CommandStore, CommandType, InMemoryCommandStore,
    QueueName,
};
pub use runtime::Runtime;
pub use shutdown::{SharedShutdown, ShutdownCoordinator};
