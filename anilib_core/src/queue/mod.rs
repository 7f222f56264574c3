//! Durable command queue
//!
//! - `command`: command values, types and payload envelopes
//! - `store`: the persistence contract and an in-memory store
//! - `handler`: handler registry and execution context
//! - `processor`: the per-queue run loop
//! - `manager`: the producer/UI facing [`CommandQueue`]

pub mod command;
pub mod handler;
pub mod manager;
pub mod processor;
pub mod store;
pub mod submit;

pub use command::{
    Command, CommandPayload, CommandType, PAYLOAD_VERSION, QueueName, USER_PRIORITY,
};
pub use handler::{CommandHandler, HandlerContext, HandlerRegistry};
pub use manager::{CommandQueue, QueueStatus};
pub use processor::{ProcessorControl, ProcessorState, ProcessorStatus, QueueProcessor};
pub use store::{CommandStore, InMemoryCommandStore};
pub use submit::Submitter;
