//! Handlers that record or fail

use anilib_core::queue::{Command, CommandHandler, HandlerContext};
use anilib_core::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Records every command it executes, in execution order
#[derive(Default)]
pub struct RecordingHandler {
    executed: Mutex<Vec<Command>>,
    delay: Duration,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate work taking `delay`
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            executed: Mutex::new(Vec::new()),
            delay,
        }
    }

    pub fn executed(&self) -> Vec<Command> {
        self.executed.lock().clone()
    }

    pub fn identities(&self) -> Vec<String> {
        self.executed.lock().iter().map(|c| c.identity.clone()).collect()
    }

    pub fn priorities(&self) -> Vec<u8> {
        self.executed.lock().iter().map(|c| c.priority).collect()
    }

    pub fn count(&self) -> usize {
        self.executed.lock().len()
    }
}

#[async_trait]
impl CommandHandler for RecordingHandler {
    async fn handle(&self, command: &Command, _ctx: &HandlerContext) -> Result<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.executed.lock().push(command.clone());
        Ok(())
    }
}

/// Fails (or panics) on every call and counts the calls
#[derive(Default)]
pub struct FailingHandler {
    calls: AtomicUsize,
    panic: bool,
}

impl FailingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn panicking() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            panic: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandHandler for FailingHandler {
    async fn handle(&self, command: &Command, _ctx: &HandlerContext) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic {
            panic!("handler exploded on {}", command.identity);
        }
        Err(Error::handler(
            command.command_type.name(),
            "simulated business failure",
        ))
    }
}
