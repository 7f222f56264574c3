//! Handler registry
//!
//! Maps each [`CommandType`] to the code that executes it. Handlers receive a
//! [`HandlerContext`] through which they may enqueue follow-up commands.

use super::command::{Command, CommandType, QueueName};
use super::submit::Submitter;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Per-execution context handed to a handler
#[derive(Clone)]
pub struct HandlerContext {
    pub queue: QueueName,
    pub submitter: Submitter,
}

impl HandlerContext {
    /// Enqueue a follow-up command; duplicates of pending work are dropped
    pub async fn submit(&self, command: Command) -> Result<bool> {
        self.submitter.submit(command).await
    }
}

/// Executes commands of one type
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, command: &Command, ctx: &HandlerContext) -> Result<()>;
}

/// Adapter so plain async closures can be registered
struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> CommandHandler for FnHandler<F>
where
    F: Fn(Command, HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn handle(&self, command: &Command, ctx: &HandlerContext) -> Result<()> {
        (self.f)(command.clone(), ctx.clone()).await
    }
}

#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<CommandType, Arc<dyn CommandHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for the type
    pub fn register(&mut self, command_type: CommandType, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(command_type, handler);
    }

    pub fn register_fn<F, Fut>(&mut self, command_type: CommandType, f: F)
    where
        F: Fn(Command, HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.register(command_type, Arc::new(FnHandler { f }));
    }

    pub fn get(&self, command_type: CommandType) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(&command_type).cloned()
    }

    pub fn contains(&self, command_type: CommandType) -> bool {
        self.handlers.contains_key(&command_type)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::store::InMemoryCommandStore;

    #[tokio::test]
    async fn test_register_fn_runs_closure() {
        let mut registry = HandlerRegistry::new();
        registry.register_fn(CommandType::GetCalendar, |command, _ctx| async move {
            assert_eq!(command.command_type, CommandType::GetCalendar);
            Ok(())
        });

        assert!(registry.contains(CommandType::GetCalendar));
        assert!(registry.get(CommandType::GetFile).is_none());
        assert_eq!(registry.len(), 1);

        let ctx = HandlerContext {
            queue: QueueName::General,
            submitter: Submitter::new(Arc::new(InMemoryCommandStore::new())),
        };
        let command = Command {
            identity: "GetCalendar_all".into(),
            command_type: CommandType::GetCalendar,
            priority: 5,
            queue: QueueName::General,
            payload: serde_json::json!({}),
            payload_version: 1,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            seq: 0,
        };

        let handler = registry.get(CommandType::GetCalendar).unwrap();
        handler.handle(&command, &ctx).await.unwrap();
    }
}
