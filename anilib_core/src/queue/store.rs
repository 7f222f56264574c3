//! Command persistence contract and the in-memory store

use super::command::{Command, CommandType, QueueName};
use crate::error::Result;
use crate::protocol::Axis;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

/// Durable storage of pending commands, keyed by identity
///
/// Implementations must make `try_insert` atomic: of any number of concurrent
/// inserts with the same identity, exactly one returns `true`.
#[async_trait]
pub trait CommandStore: Send + Sync {
    /// Insert unless a command with the same identity is present
    async fn try_insert(&self, command: Command) -> Result<bool>;

    /// Most urgent pending command of the queue, skipping types that need a
    /// blocked axis. Lowest priority first, then insertion order.
    async fn next_pending(&self, queue: QueueName, blocked: &[Axis]) -> Result<Option<Command>>;

    /// Remove a command; returns whether it existed
    async fn delete(&self, identity: &str) -> Result<bool>;

    async fn contains(&self, identity: &str) -> Result<bool>;

    /// Pending commands, optionally restricted to one queue
    async fn count(&self, queue: Option<QueueName>) -> Result<usize>;

    /// Pending commands in execution order
    async fn list(&self, queue: Option<QueueName>) -> Result<Vec<Command>>;

    /// Remove every command of a queue; returns how many were removed
    async fn clear(&self, queue: QueueName) -> Result<usize>;
}

#[derive(Default)]
struct MemoryState {
    /// Ordered by (priority, seq)
    ordered: BTreeMap<(u8, u64), Command>,
    by_identity: HashMap<String, (u8, u64)>,
    next_seq: u64,
}

/// Non-durable store for tests and ephemeral use
#[derive(Default)]
pub struct InMemoryCommandStore {
    state: Mutex<MemoryState>,
}

impl InMemoryCommandStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommandStore for InMemoryCommandStore {
    async fn try_insert(&self, mut command: Command) -> Result<bool> {
        let mut state = self.state.lock();
        if state.by_identity.contains_key(&command.identity) {
            return Ok(false);
        }

        state.next_seq += 1;
        command.seq = state.next_seq;
        command.updated_at = Utc::now();

        let key = (command.priority, command.seq);
        state.by_identity.insert(command.identity.clone(), key);
        state.ordered.insert(key, command);
        Ok(true)
    }

    async fn next_pending(&self, queue: QueueName, blocked: &[Axis]) -> Result<Option<Command>> {
        let gated = CommandType::gated_by(blocked);
        let state = self.state.lock();
        Ok(state
            .ordered
            .values()
            .find(|command| command.queue == queue && !gated.contains(&command.command_type))
            .cloned())
    }

    async fn delete(&self, identity: &str) -> Result<bool> {
        let mut state = self.state.lock();
        match state.by_identity.remove(identity) {
            Some(key) => {
                state.ordered.remove(&key);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn contains(&self, identity: &str) -> Result<bool> {
        Ok(self.state.lock().by_identity.contains_key(identity))
    }

    async fn count(&self, queue: Option<QueueName>) -> Result<usize> {
        let state = self.state.lock();
        Ok(state
            .ordered
            .values()
            .filter(|command| queue.is_none_or(|queue| command.queue == queue))
            .count())
    }

    async fn list(&self, queue: Option<QueueName>) -> Result<Vec<Command>> {
        let state = self.state.lock();
        Ok(state
            .ordered
            .values()
            .filter(|command| queue.is_none_or(|queue| command.queue == queue))
            .cloned()
            .collect())
    }

    async fn clear(&self, queue: QueueName) -> Result<usize> {
        let mut state = self.state.lock();
        let doomed: Vec<(String, (u8, u64))> = state
            .ordered
            .iter()
            .filter(|(_, command)| command.queue == queue)
            .map(|(key, command)| (command.identity.clone(), *key))
            .collect();

        for (identity, key) in &doomed {
            state.by_identity.remove(identity);
            state.ordered.remove(key);
        }
        Ok(doomed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::command::CommandPayload;
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;

    #[derive(Serialize, Deserialize)]
    struct Group(u64);

    impl CommandPayload for Group {
        const COMMAND_TYPE: CommandType = CommandType::GetReleaseGroup;

        fn key(&self) -> String {
            self.0.to_string()
        }
    }

    #[derive(Serialize, Deserialize)]
    struct Anime(u64);

    impl CommandPayload for Anime {
        const COMMAND_TYPE: CommandType = CommandType::GetAnimeHttp;

        fn key(&self) -> String {
            self.0.to_string()
        }
    }

    #[tokio::test]
    async fn test_duplicate_identity_is_rejected() {
        let store = InMemoryCommandStore::new();
        assert!(store.try_insert(Group(1).into_command().unwrap()).await.unwrap());
        assert!(!store.try_insert(Group(1).into_command().unwrap()).await.unwrap());
        assert_eq!(store.count(None).await.unwrap(), 1);

        assert!(store.delete("GetReleaseGroup_1").await.unwrap());
        assert!(!store.delete("GetReleaseGroup_1").await.unwrap());
        // Free to run again once the first one finished
        assert!(store.try_insert(Group(1).into_command().unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_inserts_admit_one() {
        let store = Arc::new(InMemoryCommandStore::new());
        let inserts = (0..16).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.try_insert(Group(7).into_command().unwrap()).await })
        });

        let mut admitted = 0;
        for insert in inserts {
            if insert.await.unwrap().unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
    }

    #[tokio::test]
    async fn test_order_is_priority_then_fifo() {
        let store = InMemoryCommandStore::new();
        for (gid, priority) in [(1, 9), (2, 3), (3, 7), (4, 3)] {
            let command = Group(gid).into_command().unwrap().with_priority(priority);
            store.try_insert(command).await.unwrap();
        }

        let order: Vec<String> = store
            .list(Some(QueueName::General))
            .await
            .unwrap()
            .into_iter()
            .map(|command| command.identity)
            .collect();
        assert_eq!(
            order,
            vec![
                "GetReleaseGroup_2",
                "GetReleaseGroup_4",
                "GetReleaseGroup_3",
                "GetReleaseGroup_1"
            ]
        );

        let next = store.next_pending(QueueName::General, &[]).await.unwrap();
        assert_eq!(next.unwrap().identity, "GetReleaseGroup_2");
    }

    #[tokio::test]
    async fn test_blocked_axis_is_skipped() {
        let store = InMemoryCommandStore::new();
        store
            .try_insert(Group(1).into_command().unwrap().with_priority(1))
            .await
            .unwrap();
        store.try_insert(Anime(5).into_command().unwrap()).await.unwrap();

        let next = store.next_pending(QueueName::General, &[Axis::Udp]).await.unwrap();
        assert_eq!(next.unwrap().identity, "GetAnimeHttp_5");

        let none = store
            .next_pending(QueueName::General, &[Axis::Udp, Axis::Http])
            .await
            .unwrap();
        assert!(none.is_none());
        assert!(store.next_pending(QueueName::Images, &[]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_only_touches_one_queue() {
        let store = InMemoryCommandStore::new();
        store.try_insert(Group(1).into_command().unwrap()).await.unwrap();
        store.try_insert(Anime(2).into_command().unwrap()).await.unwrap();

        assert_eq!(store.clear(QueueName::Hasher).await.unwrap(), 0);
        assert_eq!(store.clear(QueueName::General).await.unwrap(), 2);
        assert!(!store.contains("GetAnimeHttp_2").await.unwrap());
        assert_eq!(store.count(Some(QueueName::General)).await.unwrap(), 0);
    }
}
