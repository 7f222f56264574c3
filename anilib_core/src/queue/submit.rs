//! Submission path shared by producers and chaining handlers

use super::command::{Command, QueueName};
use super::store::CommandStore;
use crate::error::Result;
use log::{debug, trace};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;

/// Inserts commands and wakes the processor that owns them
#[derive(Clone)]
pub struct Submitter {
    store: Arc<dyn CommandStore>,
    wakers: Arc<HashMap<QueueName, Arc<Notify>>>,
}

impl Submitter {
    pub fn new(store: Arc<dyn CommandStore>) -> Self {
        let wakers = QueueName::ALL
            .into_iter()
            .map(|queue| (queue, Arc::new(Notify::new())))
            .collect();
        Self {
            store,
            wakers: Arc::new(wakers),
        }
    }

    pub fn store(&self) -> &Arc<dyn CommandStore> {
        &self.store
    }

    /// Insert-if-absent; returns false when the identity is already pending
    pub async fn submit(&self, command: Command) -> Result<bool> {
        let identity = command.identity.clone();
        let queue = command.queue;

        let inserted = self.store.try_insert(command).await?;
        if inserted {
            debug!("Queued {identity} on {queue}");
            self.wake(queue);
        } else {
            trace!("{identity} already pending, not queued again");
        }
        Ok(inserted)
    }

    /// Wake the queue's processor if it is waiting for work
    pub fn wake(&self, queue: QueueName) {
        if let Some(waker) = self.wakers.get(&queue) {
            waker.notify_one();
        }
    }

    pub(crate) fn waker(&self, queue: QueueName) -> Arc<Notify> {
        self.wakers
            .get(&queue)
            .cloned()
            .unwrap_or_else(|| Arc::new(Notify::new()))
    }
}
