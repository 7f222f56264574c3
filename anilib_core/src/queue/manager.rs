//! Queue manager
//!
//! [`CommandQueue`] owns one processor per queue and is the surface producers
//! and UIs use: submit, pause/resume, inspect, clear and shut down.

use super::command::{Command, QueueName};
use super::handler::HandlerRegistry;
use super::processor::{ProcessorControl, ProcessorState, ProcessorStatus, QueueProcessor};
use super::store::CommandStore;
use super::submit::Submitter;
use crate::config::QueueConfig;
use crate::error::Result;
use crate::events::{EventBus, PauseReason};
use crate::protocol::{BanTracker, ProtocolSession};
use crate::shutdown::{SharedShutdown, ShutdownCoordinator};
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Status of one queue for UI layers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueStatus {
    pub queue: QueueName,
    pub state: ProcessorState,
    pub paused: Option<PauseReason>,
    pub current: Option<String>,
    pub pending: usize,
}

pub struct CommandQueue {
    submitter: Submitter,
    handlers: Arc<HandlerRegistry>,
    bans: Arc<BanTracker>,
    events: EventBus,
    config: QueueConfig,
    controls: HashMap<QueueName, Arc<ProcessorControl>>,
    session: Option<Arc<ProtocolSession>>,
    shutdown: SharedShutdown,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CommandQueue {
    pub fn new(
        store: Arc<dyn CommandStore>,
        handlers: HandlerRegistry,
        bans: Arc<BanTracker>,
        events: EventBus,
        config: QueueConfig,
    ) -> Self {
        let submitter = Submitter::new(store);
        let controls = QueueName::ALL
            .into_iter()
            .map(|queue| {
                let control = ProcessorControl::new(queue, submitter.waker(queue));
                (queue, Arc::new(control))
            })
            .collect();

        Self {
            submitter,
            handlers: Arc::new(handlers),
            bans,
            events,
            config,
            controls,
            session: None,
            shutdown: ShutdownCoordinator::shared(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Attach the session so shutdown can log out and its timers run with the queues
    pub fn with_session(mut self, session: Arc<ProtocolSession>) -> Self {
        self.session = Some(session);
        self
    }

    /// Handle for chaining and for producers outside the queue
    pub fn submitter(&self) -> Submitter {
        self.submitter.clone()
    }

    pub fn shutdown_handle(&self) -> SharedShutdown {
        self.shutdown.clone()
    }

    /// Spawn the processors (and session maintenance); a second call does nothing
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            debug!("Command queue already started");
            return;
        }

        for queue in QueueName::ALL {
            let processor = QueueProcessor::new(
                queue,
                self.submitter.clone(),
                self.handlers.clone(),
                self.bans.clone(),
                self.events.clone(),
                self.config.clone(),
                self.control(queue).clone(),
                self.shutdown.clone(),
            );
            tasks.push(processor.spawn());
        }

        if let Some(session) = &self.session {
            tasks.push(session.spawn_maintenance(self.shutdown.clone()));
        }
        info!("Command queue started with {} handlers", self.handlers.len());
    }

    /// Persist a command unless an identical one is pending; wakes its processor
    pub async fn submit(&self, command: Command) -> Result<bool> {
        self.submitter.submit(command).await
    }

    pub fn pause(&self, queue: QueueName) {
        info!("Pausing {queue} queue");
        self.control(queue).set_manual_pause(true);
    }

    pub fn resume(&self, queue: QueueName) {
        info!("Resuming {queue} queue");
        self.control(queue).set_manual_pause(false);
    }

    pub async fn count(&self, queue: Option<QueueName>) -> Result<usize> {
        self.submitter.store().count(queue).await
    }

    pub async fn list(&self, queue: Option<QueueName>) -> Result<Vec<Command>> {
        self.submitter.store().list(queue).await
    }

    /// Drop all pending commands of a queue
    pub async fn clear(&self, queue: QueueName) -> Result<usize> {
        let removed = self.submitter.store().clear(queue).await?;
        info!("Cleared {removed} commands from the {queue} queue");
        Ok(removed)
    }

    pub async fn status(&self) -> Result<Vec<QueueStatus>> {
        let mut statuses = Vec::with_capacity(QueueName::ALL.len());
        for queue in QueueName::ALL {
            let ProcessorStatus {
                state,
                paused,
                current,
                ..
            } = self.control(queue).status();
            statuses.push(QueueStatus {
                queue,
                state,
                paused,
                current,
                pending: self.count(Some(queue)).await?,
            });
        }
        Ok(statuses)
    }

    /// Stop processing, wait up to `grace` for running handlers, then log out
    pub async fn shutdown(&self, grace: Duration) {
        info!("Shutting down command queue");
        self.shutdown.request_shutdown();

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        let aborts: Vec<_> = tasks.iter().map(JoinHandle::abort_handle).collect();

        let joined = tokio::time::timeout(grace, futures::future::join_all(tasks)).await;
        if joined.is_err() {
            warn!("Handlers still running after {grace:?}, aborting them");
            for abort in aborts {
                abort.abort();
            }
        }

        if let Some(session) = &self.session {
            if let Err(e) = session.logout().await {
                debug!("Logout during shutdown failed: {e}");
            }
            session.close();
        }

        self.bans.stop_timers();
        info!("Command queue stopped");
    }

    fn control(&self, queue: QueueName) -> &Arc<ProcessorControl> {
        // Every queue gets a control in `new`
        &self.controls[&queue]
    }
}
