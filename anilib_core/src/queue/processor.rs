//! Queue processor
//!
//! One processor runs per queue. It repeatedly takes the most urgent command
//! whose transport is not blocked, runs its handler and deletes it. A failing
//! command is logged and dropped; it never stops the loop.

use super::command::{Command, QueueName};
use super::handler::{HandlerContext, HandlerRegistry};
use super::store::CommandStore;
use super::submit::Submitter;
use crate::config::QueueConfig;
use crate::error::{Error, InternalError};
use crate::events::{EventBus, PauseReason, RegistryEvent};
use crate::protocol::{BanSnapshot, BanTracker, ProtocolError};
use crate::shutdown::SharedShutdown;
use futures::FutureExt;
use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorState {
    #[default]
    Idle,
    Fetching,
    Executing,
}

/// Point-in-time view of one processor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessorStatus {
    pub queue: QueueName,
    pub state: ProcessorState,
    pub paused: Option<PauseReason>,
    /// Identity of the command being executed
    pub current: Option<String>,
}

/// State shared between a processor and the queue manager
pub struct ProcessorControl {
    status: Mutex<ProcessorStatus>,
    manual_pause: AtomicBool,
    wake: Arc<Notify>,
}

impl ProcessorControl {
    pub(crate) fn new(queue: QueueName, wake: Arc<Notify>) -> Self {
        Self {
            status: Mutex::new(ProcessorStatus {
                queue,
                state: ProcessorState::Idle,
                paused: None,
                current: None,
            }),
            manual_pause: AtomicBool::new(false),
            wake,
        }
    }

    pub fn status(&self) -> ProcessorStatus {
        self.status.lock().clone()
    }

    pub fn is_manually_paused(&self) -> bool {
        self.manual_pause.load(Ordering::SeqCst)
    }

    /// Operator pause; takes effect before the next command is fetched
    pub fn set_manual_pause(&self, paused: bool) {
        self.manual_pause.store(paused, Ordering::SeqCst);
        self.wake.notify_one();
    }
}

pub struct QueueProcessor {
    queue: QueueName,
    store: Arc<dyn CommandStore>,
    handlers: Arc<HandlerRegistry>,
    bans: Arc<BanTracker>,
    events: EventBus,
    config: QueueConfig,
    submitter: Submitter,
    control: Arc<ProcessorControl>,
    shutdown: SharedShutdown,
}

impl QueueProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: QueueName,
        submitter: Submitter,
        handlers: Arc<HandlerRegistry>,
        bans: Arc<BanTracker>,
        events: EventBus,
        config: QueueConfig,
        control: Arc<ProcessorControl>,
        shutdown: SharedShutdown,
    ) -> Self {
        Self {
            queue,
            store: submitter.store().clone(),
            handlers,
            bans,
            events,
            config,
            submitter,
            control,
            shutdown,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        info!("{} queue processor started", self.queue);
        let mut ban_changes = self.bans.subscribe();

        while !self.shutdown.is_shutdown_requested() {
            if self.control.is_manually_paused() {
                self.set_pause(Some(PauseReason::Manual));
                self.wait(&mut ban_changes).await;
                continue;
            }

            self.set_state(ProcessorState::Fetching, None);
            let blocked = self.bans.blocked_axes();

            match self.store.next_pending(self.queue, &blocked).await {
                Ok(Some(command)) => {
                    self.set_pause(None);
                    self.execute(command).await;
                    self.set_state(ProcessorState::Idle, None);
                }
                Ok(None) => {
                    self.set_state(ProcessorState::Idle, None);
                    let pause = if blocked.is_empty() {
                        None
                    } else {
                        match self.store.count(Some(self.queue)).await {
                            Ok(pending) if pending > 0 => {
                                Some(PauseReason::Blocked { axes: blocked })
                            }
                            _ => None,
                        }
                    };
                    self.set_pause(pause);
                    self.wait(&mut ban_changes).await;
                }
                Err(e) => {
                    error!("{} queue could not read pending commands: {e}", self.queue);
                    self.set_state(ProcessorState::Idle, None);
                    self.wait(&mut ban_changes).await;
                }
            }
        }

        info!("{} queue processor stopped", self.queue);
    }

    /// Suspend until new work, a ban change, the poll interval or shutdown
    async fn wait(&self, ban_changes: &mut watch::Receiver<BanSnapshot>) {
        tokio::select! {
            _ = self.shutdown.wait_for_shutdown() => {}
            _ = self.control.wake.notified() => trace!("{} queue woken", self.queue),
            changed = ban_changes.changed() => {
                if changed.is_ok() {
                    ban_changes.borrow_and_update();
                    trace!("{} queue saw a ban change", self.queue);
                }
            }
            _ = sleep(self.config.poll_interval()) => {}
        }
    }

    async fn execute(&self, command: Command) {
        let identity = command.identity.clone();
        self.set_state(ProcessorState::Executing, Some(identity.clone()));

        let Some(handler) = self.handlers.get(command.command_type) else {
            let error: Error =
                InternalError::handler_not_registered(command.command_type.name()).into();
            self.fail(&command, &error).await;
            return;
        };

        let ctx = HandlerContext {
            queue: self.queue,
            submitter: self.submitter.clone(),
        };

        let mut attempt = 0;
        loop {
            debug!(
                "{} queue executing {identity} (priority {})",
                self.queue, command.priority
            );

            let result = AssertUnwindSafe(handler.handle(&command, &ctx))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(Error::handler(
                        command.command_type.name(),
                        format!("handler panicked: {}", panic_message(&*panic)),
                    ))
                });

            let error = match result {
                Ok(()) => {
                    self.complete(&command).await;
                    return;
                }
                Err(error) => error,
            };

            if matches!(error, Error::Protocol(ProtocolError::ShuttingDown)) {
                info!("{identity} left pending for the next run");
                return;
            }

            if let Some(axis) = error.blocked_axis() {
                info!("{identity} stays queued until {axis} is unblocked: {error}");
                return;
            }

            if error.is_transient() && attempt < self.config.max_transient_retries {
                let delay = self.config.retry_delay(attempt);
                attempt += 1;
                warn!(
                    "{identity} failed ({error}), retry {attempt}/{} in {delay:?}",
                    self.config.max_transient_retries
                );

                let interrupted = tokio::select! {
                    _ = self.shutdown.wait_for_shutdown() => true,
                    _ = sleep(delay) => false,
                };
                if interrupted {
                    info!("{identity} left pending for the next run");
                    return;
                }
                continue;
            }

            self.fail(&command, &error).await;
            return;
        }
    }

    async fn complete(&self, command: &Command) {
        match self.store.delete(&command.identity).await {
            Ok(_) => debug!("{} queue finished {}", self.queue, command.identity),
            Err(e) => error!(
                "{} queue could not delete finished {}: {e}",
                self.queue, command.identity
            ),
        }
    }

    async fn fail(&self, command: &Command, error: &Error) {
        if error.is_configuration() {
            error!(
                "{} queue: {} ({}) dropped, check the registry settings: {error}",
                self.queue, command.identity, command.command_type
            );
        } else {
            error!(
                "{} queue: {} ({}) failed: {error}; payload: {}",
                self.queue,
                command.identity,
                command.command_type,
                command.payload_summary()
            );
        }

        if let Err(e) = self.store.delete(&command.identity).await {
            error!(
                "{} queue could not delete failed {}: {e}",
                self.queue, command.identity
            );
        }

        self.events.emit(RegistryEvent::CommandFailed {
            queue: self.queue.to_string(),
            identity: command.identity.clone(),
            command_type: command.command_type.to_string(),
            error: error.to_string(),
        });
    }

    fn set_state(&self, state: ProcessorState, current: Option<String>) {
        let mut status = self.control.status.lock();
        status.state = state;
        status.current = current;
    }

    fn set_pause(&self, reason: Option<PauseReason>) {
        let previous = std::mem::replace(&mut self.control.status.lock().paused, reason.clone());
        if previous == reason {
            return;
        }

        match reason {
            Some(reason) => {
                info!("{} queue paused: {reason:?}", self.queue);
                self.events.emit(RegistryEvent::QueuePaused {
                    queue: self.queue.to_string(),
                    reason,
                });
            }
            None => {
                info!("{} queue resumed", self.queue);
                self.events.emit(RegistryEvent::QueueResumed {
                    queue: self.queue.to_string(),
                });
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
