//! Status and event surface
//!
//! Ban changes, login failures and queue pause/resume are published on a
//! broadcast channel. Subscribers that fall behind lose the oldest events,
//! publishers never block.

use crate::protocol::Axis;
use chrono::{DateTime, Utc};
use log::trace;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

/// Why a queue stopped pulling work
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    /// Every pending command needs a banned or backing-off axis
    Blocked { axes: Vec<Axis> },
    /// Paused by an operator
    Manual,
}

/// Events consumed by logging and UI layers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RegistryEvent {
    BanChanged {
        axis: Axis,
        banned: bool,
        reason: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    },
    BackoffChanged {
        axis: Axis,
        active: bool,
        reason: Option<String>,
        until: Option<DateTime<Utc>>,
    },
    LoginFailed {
        reason: String,
        retry_in: Duration,
    },
    LoggedIn,
    LoggedOut {
        forced: bool,
    },
    QueuePaused {
        queue: String,
        reason: PauseReason,
    },
    QueueResumed {
        queue: String,
    },
    CommandFailed {
        queue: String,
        identity: String,
        command_type: String,
        error: String,
    },
}

/// Cloneable publisher handle
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RegistryEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Publish an event; having no subscribers is not an error
    pub fn emit(&self, event: RegistryEvent) {
        trace!("Event: {event:?}");
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_without_subscribers_is_noop() {
        let bus = EventBus::new();
        bus.emit(RegistryEvent::LoggedIn);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(RegistryEvent::LoggedIn);
        bus.emit(RegistryEvent::LoggedOut { forced: true });

        assert_eq!(rx.recv().await.unwrap(), RegistryEvent::LoggedIn);
        assert_eq!(
            rx.recv().await.unwrap(),
            RegistryEvent::LoggedOut { forced: true }
        );
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = RegistryEvent::QueuePaused {
            queue: "general".to_string(),
            reason: PauseReason::Blocked {
                axes: vec![Axis::Udp],
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "queue_paused");
        assert_eq!(json["queue"], "general");
    }
}
