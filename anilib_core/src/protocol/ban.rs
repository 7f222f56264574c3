//! Ban and backoff tracking for the two registry transports
//!
//! Each axis can carry a ban (the registry told us to go away) and a backoff
//! (we decided to stay away for a while, e.g. after a rejected login or an
//! overloaded server). Both gate dispatch on that axis; only bans count toward
//! the user-facing banned flag. Every block has its own expiry task, and a
//! generation number guards against a stale timer clearing a newer block.

use crate::config::BanConfig;
use crate::events::{EventBus, RegistryEvent};
use crate::protocol::error::ProtocolError;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// One of the registry's transports, each with independent ban accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Http,
    Udp,
}

impl Axis {
    pub const ALL: [Axis; 2] = [Axis::Http, Axis::Udp];

    fn index(self) -> usize {
        match self {
            Axis::Http => 0,
            Axis::Udp => 1,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Http => write!(f, "HTTP"),
            Axis::Udp => write!(f, "UDP"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Ban,
    Backoff,
}

#[derive(Debug)]
struct Block {
    reason: String,
    started_at: DateTime<Utc>,
    until: DateTime<Utc>,
    expires: Instant,
    generation: u64,
    timer: AbortHandle,
}

#[derive(Debug, Default)]
struct AxisState {
    ban: Option<Block>,
    backoff: Option<Block>,
}

impl AxisState {
    fn slot(&mut self, kind: BlockKind) -> &mut Option<Block> {
        match kind {
            BlockKind::Ban => &mut self.ban,
            BlockKind::Backoff => &mut self.backoff,
        }
    }
}

/// Serializable view of one axis
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AxisStatus {
    pub banned: bool,
    pub banned_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub backoff_until: Option<DateTime<Utc>>,
    pub backoff_reason: Option<String>,
}

impl AxisStatus {
    /// Whether dispatch on this axis is currently refused
    pub fn is_blocked(&self) -> bool {
        self.banned || self.backoff_until.is_some()
    }
}

/// Serializable view of both axes
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BanSnapshot {
    pub http: AxisStatus,
    pub udp: AxisStatus,
}

impl BanSnapshot {
    /// Global banned flag for status displays
    pub fn is_banned(&self) -> bool {
        self.http.banned || self.udp.banned
    }

    pub fn axis(&self, axis: Axis) -> &AxisStatus {
        match axis {
            Axis::Http => &self.http,
            Axis::Udp => &self.udp,
        }
    }

    /// Axes on which dispatch is refused
    pub fn blocked_axes(&self) -> Vec<Axis> {
        Axis::ALL
            .into_iter()
            .filter(|axis| self.axis(*axis).is_blocked())
            .collect()
    }
}

/// Shared ban state with automatic expiry
pub struct BanTracker {
    config: BanConfig,
    state: Mutex<[AxisState; 2]>,
    generation: AtomicU64,
    events: EventBus,
    changes: watch::Sender<BanSnapshot>,
}

impl BanTracker {
    /// Create a tracker; the returned handle is shared by the session and the queues
    pub fn new(config: BanConfig, events: EventBus) -> Arc<Self> {
        let (changes, _) = watch::channel(BanSnapshot::default());
        Arc::new(Self {
            config,
            state: Mutex::new([AxisState::default(), AxisState::default()]),
            generation: AtomicU64::new(0),
            events,
            changes,
        })
    }

    /// Mark the axis banned for the configured ban duration.
    ///
    /// A repeated ban restarts the expiry timer instead of stacking.
    pub fn set_banned(self: &Arc<Self>, axis: Axis, reason: impl Into<String>) {
        let duration = self.config.ban_duration(axis);
        let reason = reason.into();
        let block = self.start_block(axis, BlockKind::Ban, duration, reason.clone());
        let until = block.until;

        {
            let mut state = self.state.lock();
            if let Some(previous) = state[axis.index()].ban.replace(block) {
                previous.timer.abort();
                warn!(
                    "{axis} ban extended: previously banned since {} ({}), now until {until}",
                    previous.started_at, previous.reason
                );
            } else {
                warn!("{axis} banned until {until}: {reason}");
            }
        }

        self.publish();
        self.events.emit(RegistryEvent::BanChanged {
            axis,
            banned: true,
            reason: Some(reason),
            expires_at: Some(until),
        });
    }

    /// Lift a ban before its timer fires
    pub fn clear_banned(&self, axis: Axis) {
        self.clear(axis, BlockKind::Ban, None);
    }

    /// Stay away from an axis for `duration` without flagging it as banned
    pub fn start_backoff(self: &Arc<Self>, axis: Axis, duration: Duration, reason: impl Into<String>) {
        let reason = reason.into();
        let block = self.start_block(axis, BlockKind::Backoff, duration, reason.clone());
        let until = block.until;

        {
            let mut state = self.state.lock();
            if let Some(previous) = state[axis.index()].backoff.replace(block) {
                previous.timer.abort();
                debug!("{axis} backoff restarted (was: {})", previous.reason);
            }
        }
        info!("{axis} backing off for {duration:?}: {reason}");

        self.publish();
        self.events.emit(RegistryEvent::BackoffChanged {
            axis,
            active: true,
            reason: Some(reason),
            until: Some(until),
        });
    }

    pub fn clear_backoff(&self, axis: Axis) {
        self.clear(axis, BlockKind::Backoff, None);
    }

    pub fn is_banned(&self, axis: Axis) -> bool {
        self.state.lock()[axis.index()].ban.is_some()
    }

    /// Whether a ban or a backoff currently refuses dispatch on the axis
    pub fn is_blocked(&self, axis: Axis) -> bool {
        let state = self.state.lock();
        let axis_state = &state[axis.index()];
        axis_state.ban.is_some() || axis_state.backoff.is_some()
    }

    /// Global banned flag (either axis)
    pub fn is_any_banned(&self) -> bool {
        Axis::ALL.into_iter().any(|axis| self.is_banned(axis))
    }

    pub fn blocked_axes(&self) -> Vec<Axis> {
        Axis::ALL
            .into_iter()
            .filter(|axis| self.is_blocked(*axis))
            .collect()
    }

    /// Return the ban or backoff error that refuses dispatch on the axis, if any
    pub fn check(&self, axis: Axis) -> Result<(), ProtocolError> {
        let state = self.state.lock();
        let axis_state = &state[axis.index()];
        if let Some(ban) = &axis_state.ban {
            return Err(ProtocolError::banned(axis, ban.reason.clone()));
        }
        if let Some(backoff) = &axis_state.backoff {
            let remaining = backoff.expires.saturating_duration_since(Instant::now());
            return Err(ProtocolError::backoff(
                axis,
                remaining,
                backoff.reason.clone(),
            ));
        }
        Ok(())
    }

    pub fn snapshot(&self) -> BanSnapshot {
        let state = self.state.lock();
        Self::build_snapshot(&state)
    }

    /// Receiver that observes every ban or backoff change
    pub fn subscribe(&self) -> watch::Receiver<BanSnapshot> {
        self.changes.subscribe()
    }

    /// Stop all expiry timers; blocks stay recorded
    pub fn stop_timers(&self) {
        let state = self.state.lock();
        for axis_state in state.iter() {
            for block in [&axis_state.ban, &axis_state.backoff].into_iter().flatten() {
                block.timer.abort();
            }
        }
        debug!("Ban expiry timers stopped");
    }

    fn start_block(
        self: &Arc<Self>,
        axis: Axis,
        kind: BlockKind,
        duration: Duration,
        reason: String,
    ) -> Block {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let started_at = Utc::now();
        let until = chrono::Duration::from_std(duration)
            .ok()
            .and_then(|delta| started_at.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let timer = spawn_expiry(Arc::downgrade(self), axis, kind, generation, duration);

        Block {
            reason,
            started_at,
            until,
            expires: Instant::now() + duration,
            generation,
            timer,
        }
    }

    fn clear(&self, axis: Axis, kind: BlockKind, generation: Option<u64>) {
        let removed = {
            let mut state = self.state.lock();
            let slot = state[axis.index()].slot(kind);
            let matches = match (slot.as_ref(), generation) {
                (Some(block), Some(generation)) => block.generation == generation,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if matches { slot.take() } else { None }
        };

        let Some(block) = removed else {
            return;
        };
        if generation.is_none() {
            block.timer.abort();
        }

        self.publish();
        match kind {
            BlockKind::Ban => {
                info!("{axis} ban lifted (was: {})", block.reason);
                self.events.emit(RegistryEvent::BanChanged {
                    axis,
                    banned: false,
                    reason: None,
                    expires_at: None,
                });
            }
            BlockKind::Backoff => {
                info!("{axis} backoff ended (was: {})", block.reason);
                self.events.emit(RegistryEvent::BackoffChanged {
                    axis,
                    active: false,
                    reason: None,
                    until: None,
                });
            }
        }
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        self.changes.send_replace(snapshot);
    }

    fn build_snapshot(state: &[AxisState; 2]) -> BanSnapshot {
        let status = |axis: Axis| {
            let axis_state = &state[axis.index()];
            AxisStatus {
                banned: axis_state.ban.is_some(),
                banned_at: axis_state.ban.as_ref().map(|b| b.started_at),
                expires_at: axis_state.ban.as_ref().map(|b| b.until),
                reason: axis_state.ban.as_ref().map(|b| b.reason.clone()),
                backoff_until: axis_state.backoff.as_ref().map(|b| b.until),
                backoff_reason: axis_state.backoff.as_ref().map(|b| b.reason.clone()),
            }
        };

        BanSnapshot {
            http: status(Axis::Http),
            udp: status(Axis::Udp),
        }
    }
}

impl Drop for BanTracker {
    fn drop(&mut self) {
        self.stop_timers();
    }
}

fn spawn_expiry(
    tracker: Weak<BanTracker>,
    axis: Axis,
    kind: BlockKind,
    generation: u64,
    duration: Duration,
) -> AbortHandle {
    tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        if let Some(tracker) = tracker.upgrade() {
            debug!("{axis} {kind:?} timer fired (generation {generation})");
            tracker.clear(axis, kind, Some(generation));
        }
    })
    .abort_handle()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> (Arc<BanTracker>, EventBus) {
        let events = EventBus::new();
        (BanTracker::new(BanConfig::default(), events.clone()), events)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ban_expires_after_configured_duration() {
        let (tracker, _) = tracker();
        let mut changes = tracker.subscribe();

        tracker.set_banned(Axis::Udp, "555 BANNED");
        assert!(tracker.is_banned(Axis::Udp));
        assert!(!tracker.is_banned(Axis::Http));
        assert!(tracker.snapshot().is_banned());

        tokio::time::sleep(Duration::from_secs(11 * 3600)).await;
        assert!(tracker.is_banned(Axis::Udp));

        tokio::time::sleep(Duration::from_secs(3600 + 1)).await;
        assert!(!tracker.is_banned(Axis::Udp));
        assert!(!tracker.snapshot().is_banned());

        changes.changed().await.unwrap();
        assert!(!changes.borrow_and_update().udp.banned);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_ban_restarts_timer() {
        let (tracker, _) = tracker();

        tracker.set_banned(Axis::Http, "first");
        tokio::time::sleep(Duration::from_secs(6 * 3600)).await;
        tracker.set_banned(Axis::Http, "second");

        // The first timer would have fired here
        tokio::time::sleep(Duration::from_secs(6 * 3600 + 10)).await;
        assert!(tracker.is_banned(Axis::Http));
        assert_eq!(
            tracker.snapshot().http.reason.as_deref(),
            Some("second")
        );

        tokio::time::sleep(Duration::from_secs(6 * 3600)).await;
        assert!(!tracker.is_banned(Axis::Http));
    }

    #[tokio::test(start_paused = true)]
    async fn test_axes_are_independent() {
        let (tracker, _) = tracker();

        tracker.set_banned(Axis::Http, "banned");
        assert!(tracker.check(Axis::Udp).is_ok());
        assert!(matches!(
            tracker.check(Axis::Http),
            Err(ProtocolError::Banned { axis: Axis::Http, .. })
        ));

        tracker.clear_banned(Axis::Http);
        assert!(tracker.blocked_axes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_blocks_without_banning() {
        let (tracker, _) = tracker();

        tracker.start_backoff(Axis::Udp, Duration::from_secs(300), "602 SERVER BUSY");
        assert!(tracker.is_blocked(Axis::Udp));
        assert!(!tracker.is_banned(Axis::Udp));
        assert!(!tracker.snapshot().is_banned());
        assert_eq!(tracker.blocked_axes(), vec![Axis::Udp]);

        match tracker.check(Axis::Udp) {
            Err(ProtocolError::Backoff { remaining, .. }) => {
                assert!(remaining <= Duration::from_secs(300));
            }
            other => panic!("expected backoff, got {other:?}"),
        }

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert!(!tracker.is_blocked(Axis::Udp));
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_for_ban_and_expiry() {
        let (tracker, events) = tracker();
        let mut rx = events.subscribe();

        tracker.set_banned(Axis::Udp, "flood");
        match rx.recv().await.unwrap() {
            RegistryEvent::BanChanged {
                axis, banned, reason, ..
            } => {
                assert_eq!(axis, Axis::Udp);
                assert!(banned);
                assert_eq!(reason.as_deref(), Some("flood"));
            }
            other => panic!("unexpected event {other:?}"),
        }

        tokio::time::sleep(Duration::from_secs(12 * 3600 + 1)).await;
        assert!(matches!(
            rx.recv().await.unwrap(),
            RegistryEvent::BanChanged { banned: false, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clearing_unbanned_axis_is_silent() {
        let (tracker, events) = tracker();
        let mut rx = events.subscribe();

        tracker.clear_banned(Axis::Http);
        tracker.clear_backoff(Axis::Udp);
        assert!(rx.try_recv().is_err());
    }
}
