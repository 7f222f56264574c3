//! Helpers shared by the integration tests

#![allow(dead_code)]

use anilib_core::events::RegistryEvent;
use std::time::Duration;
use tokio::sync::broadcast;

pub const GROUP_REPLY: &str = "250 GROUP\n7|832|1200|55|900|Frostii|FRO|#frostii|irc.rizon.net|http://frostii.com";

/// Poll `condition` on the (usually paused) clock until it holds
pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let step = Duration::from_millis(50);
    let mut waited = Duration::ZERO;
    while waited < limit {
        if condition() {
            return true;
        }
        tokio::time::sleep(step).await;
        waited += step;
    }
    condition()
}

/// Everything published so far
pub fn drain_events(receiver: &mut broadcast::Receiver<RegistryEvent>) -> Vec<RegistryEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}
