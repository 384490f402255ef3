//! Internal low-latency bus: per-channel tokio broadcast senders.
//!
//! Serves same-process subscribers (SSE handlers, background reconcilers).
//! Slow subscribers that fall more than `capacity` messages behind observe a
//! `Lagged` error from their receiver rather than blocking publishers.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;

use crate::event::RealtimeEvent;

const DEFAULT_CAPACITY: usize = 256;

pub struct BroadcastBus {
    capacity: usize,
    senders: Mutex<HashMap<String, broadcast::Sender<RealtimeEvent>>>,
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl BroadcastBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            senders: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to a channel, creating it on first use.
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<RealtimeEvent> {
        let mut senders = self.senders.lock().expect("bus lock poisoned");
        senders
            .entry(channel.to_owned())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publish to the event's channel. Returns how many subscribers received
    /// it; zero means nobody in this process was listening, which is not an
    /// error at the bus level.
    pub fn publish(&self, event: &RealtimeEvent) -> usize {
        let mut senders = self.senders.lock().expect("bus lock poisoned");
        // Drop channels whose last subscriber went away so the map does not
        // accumulate one entry per delivery forever.
        senders.retain(|_, sender| sender.receiver_count() > 0);

        match senders.get(&event.channel) {
            Some(sender) => sender.send(event.clone()).unwrap_or(0),
            None => 0,
        }
    }

    /// Subscribers currently attached to `channel`.
    #[must_use]
    pub fn subscriber_count(&self, channel: &str) -> usize {
        let senders = self.senders.lock().expect("bus lock poisoned");
        senders
            .get(channel)
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice(channel: &str) -> RealtimeEvent {
        RealtimeEvent::new(channel, "notice", serde_json::json!({"n": 1}))
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = BroadcastBus::default();
        let mut rx = bus.subscribe("user:u-1:deliveries");

        let event = notice("user:u-1:deliveries");
        assert_eq!(bus.publish(&event), 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.message_id, event.message_id);
    }

    #[tokio::test]
    async fn channels_are_isolated() {
        let bus = BroadcastBus::default();
        let mut other = bus.subscribe("user:u-2:deliveries");

        assert_eq!(bus.publish(&notice("user:u-1:deliveries")), 0);
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropped_subscribers_are_pruned() {
        let bus = BroadcastBus::default();
        let rx = bus.subscribe("delivery:dd_1:location");
        assert_eq!(bus.subscriber_count("delivery:dd_1:location"), 1);

        drop(rx);
        bus.publish(&notice("system:status"));
        assert_eq!(bus.subscriber_count("delivery:dd_1:location"), 0);
    }
}
