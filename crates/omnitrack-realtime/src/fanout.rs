//! Fan-out across both realtime destinations.
//!
//! Delivery is at-least-once and best-effort on each destination
//! independently. A publish counts as successful when either destination
//! accepts it; only a double miss surfaces as an error.

use std::sync::Arc;

use thiserror::Error;

use crate::bus::BroadcastBus;
use crate::event::RealtimeEvent;
use crate::relay::{RelayError, RelayPublisher};

#[derive(Debug, Error)]
#[error("no realtime destination accepted the publish on '{channel}'")]
pub struct FanoutError {
    pub channel: String,
    #[source]
    pub relay_error: Option<RelayError>,
}

/// What each destination did with one event.
#[derive(Debug)]
pub struct FanoutReceipt {
    /// In-process subscribers that received the event.
    pub bus_receivers: usize,
    /// Whether the external relay accepted it (`false` when no relay is
    /// configured).
    pub relay_accepted: bool,
}

pub struct EventFanout {
    bus: Arc<BroadcastBus>,
    relay: Option<Arc<dyn RelayPublisher>>,
}

impl EventFanout {
    #[must_use]
    pub fn new(bus: Arc<BroadcastBus>, relay: Option<Arc<dyn RelayPublisher>>) -> Self {
        Self { bus, relay }
    }

    #[must_use]
    pub fn bus(&self) -> &BroadcastBus {
        &self.bus
    }

    /// Publish to the internal bus and the external relay.
    ///
    /// # Errors
    ///
    /// [`FanoutError`] only when no in-process subscriber received the event
    /// AND the relay (if configured) rejected it.
    pub async fn publish(&self, event: &RealtimeEvent) -> Result<FanoutReceipt, FanoutError> {
        let bus_receivers = self.bus.publish(event);

        let (relay_accepted, relay_error) = match &self.relay {
            Some(relay) => match relay.publish(event).await {
                Ok(()) => (true, None),
                Err(err) => {
                    tracing::warn!(
                        channel = %event.channel,
                        error = %err,
                        "relay publish failed"
                    );
                    (false, Some(err))
                }
            },
            None => (false, None),
        };

        if bus_receivers == 0 && !relay_accepted && self.relay.is_some() {
            return Err(FanoutError {
                channel: event.channel.clone(),
                relay_error,
            });
        }

        tracing::debug!(
            channel = %event.channel,
            event_type = %event.event_type,
            bus_receivers,
            relay_accepted,
            "event published"
        );
        Ok(FanoutReceipt {
            bus_receivers,
            relay_accepted,
        })
    }
}
