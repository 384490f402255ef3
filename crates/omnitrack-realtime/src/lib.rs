//! Realtime fan-out: one channel-naming scheme, two destinations.
//!
//! Normalized delivery, location, and connection-status updates are
//! published on an internal tokio broadcast bus (same-process subscribers)
//! and an external HTTP relay (remote/browser subscribers). Each leg is
//! best-effort; the publish succeeds when either accepts.

pub mod bus;
pub mod channels;
pub mod event;
pub mod fanout;
pub mod relay;

pub use bus::BroadcastBus;
pub use event::RealtimeEvent;
pub use fanout::{EventFanout, FanoutError, FanoutReceipt};
pub use relay::{HttpRelay, MemoryRelay, RelayError, RelayPublisher};
