//! Keepalive schedule.
//!
//! Pure timing logic: the driver owns the actual interval timer and feeds
//! this schedule the current instant on every tick and every received
//! frame. Only the client side runs a schedule; the server side never
//! originates keepalives, it only answers RESPOND-flagged ones.

use std::time::{Duration, Instant};

/// What the driver must do on a keepalive tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveAction {
    /// Send a KEEPALIVE frame with the RESPOND flag.
    SendKeepalive,
    /// The peer has been silent past the maximum lifetime; tear down.
    Timeout,
}

/// Client-side keepalive state: tracks the last time any frame arrived.
#[derive(Debug)]
pub struct KeepaliveSchedule {
    interval: Duration,
    max_lifetime: Duration,
    last_received: Instant,
}

impl KeepaliveSchedule {
    /// Create a schedule; `now` seeds the last-received clock.
    pub fn new(interval: Duration, max_lifetime: Duration, now: Instant) -> Self {
        Self {
            interval,
            max_lifetime,
            last_received: now,
        }
    }

    /// Interval at which the driver should tick this schedule.
    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Maximum tolerated silence.
    #[inline]
    pub fn max_lifetime(&self) -> Duration {
        self.max_lifetime
    }

    /// Record that a frame arrived from the peer.
    pub fn note_frame_received(&mut self, now: Instant) {
        self.last_received = now;
    }

    /// Decide what to do at a scheduled tick.
    pub fn on_tick(&self, now: Instant) -> KeepaliveAction {
        if now.duration_since(self.last_received) >= self.max_lifetime {
            KeepaliveAction::Timeout
        } else {
            KeepaliveAction::SendKeepalive
        }
    }
}
