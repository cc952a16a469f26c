//! Ping/keep-alive deadline tracker for one websocket peer.
//!
//! Engine.IO heartbeats are driven by the server: it sends a ping every
//! `interval` and expects a pong within `timeout`. The same tracker serves both
//! ends of the relay:
//!
//! - Downstream (relay as server): `Heartbeat::poll(now)` says when to send the next
//!   ping and when a consumer has failed to answer; `Heartbeat::pong_received(now)`
//!   clears the outstanding ping.
//! - Upstream (relay as client): `Heartbeat::record_activity(now)` on every inbound
//!   frame; `Heartbeat::is_silent(now)` once nothing, not even a ping, has arrived for
//!   `interval + timeout`.
//!
//! Time is passed in as `std::time::Instant` so callers (and tests) own the clock.

use std::time::{Duration, Instant};

/// What the owner of a server-side heartbeat should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Nothing due yet.
    Idle,
    /// Send a ping now; the tracker has started waiting for its pong.
    SendPing,
    /// The peer missed its pong deadline.
    Expired,
}

/// Tracks ping/pong deadlines for a single connection.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    /// Delay between pings.
    interval: Duration,
    /// Time allowed for a pong.
    timeout: Duration,
    /// When the next ping is due.
    next_ping: Instant,
    /// Set while a ping is waiting for its pong.
    ping_sent_at: Option<Instant>,
    /// Last time anything arrived from the peer.
    last_seen: Instant,
}

impl Heartbeat {
    /// Create a tracker whose first ping is due one `interval` after `now`.
    pub fn new(interval: Duration, timeout: Duration, now: Instant) -> Self {
        Self {
            interval,
            timeout,
            next_ping: now + interval,
            ping_sent_at: None,
            last_seen: now,
        }
    }

    /// Create a tracker from Engine.IO handshake values in milliseconds.
    pub fn from_millis(interval_ms: u64, timeout_ms: u64, now: Instant) -> Self {
        Self::new(
            Duration::from_millis(interval_ms),
            Duration::from_millis(timeout_ms),
            now,
        )
    }

    /// Decide whether a ping is due or the peer has timed out.
    pub fn poll(&mut self, now: Instant) -> HeartbeatAction {
        if let Some(sent) = self.ping_sent_at {
            return if now.duration_since(sent) > self.timeout {
                HeartbeatAction::Expired
            } else {
                HeartbeatAction::Idle
            };
        }

        if now >= self.next_ping {
            self.ping_sent_at = Some(now);
            self.next_ping = now + self.interval;
            HeartbeatAction::SendPing
        } else {
            HeartbeatAction::Idle
        }
    }

    /// Record the pong answering the outstanding ping.
    pub fn pong_received(&mut self, now: Instant) {
        self.ping_sent_at = None;
        self.last_seen = now;
    }

    /// Record any inbound frame.
    pub fn record_activity(&mut self, now: Instant) {
        self.last_seen = now;
    }

    /// `true` once the peer has been quiet longer than `interval + timeout`.
    pub fn is_silent(&self, now: Instant) -> bool {
        now.duration_since(self.last_seen) > self.interval + self.timeout
    }
}
