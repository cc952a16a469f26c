//! Domain models for the relay.
//!
//! This module groups the shared state behind the upstream handler and the
//! downstream sessions:
//! - `store` — `MarketStore`, the lock-guarded map of latest ticks plus the update time.
//! - `broadcast` — `Broadcaster`, fan-out of `MarketData` events to subscribed sessions.

pub mod broadcast;
pub mod store;
