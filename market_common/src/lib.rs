//!
//! Common types and utilities shared by the market relay and the console watcher.
//!
//! This crate aggregates:
//! - `error` — unified error type `RelayError` used across the workspace.
//! - `result` — handy `Result<T, RelayError>` alias.
//! - `symbols` — the static table of known symbol codes and display names.
//! - `ticker` — raw upstream ticks and the price normalizer.
//! - `update` — decoding of `price_changed` payloads into `PriceUpdate` batches.
//! - `protocol` — Engine.IO / Socket.IO text packet codec.
//! - `heartbeat` — ping/pong deadline tracking for both ends of a socket.
//! - `shutdown` — one-shot shutdown signal for the long-running loops.
//! - `feed` — the reconnecting upstream feed client.
//! - `transport` — the websocket connector used by the feed client.
//! - `net` — networking defaults.
#![warn(missing_docs)]
pub mod error;
pub mod feed;
pub mod heartbeat;
pub mod net;
pub mod protocol;
pub mod result;
pub mod shutdown;
pub mod symbols;
pub mod ticker;
pub mod transport;
pub mod update;

pub use error::RelayError;
pub use result::Result;
pub use symbols::Symbol;
pub use ticker::{RawTick, Ticker};
pub use update::PriceUpdate;
