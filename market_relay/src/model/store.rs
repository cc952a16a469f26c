//! Lock-guarded market state.
//!
//! `MarketStore` keeps the latest `RawTick` per symbol code and the last server
//! time seen upstream. The upstream handler is the only writer; downstream
//! sessions read snapshots when they connect. Every read hands out an owned
//! copy, so nothing outside the lock can observe a later merge.
//!
//! Entries are replaced wholesale and never evicted: the upstream publishes a
//! few dozen codes, and a symbol that stops updating keeps its last price.

use market_common::ticker::normalize_all;
use market_common::{PriceUpdate, RawTick, RelayError, Ticker};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct MarketState {
    ticks: HashMap<String, RawTick>,
    updated_at: Option<String>,
}

/// Point-in-time copy of the market state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketSnapshot {
    /// Latest tick per upstream code.
    pub ticks: HashMap<String, RawTick>,
    /// Last server time, `HH:MM:SS`.
    pub time: Option<String>,
}

impl MarketSnapshot {
    /// Normalized tickers for every known symbol, in display order.
    pub fn tickers(&self) -> Vec<Ticker> {
        normalize_all(&self.ticks)
    }
}

/// Shared latest-price table.
#[derive(Debug, Default)]
pub struct MarketStore {
    state: Mutex<MarketState>,
}

impl MarketStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for `code`.
    pub fn merge(&self, code: &str, tick: RawTick) -> Result<(), RelayError> {
        let mut state = self.state.lock()?;
        state.ticks.insert(code.to_string(), tick);
        Ok(())
    }

    /// Overwrite the last server time.
    pub fn set_time(&self, time: String) -> Result<(), RelayError> {
        let mut state = self.state.lock()?;
        state.updated_at = Some(time);
        Ok(())
    }

    /// Owned copy of the current state.
    pub fn snapshot(&self) -> Result<MarketSnapshot, RelayError> {
        let state = self.state.lock()?;
        Ok(MarketSnapshot {
            ticks: state.ticks.clone(),
            time: state.updated_at.clone(),
        })
    }

    /// Merge a whole upstream message and snapshot the result in one critical section.
    ///
    /// Returns `None` for an empty message, which leaves the store untouched.
    pub fn apply(&self, update: PriceUpdate) -> Result<Option<MarketSnapshot>, RelayError> {
        if update.is_empty() {
            return Ok(None);
        }

        let mut state = self.state.lock()?;
        for (code, tick) in update.ticks {
            state.ticks.insert(code, tick);
        }
        if let Some(time) = update.timestamp {
            state.updated_at = Some(time);
        }

        Ok(Some(MarketSnapshot {
            ticks: state.ticks.clone(),
            time: state.updated_at.clone(),
        }))
    }

    /// Number of codes held.
    pub fn len(&self) -> Result<usize, RelayError> {
        Ok(self.state.lock()?.ticks.len())
    }

    /// `true` before the first merge.
    pub fn is_empty(&self) -> Result<bool, RelayError> {
        Ok(self.len()? == 0)
    }
}
