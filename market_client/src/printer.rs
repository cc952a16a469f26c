//! Console rendering of upstream price batches.
//!
//! Values are printed as the upstream sent them, without normalization, so the
//! watcher doubles as a way to inspect the raw feed.

use chrono::Local;
use log::{debug, info};
use market_common::feed::{FeedState, PriceHandler};
use market_common::{PriceUpdate, RawTick, Symbol};
use serde_json::Value;
use std::collections::HashSet;

const MISSING: &str = "N/A";
const SEPARATOR_WIDTH: usize = 60;

/// `PriceHandler` logging one line per entry of every `price_changed` batch.
pub struct PricePrinter {
    filter: Option<HashSet<Symbol>>,
    batches: u64,
}

impl PricePrinter {
    /// Print every entry, known symbol or not.
    pub fn all() -> Self {
        Self {
            filter: None,
            batches: 0,
        }
    }

    /// Print only `symbols`. An empty list means no filter.
    pub fn only(symbols: Vec<Symbol>) -> Self {
        if symbols.is_empty() {
            return Self::all();
        }
        Self {
            filter: Some(symbols.into_iter().collect()),
            batches: 0,
        }
    }

    /// Number of batches printed so far.
    pub fn batches(&self) -> u64 {
        self.batches
    }

    fn wanted(&self, code: &str) -> bool {
        match &self.filter {
            None => true,
            Some(symbols) => Symbol::from_code(code).is_some_and(|s| symbols.contains(&s)),
        }
    }

    /// Lines for the entries of `update` that pass the filter, in arrival order.
    pub fn lines(&self, update: &PriceUpdate) -> Vec<String> {
        update
            .ticks
            .iter()
            .filter(|(code, _)| self.wanted(code))
            .map(|(code, tick)| format_line(code, tick))
            .collect()
    }
}

/// `<code> | Alış: <buy> | Satış: <sell>`, preferring the entry's own `code` field.
pub fn format_line(key: &str, tick: &RawTick) -> String {
    let label = match &tick.code {
        Value::String(code) if !code.is_empty() => code.as_str(),
        _ => key,
    };
    format!(
        "{} | Alış: {} | Satış: {}",
        label,
        raw_text(&tick.alis),
        raw_text(&tick.satis)
    )
}

fn raw_text(value: &Value) -> String {
    match value {
        Value::Null => MISSING.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl PriceHandler for PricePrinter {
    fn on_price_update(&mut self, update: PriceUpdate) {
        if update.is_empty() {
            debug!("Empty price batch");
            return;
        }

        let lines = self.lines(&update);
        if lines.is_empty() {
            return;
        }

        self.batches += 1;
        info!(
            "Update #{} received {} (server time {})",
            self.batches,
            Local::now().format("%H:%M:%S"),
            update.timestamp.as_deref().unwrap_or(MISSING)
        );
        for line in lines {
            info!("  {}", line);
        }
        info!("{}", "-".repeat(SEPARATOR_WIDTH));
    }

    fn on_state_change(&mut self, state: FeedState) {
        info!("Feed {}", state);
    }
}
