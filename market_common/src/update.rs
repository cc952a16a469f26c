//! Decoding of upstream `price_changed` payloads.
//!
//! The upstream sends `{data: {<code>: {...}}, meta: {tarih: "YYYY-MM-DD HH:MM:SS"}}`.
//! Decoding never fails: a payload without usable `data` becomes an empty
//! update, and individual entries that are not objects are skipped.

use log::warn;
use serde_json::Value;

use crate::ticker::RawTick;

/// One upstream message worth of ticks plus its server time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceUpdate {
    /// Ticks keyed by upstream symbol code, in arrival order.
    pub ticks: Vec<(String, RawTick)>,
    /// Server time of the update, already reduced to its time-of-day part.
    pub timestamp: Option<String>,
}

impl PriceUpdate {
    /// Decode a `price_changed` payload.
    pub fn from_payload(payload: &Value) -> Self {
        let ticks = payload
            .get("data")
            .and_then(Value::as_object)
            .map(|data| {
                data.iter()
                    .filter_map(|(code, entry)| match entry {
                        Value::Object(_) => match serde_json::from_value::<RawTick>(entry.clone()) {
                            Ok(tick) => Some((code.clone(), tick)),
                            Err(e) => {
                                warn!("Skipping tick for {}: {}", code, e);
                                None
                            }
                        },
                        _ => {
                            warn!("Skipping non-object tick for {}", code);
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let timestamp = payload
            .get("meta")
            .and_then(|meta| meta.get("tarih"))
            .and_then(Value::as_str)
            .map(update_time);

        PriceUpdate { ticks, timestamp }
    }

    /// `true` when the message carried no ticks.
    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}

/// Reduce `"date time"` to `"time"`; strings without a space are kept whole.
pub fn update_time(tarih: &str) -> String {
    match tarih.split_once(' ') {
        Some((_, time)) => time.to_string(),
        None => tarih.to_string(),
    }
}
