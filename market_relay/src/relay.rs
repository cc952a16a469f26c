//! Upstream handler tying the store to the broadcaster.
//!
//! For every `price_changed` message the relay merges the batch into the
//! `MarketStore`, normalizes the resulting snapshot and, when at least one known
//! symbol is present, publishes it. All of this runs synchronously on the feed
//! thread, so one message is fully published before the next is read.

use log::{debug, error, info};
use market_common::PriceUpdate;
use market_common::feed::{FeedState, PriceHandler};
use std::sync::Arc;

use crate::model::broadcast::Publisher;
use crate::model::store::MarketStore;

/// `PriceHandler` that keeps the store current and re-broadcasts every update.
pub struct MarketRelay<P: Publisher> {
    store: Arc<MarketStore>,
    publisher: Arc<P>,
}

impl<P: Publisher> MarketRelay<P> {
    /// Create a relay writing into `store` and publishing through `publisher`.
    pub fn new(store: Arc<MarketStore>, publisher: Arc<P>) -> Self {
        Self { store, publisher }
    }
}

impl<P: Publisher> PriceHandler for MarketRelay<P> {
    fn on_price_update(&mut self, update: PriceUpdate) {
        let snapshot = match self.store.apply(update) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return,
            Err(e) => {
                error!("Failed to merge price update: {}", e);
                return;
            }
        };

        let tickers = snapshot.tickers();
        if tickers.is_empty() {
            debug!("Update carried no known symbols");
            return;
        }
        debug!("Publishing {} tickers", tickers.len());
        self.publisher.publish(tickers, snapshot.time);
    }

    fn on_state_change(&mut self, state: FeedState) {
        if state == FeedState::Connected {
            match self.store.len() {
                Ok(known) => info!("Upstream connected; store holds {} symbols", known),
                Err(e) => error!("Store unavailable: {}", e),
            }
        }
    }
}
