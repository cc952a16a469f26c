//! Market data fan-out to downstream sessions.
//!
//! The `Broadcaster` keeps one bounded `crossbeam_channel` queue per connected
//! session. Sessions register through `Broadcaster::subscribe` and own the
//! returned `Subscription`; `Publisher::publish` pushes the same
//! `Arc<MarketData>` into every registered queue.
//!
//! Design notes:
//! - Every event is a full snapshot, so a full queue gives up its oldest event
//!   rather than the new one; a slow session always ends on the latest prices.
//! - A session whose `Subscription` is gone is dropped from the list on the next
//!   publish.
//! - Publishing with no subscribers does nothing.

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};
use log::{debug, warn};
use market_common::Ticker;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Payload of the downstream `market_data` event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketData {
    /// Normalized tickers in display order.
    pub tickers: Vec<Ticker>,
    /// Upstream server time of the update, if one has been seen.
    pub time: Option<String>,
}

/// Message delivered to every subscriber.
pub type MarketEvent = Arc<MarketData>;

/// Sink for normalized snapshots.
pub trait Publisher: Send + Sync {
    /// Deliver `tickers` and `time` to every current consumer.
    fn publish(&self, tickers: Vec<Ticker>, time: Option<String>);
}

/// Receiving end handed to one session. Dropping it unsubscribes.
pub struct Subscription {
    rx: Receiver<MarketEvent>,
    _alive: Arc<()>,
}

impl Subscription {
    /// Next queued event without blocking.
    ///
    /// `Disconnected` means the broadcaster is gone.
    pub fn try_recv(&self) -> Result<MarketEvent, TryRecvError> {
        self.rx.try_recv()
    }
}

struct Subscriber {
    tx: Sender<MarketEvent>,
    /// Second handle on the queue, used to evict the oldest event.
    overflow: Receiver<MarketEvent>,
    alive: Weak<()>,
}

impl Subscriber {
    /// Queue `event`, evicting the oldest one if the queue is full.
    /// Returns `false` once the session has gone away.
    fn deliver(&self, event: &MarketEvent) -> bool {
        if self.alive.strong_count() == 0 {
            return false;
        }
        match self.tx.try_send(Arc::clone(event)) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                let _ = self.overflow.try_recv();
                if self.tx.try_send(event).is_err() {
                    warn!("Subscriber queue still full, dropping market update");
                } else {
                    debug!("Subscriber queue full, replaced its oldest market update");
                }
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Fan-out of market data events to subscribed sessions.
pub struct Broadcaster {
    subscribers: Mutex<Vec<Subscriber>>,
    capacity: usize,
}

impl Broadcaster {
    /// Create a broadcaster giving each subscriber a queue of `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = bounded(self.capacity);
        let alive = Arc::new(());
        let mut subscribers = self.lock();
        subscribers.push(Subscriber {
            tx,
            overflow: rx.clone(),
            alive: Arc::downgrade(&alive),
        });
        debug!("Broadcaster: subscriber added. Total: {}", subscribers.len());
        Subscription { rx, _alive: alive }
    }

    /// Number of registered subscribers, including ones not yet noticed as gone.
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Publisher for Broadcaster {
    fn publish(&self, tickers: Vec<Ticker>, time: Option<String>) {
        let event: MarketEvent = Arc::new(MarketData { tickers, time });
        let mut subscribers = self.lock();
        subscribers.retain(|subscriber| subscriber.deliver(&event));
    }
}
