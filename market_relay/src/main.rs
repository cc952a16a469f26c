//! Market Relay: a live precious-metals price relay.
//!
//! This binary keeps one Socket.IO connection to the upstream price feed and fans every
//! update out to any number of downstream websocket consumers. Internally, it wires
//! together four building blocks:
//!
//! - `FeedClient` (from `market_common`): connects upstream, requests the full price
//!   table, decodes `price_changed` events and reconnects after a fixed delay forever.
//! - `MarketRelay`: the feed's `PriceHandler`; merges each batch into the `MarketStore`,
//!   normalizes the snapshot into tickers and publishes it.
//! - `Broadcaster`: one bounded `crossbeam_channel` queue per consumer.
//! - `RelayServer`: accepts consumers and runs one session thread per consumer, which
//!   sends the current snapshot on connect and forwards every `market_data` event.
//!
//! Concurrency and shutdown:
//! - The feed client runs on its own thread, the accept loop on another; the main thread
//!   waits for the shutdown signal.
//! - Ctrl+C fires the signal; the feed thread disconnects from upstream gracefully and the
//!   process exits.
//!
//! Usage example (CLI):
//! ```bash
//! RUST_LOG=debug market_relay --port 5001 --ping-interval-secs 25
//! ```
#![warn(missing_docs)]
mod args;
mod model;
mod relay;
mod server;
mod session;

use crate::args::Args;
use crate::model::broadcast::Broadcaster;
use crate::model::store::MarketStore;
use crate::relay::MarketRelay;
use crate::server::RelayServer;
use crate::session::SessionConfig;
use clap::Parser;
use log::{error, info};
use market_common::RelayError;
use market_common::feed::{FeedClient, FeedConfig};
use market_common::net::addr;
use market_common::shutdown::shutdown_channel;
use market_common::transport::SocketIoConnector;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<(), RelayError> {
    init_logger();
    let args = Args::parse();

    let feed_config = FeedConfig {
        url: args.upstream_url.clone(),
        origin: args.origin.clone(),
        connect_timeout: Duration::from_secs(args.connect_timeout_secs),
        retry_interval: Duration::from_secs(args.retry_secs),
    };
    let session_config = SessionConfig {
        ping_interval: Duration::from_secs(args.ping_interval_secs),
        ping_timeout: Duration::from_secs(args.ping_timeout_secs),
        ..SessionConfig::default()
    };

    let store = Arc::new(MarketStore::new());
    let broadcaster = Arc::new(Broadcaster::new(args.subscriber_buffer));
    let server = RelayServer::new(&addr(&args.bind, args.port))?;

    let (trigger, signal) = shutdown_channel();
    ctrlc::set_handler(move || {
        info!("Ctrl+C received. Shutting down relay...");
        trigger.fire();
    })
    .map_err(|e| RelayError::Format(format!("Error setting Ctrl+C handler: {}", e)))?;

    {
        let store = Arc::clone(&store);
        let broadcaster = Arc::clone(&broadcaster);
        thread::Builder::new()
            .name("relay-server".to_string())
            .spawn(move || {
                if let Err(e) = server.accept_loop(store, broadcaster, session_config) {
                    error!("Accept loop failed: {}", e);
                }
            })?;
    }

    let feed = {
        let signal = signal.clone();
        let retry_interval = feed_config.retry_interval;
        let handler = MarketRelay::new(Arc::clone(&store), Arc::clone(&broadcaster));
        thread::Builder::new()
            .name("upstream-feed".to_string())
            .spawn(move || {
                let mut client =
                    FeedClient::new(SocketIoConnector::new(feed_config), handler, retry_interval);
                client.run(&signal);
            })?
    };

    info!("Relay is running. Press Ctrl+C to exit.");
    signal.wait_forever();
    if feed.join().is_err() {
        error!("Upstream feed thread panicked");
    }
    info!("Relay stopped");
    Ok(())
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
