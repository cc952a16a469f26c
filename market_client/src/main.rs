//! Market Client: a console watcher for the upstream price feed.
//!
//! It connects straight to the upstream Socket.IO feed with the same reconnecting
//! `FeedClient` the relay uses, requests the full price table and logs every
//! `price_changed` batch as raw values, one line per symbol, followed by a separator.
//!
//! Usage example (CLI):
//! ```bash
//! market_client --symbol ONS --symbol ALTIN
//! market_client --symbols-file ./symbols.txt
//! ```
//!
//! The symbols file holds one code per line; blank lines and `#` comments are skipped.
//! See `market_common::symbols` for details.
#![warn(missing_docs)]
mod args;
mod printer;

use crate::args::Args;
use crate::printer::PricePrinter;
use clap::Parser;
use log::info;
use market_common::Symbol;
use market_common::feed::{FeedClient, FeedConfig};
use market_common::shutdown::shutdown_channel;
use market_common::symbols::SymbolParser;
use market_common::transport::SocketIoConnector;
use market_common::{RelayError, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;

fn main() -> Result<(), RelayError> {
    init_logger();
    let args = Args::parse();

    let mut symbols = args.symbols.clone();
    if let Some(raw) = &args.symbols_file {
        let file = File::open(normalize_path(raw))?;
        symbols.extend(Symbol::parse_from_file(BufReader::new(file))?);
    }
    if symbols.is_empty() {
        info!("Watching every upstream symbol");
    } else {
        info!("Watching symbols: {:?}", symbols);
    }

    let (trigger, signal) = shutdown_channel();
    ctrlc::set_handler(move || {
        info!("Ctrl+C received. Shutting down client...");
        trigger.fire();
    })
    .map_err(|e| RelayError::Format(format!("Error setting Ctrl+C handler: {}", e)))?;

    let config = FeedConfig {
        url: args.upstream_url,
        origin: args.origin,
        connect_timeout: Duration::from_secs(args.connect_timeout_secs),
        retry_interval: Duration::from_secs(args.retry_secs),
    };
    let retry_interval = config.retry_interval;

    info!("Client is running. Press Ctrl+C to exit.");
    let mut client = FeedClient::new(
        SocketIoConnector::new(config),
        PricePrinter::only(symbols),
        retry_interval,
    );
    client.run(&signal);
    info!("Printed {} price batches", client.handler().batches());
    Ok(())
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Normalize a CLI-provided path string by trimming whitespace and matching quotes.
///
/// This allows passing Windows paths in quotes without breaking parsing.
fn normalize_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let no_quotes = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    PathBuf::from(no_quotes)
}
