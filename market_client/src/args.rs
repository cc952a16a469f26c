//! Command-line arguments for the Market Client.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use clap::Parser;
use market_common::Symbol;
use market_common::net::{CONNECT_TIMEOUT, RETRY_INTERVAL, UPSTREAM_ORIGIN, UPSTREAM_URL};

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Base URL of the upstream Socket.IO price feed.
    #[clap(long, default_value = UPSTREAM_URL)]
    pub upstream_url: String,

    /// `Origin` header sent to the upstream feed.
    #[clap(long, default_value = UPSTREAM_ORIGIN)]
    pub origin: String,

    /// Seconds to wait before reconnecting.
    #[clap(long, default_value_t = RETRY_INTERVAL.as_secs())]
    pub retry_secs: u64,

    /// Seconds allowed for one connection attempt.
    #[clap(long, default_value_t = CONNECT_TIMEOUT.as_secs())]
    pub connect_timeout_secs: u64,

    /// Only print this symbol code. May be repeated.
    #[clap(long = "symbol", value_name = "CODE")]
    pub symbols: Vec<Symbol>,

    /// Path to a text file with one symbol code per line (`#` starts a comment).
    #[clap(long)]
    pub symbols_file: Option<String>,
}
