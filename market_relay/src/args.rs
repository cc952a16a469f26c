//! Command-line arguments for the Market Relay.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use clap::Parser;
use market_common::net::{
    BIND_HOST, CONNECT_TIMEOUT, PING_INTERVAL, PING_TIMEOUT, RELAY_PORT, RETRY_INTERVAL,
    SUBSCRIBER_BUFFER, UPSTREAM_ORIGIN, UPSTREAM_URL,
};

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Interface the downstream server binds to.
    #[clap(long, default_value = BIND_HOST)]
    pub bind: String,

    /// TCP port for downstream consumers.
    #[clap(long, default_value_t = RELAY_PORT)]
    pub port: u16,

    /// Base URL of the upstream Socket.IO price feed.
    #[clap(long, default_value = UPSTREAM_URL)]
    pub upstream_url: String,

    /// `Origin` header sent to the upstream feed.
    #[clap(long, default_value = UPSTREAM_ORIGIN)]
    pub origin: String,

    /// Seconds to wait before reconnecting to the upstream feed.
    #[clap(long, default_value_t = RETRY_INTERVAL.as_secs())]
    pub retry_secs: u64,

    /// Seconds allowed for one upstream connection attempt.
    #[clap(long, default_value_t = CONNECT_TIMEOUT.as_secs())]
    pub connect_timeout_secs: u64,

    /// Seconds between pings sent to downstream consumers.
    #[clap(long, default_value_t = PING_INTERVAL.as_secs())]
    pub ping_interval_secs: u64,

    /// Seconds a downstream consumer has to answer a ping.
    #[clap(long, default_value_t = PING_TIMEOUT.as_secs())]
    pub ping_timeout_secs: u64,

    /// Queued updates per consumer; when full, its oldest update is replaced.
    #[clap(long, default_value_t = SUBSCRIBER_BUFFER)]
    pub subscriber_buffer: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_frontend_proxy() {
        let args = Args::parse_from(["market_relay"]);
        assert_eq!(args.bind, "0.0.0.0");
        assert_eq!(args.port, 5001);
        assert_eq!(args.upstream_url, UPSTREAM_URL);
        assert_eq!(args.retry_secs, 5);
        assert_eq!(args.connect_timeout_secs, 10);
        assert_eq!(args.ping_interval_secs, 25);
        assert_eq!(args.ping_timeout_secs, 20);
        assert_eq!(args.subscriber_buffer, 64);
    }

    #[test]
    fn overrides_are_parsed() {
        let args = Args::parse_from([
            "market_relay",
            "--port",
            "6000",
            "--upstream-url",
            "http://127.0.0.1:9000",
            "--ping-interval-secs",
            "5",
        ]);
        assert_eq!(args.port, 6000);
        assert_eq!(args.upstream_url, "http://127.0.0.1:9000");
        assert_eq!(args.ping_interval_secs, 5);
    }
}
