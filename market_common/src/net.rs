//! Shared networking defaults used by the relay and the watcher.
use std::time::Duration;

/// Upstream Socket.IO server publishing live prices.
pub const UPSTREAM_URL: &str = "https://socket.haremaltin.com";
/// `Origin` header the upstream server requires on the websocket upgrade.
pub const UPSTREAM_ORIGIN: &str = "https://canlipiyasalar.haremaltin.com";

/// Default bind interface for the downstream server.
pub const BIND_HOST: &str = "0.0.0.0";
/// Default TCP port for the downstream server.
pub const RELAY_PORT: u16 = 5001;

/// Fixed delay between upstream reconnect attempts.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(5);
/// Upper bound on establishing one upstream connection, handshakes included.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Engine.IO ping interval advertised to downstream consumers.
pub const PING_INTERVAL: Duration = Duration::from_secs(25);
/// Engine.IO ping timeout advertised to downstream consumers.
pub const PING_TIMEOUT: Duration = Duration::from_secs(20);
/// Socket read timeout; bounds how long a loop goes without checking its deadlines.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);
/// Per-consumer queue depth in the broadcaster.
pub const SUBSCRIBER_BUFFER: usize = 64;

/// Helper to format a host and port like "host:port".
pub fn addr(host: &str, port: u16) -> String {
    format!("{}:{}", host, port)
}
