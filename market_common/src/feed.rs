//! Reconnecting upstream feed client.
//!
//! `FeedClient` owns the connection life cycle and nothing else:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnected -> (retry_interval) -> Connecting ...
//! ```
//!
//! Opening a connection is delegated to a [`Connector`], and every decoded
//! `price_changed` payload is handed to a [`PriceHandler`]. Both are injected so
//! the loop can be driven by scripted sessions in tests and by
//! [`crate::transport::SocketIoConnector`] in production.
//!
//! Failures never leave the loop: connect errors, emit errors and dropped
//! connections are logged and followed by the fixed retry delay. The loop ends
//! only when the [`ShutdownSignal`] fires, after closing the live session.

use log::{debug, info, warn};
use serde_json::Value;
use std::time::Duration;
use strum_macros::Display;

use crate::error::RelayError;
use crate::protocol::{PRICE_CHANGED, SNAPSHOT_REQUEST};
use crate::shutdown::ShutdownSignal;
use crate::update::PriceUpdate;

/// Upstream connection settings.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Base URL of the upstream Socket.IO server (`http(s)://` or `ws(s)://`).
    pub url: String,
    /// Value of the `Origin` header sent on the upgrade request.
    pub origin: String,
    /// Bound on one connection attempt, handshakes included.
    pub connect_timeout: Duration,
    /// Delay before reconnecting after a failure or a dropped connection.
    pub retry_interval: Duration,
}

/// Connection state of the feed client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum FeedState {
    /// No live session; waiting to (re)connect.
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// Handshakes done; receiving events.
    Connected,
}

/// An event received from the upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEvent {
    /// Socket.IO event name.
    pub name: String,
    /// Event arguments.
    pub args: Vec<Value>,
}

/// Result of polling a session once.
#[derive(Debug, Clone, PartialEq)]
pub enum Polled {
    /// An application event arrived.
    Event(FeedEvent),
    /// Nothing arrived before the read timeout (heartbeats are handled internally).
    Idle,
    /// The upstream closed the session.
    Closed,
}

/// A live upstream session.
pub trait FeedSession {
    /// Emit a Socket.IO event without arguments.
    fn emit(&mut self, event: &str) -> Result<(), RelayError>;

    /// Wait briefly for the next event. Errors end the session.
    fn poll_event(&mut self) -> Result<Polled, RelayError>;

    /// Disconnect politely; failures are ignored.
    fn close(&mut self);
}

/// Opens upstream sessions.
pub trait Connector {
    /// Session type produced by this connector.
    type Session: FeedSession;

    /// Open one session, handshakes included.
    fn connect(&mut self) -> Result<Self::Session, RelayError>;
}

/// Receives price updates from the feed client.
pub trait PriceHandler {
    /// Called once per `price_changed` message, on the feed thread.
    fn on_price_update(&mut self, update: PriceUpdate);

    /// Called on every state transition.
    fn on_state_change(&mut self, _state: FeedState) {}
}

/// Why a connected session ended.
enum SessionEnd {
    Shutdown,
    Dropped,
}

/// Reconnecting client for the upstream price feed.
pub struct FeedClient<C: Connector, H: PriceHandler> {
    connector: C,
    handler: H,
    retry_interval: Duration,
    state: FeedState,
}

impl<C: Connector, H: PriceHandler> FeedClient<C, H> {
    /// Create a client; nothing connects until [`FeedClient::run`].
    pub fn new(connector: C, handler: H, retry_interval: Duration) -> Self {
        Self {
            connector,
            handler,
            retry_interval,
            state: FeedState::Disconnected,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> FeedState {
        self.state
    }

    /// Access the handler, e.g. to inspect it after `run` returns.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Connect, receive and reconnect until `shutdown` fires.
    pub fn run(&mut self, shutdown: &ShutdownSignal) {
        let mut attempt: u64 = 0;

        while !shutdown.is_fired() {
            attempt += 1;
            self.set_state(FeedState::Connecting);
            info!("Connecting to upstream feed (attempt {})", attempt);

            match self.connector.connect() {
                Ok(mut session) => {
                    self.set_state(FeedState::Connected);
                    info!("Upstream feed connected");
                    attempt = 0;

                    if let Err(e) = session.emit(SNAPSHOT_REQUEST) {
                        debug!("Snapshot request failed: {}", e);
                    }

                    let end = self.receive_loop(&mut session, shutdown);
                    session.close();
                    self.set_state(FeedState::Disconnected);
                    if let SessionEnd::Shutdown = end {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Upstream connect failed: {}", e);
                    self.set_state(FeedState::Disconnected);
                }
            }

            info!(
                "Reconnecting to upstream in {} ms",
                self.retry_interval.as_millis()
            );
            if shutdown.wait(self.retry_interval) {
                break;
            }
        }

        self.set_state(FeedState::Disconnected);
        info!("Upstream feed client stopped");
    }

    fn receive_loop(&mut self, session: &mut C::Session, shutdown: &ShutdownSignal) -> SessionEnd {
        loop {
            if shutdown.is_fired() {
                return SessionEnd::Shutdown;
            }

            match session.poll_event() {
                Ok(Polled::Event(event)) if event.name == PRICE_CHANGED => {
                    let payload = event.args.first().unwrap_or(&Value::Null);
                    self.handler.on_price_update(PriceUpdate::from_payload(payload));
                }
                Ok(Polled::Event(event)) => debug!("Ignoring upstream event {}", event.name),
                Ok(Polled::Idle) => {}
                Ok(Polled::Closed) => {
                    warn!("Upstream feed closed the connection");
                    return SessionEnd::Dropped;
                }
                Err(e) => {
                    warn!("Upstream feed error: {}", e);
                    return SessionEnd::Dropped;
                }
            }
        }
    }

    fn set_state(&mut self, state: FeedState) {
        if self.state != state {
            debug!("Feed state {} -> {}", self.state, state);
            self.state = state;
            self.handler.on_state_change(state);
        }
    }
}
